//! Conversation sessions
//!
//! A session owns the append-only transcript for one widget view plus the
//! per-turn phase machine: `Idle → AwaitingReply → Idle`. Turns are immutable
//! once appended; a failed reply leaves the user's turn in place, returns the
//! session to `Idle`, and records a visible error instead of hanging.

use crate::llm::{HistoryTurn, Role};
use crate::summary::SummaryKind;
use crate::system_prompt;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// One message in a conversation, immutable once created
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// Per-turn phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    AwaitingReply,
}

/// Latest structured summary generated for a session
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRecord {
    pub kind: SummaryKind,
    pub resource: Value,
    pub at: DateTime<Utc>,
}

/// Rejected turn submissions
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    /// Empty or whitespace-only input: no turn appended, no network call
    #[error("message is empty")]
    EmptyInput,
    /// A reply is already pending for this session
    #[error("a reply is already pending")]
    ReplyPending,
}

/// One conversation, alive for a single widget view
#[derive(Debug, Serialize)]
pub struct Session {
    pub id: String,
    pub provider: String,
    pub phase: Phase,
    pub transcript: Vec<Turn>,
    /// Most recent failed turn or summary, cleared by the next success
    pub last_error: Option<String>,
    pub summary: Option<SummaryRecord>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a session opening with the fixed assistant greeting.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            provider: provider.into(),
            phase: Phase::Idle,
            transcript: vec![Turn::new(Role::Assistant, system_prompt::GREETING)],
            last_error: None,
            summary: None,
            created_at: Utc::now(),
        }
    }

    /// Submit user input: append the user turn optimistically and move to
    /// `AwaitingReply`.
    ///
    /// # Errors
    ///
    /// [`TurnError::EmptyInput`] for whitespace-only input,
    /// [`TurnError::ReplyPending`] when a reply is already outstanding.
    /// Neither modifies the transcript.
    pub fn begin_turn(&mut self, input: &str) -> Result<(), TurnError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(TurnError::EmptyInput);
        }
        if self.phase == Phase::AwaitingReply {
            return Err(TurnError::ReplyPending);
        }
        self.transcript.push(Turn::new(Role::User, text));
        self.phase = Phase::AwaitingReply;
        Ok(())
    }

    /// Reply arrived: append the assistant turn and return to `Idle`.
    pub fn complete_turn(&mut self, reply: impl Into<String>) -> &Turn {
        self.transcript.push(Turn::new(Role::Assistant, reply));
        self.phase = Phase::Idle;
        self.last_error = None;
        self.transcript.last().expect("turn just appended")
    }

    /// Reply failed: keep the user's turn, return to `Idle`, record the error.
    pub fn fail_turn(&mut self, error: impl Into<String>) {
        self.phase = Phase::Idle;
        self.last_error = Some(error.into());
    }

    /// Record a freshly generated summary, replacing any prior one.
    pub fn set_summary(&mut self, kind: SummaryKind, resource: Value) {
        self.summary = Some(SummaryRecord {
            kind,
            resource,
            at: Utc::now(),
        });
        self.last_error = None;
    }

    /// Conversation history in provider form, chronological.
    pub fn history(&self) -> Vec<HistoryTurn> {
        self.transcript
            .iter()
            .map(|turn| HistoryTurn::new(turn.role, turn.text.clone()))
            .collect()
    }

    /// Transcript rendered as `role: text` lines for summary prompts.
    pub fn rendered_transcript(&self) -> String {
        self.transcript
            .iter()
            .map(|turn| format!("{}: {}", turn.role.as_str(), turn.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// In-memory session store. Nothing survives process restart.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<RwLock<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session bound to `provider` and return a handle to it.
    pub async fn create(&self, provider: impl Into<String>) -> Arc<RwLock<Session>> {
        let session = Session::new(provider);
        let id = session.id.clone();
        let handle = Arc::new(RwLock::new(session));
        self.sessions.write().await.insert(id, handle.clone());
        handle
    }

    pub async fn get(&self, id: &str) -> Option<Arc<RwLock<Session>>> {
        self.sessions.read().await.get(id).cloned()
    }
}
