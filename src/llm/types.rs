//! Common types for chat provider interactions

use serde::{Deserialize, Serialize};

/// Who spoke a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when rendering a transcript as `role: text` lines
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry of conversation history handed to a provider
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub role: Role,
    pub text: String,
}

impl HistoryTurn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }
}

/// Outbound provider request: optional system prompt plus ordered history
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub system: Option<String>,
    pub history: Vec<HistoryTurn>,
    pub max_tokens: Option<u32>,
}

impl ProviderRequest {
    /// Request carrying a single user prompt and nothing else
    pub fn single_prompt(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            history: vec![HistoryTurn::user(prompt)],
            max_tokens: None,
        }
    }
}

/// Reply from a provider
#[derive(Debug, Clone)]
pub struct ProviderReply {
    pub text: String,
    pub usage: TokenUsage,
}

/// Token usage statistics, zero for providers that do not report any
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
