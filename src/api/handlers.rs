//! HTTP request handlers

use super::assets::{get_index_html, serve_static};
use super::types::{
    ChatMessageRequest, ChatMessageResponse, CreateSessionRequest, ErrorResponse,
    ProvidersResponse, SessionResponse, SummaryResponse,
};
use super::AppState;
use crate::llm::{self, ProviderRequest};
use crate::session::TurnError;
use crate::summary::{self, SummaryKind, UnknownSummaryKind};
use crate::system_prompt;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Root serves the chat widget
        .route("/", get(serve_widget))
        // Static assets (embedded or filesystem fallback)
        .route("/assets/*path", get(serve_static))
        // Session creation
        .route("/api/sessions/new", post(create_session))
        // Session snapshot
        .route("/api/sessions/:id", get(get_session))
        // Chat turn
        .route("/api/sessions/:id/chat", post(send_chat))
        // Structured summary
        .route("/api/sessions/:id/summary/:kind", post(generate_summary))
        // Provider info
        .route("/api/providers", get(list_providers))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Widget
// ============================================================

/// Serve the chat widget's index.html
async fn serve_widget() -> impl IntoResponse {
    match get_index_html() {
        Some(content) => Html(content).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Html("<h1>404 - widget not found. Expected ui/dist/index.html</h1>".to_string()),
        )
            .into_response(),
    }
}

// ============================================================
// Sessions
// ============================================================

async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let provider_id = req
        .provider
        .unwrap_or_else(|| state.registry.default_provider_id().to_string());

    if state.registry.get(&provider_id).is_none() {
        return Err(AppError::Unavailable(format!(
            "Provider not configured: {provider_id}"
        )));
    }

    let handle = state.sessions.create(provider_id).await;
    let session = handle.read().await;

    Ok(Json(SessionResponse {
        session: serde_json::to_value(&*session).unwrap_or(Value::Null),
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("No such session: {id}")))?;
    let session = handle.read().await;

    Ok(Json(SessionResponse {
        session: serde_json::to_value(&*session).unwrap_or(Value::Null),
    }))
}

// ============================================================
// Chat
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatMessageRequest>,
) -> Result<Json<ChatMessageResponse>, AppError> {
    let handle = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("No such session: {id}")))?;

    // Append the user turn and snapshot the request while holding the lock;
    // the provider call itself runs without it.
    let (provider, request) = {
        let mut session = handle.write().await;
        let provider = state.registry.get(&session.provider).ok_or_else(|| {
            AppError::Unavailable(format!("Provider not configured: {}", session.provider))
        })?;
        session.begin_turn(&req.text)?;
        let request = ProviderRequest {
            system: Some(system_prompt::SYSTEM_PROMPT.to_string()),
            history: session.history(),
            max_tokens: Some(system_prompt::CHAT_MAX_TOKENS),
        };
        (provider, request)
    };

    // The provider call and the phase transition run on a detached task: if
    // the client disconnects, axum drops this future, and the session must
    // still complete or fail the turn instead of staying in AwaitingReply.
    let turn = tokio::spawn(async move {
        let result =
            llm::complete_with_retry(provider.as_ref(), &request, llm::MAX_ATTEMPTS).await;
        let mut session = handle.write().await;
        match result {
            Ok(reply) => {
                let turn = session.complete_turn(reply.text);
                Ok(serde_json::to_value(turn).unwrap_or(Value::Null))
            }
            Err(e) => {
                tracing::error!(session_id = %id, error = %e, "Chat turn failed");
                session.fail_turn(e.to_string());
                Err(AppError::Upstream(e.to_string()))
            }
        }
    })
    .await
    .map_err(|e| AppError::Upstream(format!("Chat task failed: {e}")))?;

    Ok(Json(ChatMessageResponse { reply: turn? }))
}

// ============================================================
// Structured summary
// ============================================================

async fn generate_summary(
    State(state): State<AppState>,
    Path((id, kind)): Path<(String, String)>,
) -> Result<Json<SummaryResponse>, AppError> {
    let kind: SummaryKind = kind.parse()?;

    let handle = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("No such session: {id}")))?;

    let (provider, transcript) = {
        let session = handle.read().await;
        let provider = state.registry.get(&session.provider).ok_or_else(|| {
            AppError::Unavailable(format!("Provider not configured: {}", session.provider))
        })?;
        (provider, session.rendered_transcript())
    };

    match summary::request_summary(provider.as_ref(), &transcript, kind).await {
        Ok(resource) => {
            let mut session = handle.write().await;
            session.set_summary(kind, resource.clone());
            Ok(Json(SummaryResponse { kind, resource }))
        }
        // The prior summary, if any, stays in place
        Err(e) => {
            tracing::error!(session_id = %id, kind = %kind, error = %e, "Summary failed");
            Err(AppError::Upstream(e.to_string()))
        }
    }
}

// ============================================================
// Provider info
// ============================================================

async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        providers: state.registry.available_providers(),
        default: state.registry.default_provider_id().to_string(),
    })
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("intake-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    /// Requested provider has no configuration (missing API key)
    Unavailable(String),
    /// The upstream model call or reply parsing failed
    Upstream(String),
}

impl From<TurnError> for AppError {
    fn from(e: TurnError) -> Self {
        match e {
            TurnError::EmptyInput => AppError::BadRequest(e.to_string()),
            TurnError::ReplyPending => AppError::Conflict(e.to_string()),
        }
    }
}

impl From<UnknownSummaryKind> for AppError {
    fn from(e: UnknownSummaryKind) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{
        ChatProvider, ProviderRegistry, ProviderReply, Role, TokenUsage, TransportError,
    };
    use crate::session::Phase;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct SlowProvider {
        delay: Duration,
    }

    #[async_trait]
    impl ChatProvider for SlowProvider {
        async fn complete(
            &self,
            _request: &ProviderRequest,
        ) -> Result<ProviderReply, TransportError> {
            tokio::time::sleep(self.delay).await;
            Ok(ProviderReply {
                text: "How severe is it?".to_string(),
                usage: TokenUsage::default(),
            })
        }

        fn id(&self) -> &str {
            "slow"
        }
    }

    fn state_with(provider: Arc<dyn ChatProvider>) -> AppState {
        AppState::new(Arc::new(ProviderRegistry::with_provider("slow", provider)))
    }

    // A client disconnect drops the handler future mid-call. The detached
    // completion must still return the session to Idle so later turns are
    // not rejected with a conflict.
    #[tokio::test(start_paused = true)]
    async fn disconnected_client_does_not_strand_the_session() {
        let state = state_with(Arc::new(SlowProvider {
            delay: Duration::from_millis(100),
        }));
        let handle = state.sessions.create("slow").await;
        let id = handle.read().await.id.clone();

        let chat = send_chat(
            State(state.clone()),
            Path(id.clone()),
            Json(ChatMessageRequest {
                text: "I have a headache".to_string(),
            }),
        );
        assert!(tokio::time::timeout(Duration::from_millis(20), chat)
            .await
            .is_err());

        // The reply lands anyway once the provider answers
        tokio::time::sleep(Duration::from_millis(200)).await;
        {
            let session = handle.read().await;
            assert_eq!(session.phase, Phase::Idle);
            let last = session.transcript.last().expect("greeting plus two turns");
            assert_eq!(last.role, Role::Assistant);
            assert_eq!(last.text, "How severe is it?");
        }

        // And the next submission is accepted, not a conflict
        let reply = send_chat(
            State(state),
            Path(id),
            Json(ChatMessageRequest {
                text: "still hurts".to_string(),
            }),
        )
        .await;
        assert!(reply.is_ok());
    }
}
