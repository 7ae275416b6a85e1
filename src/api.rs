//! HTTP API for the intake chat backend

mod assets;
mod handlers;
mod types;

pub use handlers::create_router;

use crate::llm::ProviderRegistry;
use crate::session::SessionStore;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ProviderRegistry>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            sessions: Arc::new(SessionStore::new()),
        }
    }
}
