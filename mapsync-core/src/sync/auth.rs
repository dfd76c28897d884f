//! Session tokens
//!
//! Joining a room requires a token issued by the map server. Fetching it is
//! the only async step of connecting, so it sits behind its own trait.

use super::errors::{SyncError, SyncResult};
use async_trait::async_trait;

/// Source of relay session tokens
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Obtain a token allowing this client to join the room behind `endpoint`
    async fn fetch_token(&self, endpoint: &str) -> SyncResult<String>;
}

/// Hands out a fixed token, or always refuses
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: Some(token.into()) }
    }

    /// A provider whose every request is denied
    pub fn denying() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn fetch_token(&self, endpoint: &str) -> SyncResult<String> {
        self.token.clone().ok_or_else(|| {
            SyncError::AuthenticationFailure(format!("no token available for {endpoint}"))
        })
    }
}
