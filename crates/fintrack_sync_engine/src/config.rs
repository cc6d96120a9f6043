//! Configuration for the reconciliation engine.

use fintrack_store::ReplayOrder;
use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the REST backend (e.g. `https://api.example.com/v1`).
    pub base_url: String,
    /// Per-request timeout. An expired request counts as a network failure.
    pub timeout: Duration,
    /// Order in which outbox entries are replayed.
    pub replay_order: ReplayOrder,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            replay_order: ReplayOrder::OldestFirst,
            user_agent: format!("fintrack/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the replay order.
    pub fn with_replay_order(mut self, order: ReplayOrder) -> Self {
        self.replay_order = order;
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:8080")
    }
}
