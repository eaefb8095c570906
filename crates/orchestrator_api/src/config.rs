use std::time::Duration;

use crate::backoff::ReconnectPolicy;
use crate::error::OrchestratorApiError;
use crate::url::{websocket_url, DEFAULT_BASE_URL};

/// Default interval between keepalive pings on the agent channel.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);

/// Transport configuration for the orchestrator backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Base URL for HTTP collaborator endpoints.
    pub base_url: String,
    /// Explicit agent channel URL; derived from `base_url` when absent.
    pub ws_url: Option<String>,
    /// Optional HTTP request timeout.
    pub timeout: Option<Duration>,
    /// Keepalive ping interval while connected; `None` disables pings.
    pub heartbeat: Option<Duration>,
    /// Reconnect schedule for the agent channel.
    pub reconnect: ReconnectPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            ws_url: None,
            timeout: None,
            heartbeat: Some(DEFAULT_HEARTBEAT),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = Some(ws_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    pub fn without_heartbeat(mut self) -> Self {
        self.heartbeat = None;
        self
    }

    pub fn with_reconnect_policy(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Resolves the agent channel URL.
    pub fn channel_url(&self) -> Result<String, OrchestratorApiError> {
        match self.ws_url.as_deref().map(str::trim) {
            Some(explicit) if !explicit.is_empty() => Ok(explicit.to_string()),
            _ => websocket_url(&self.base_url),
        }
    }
}
