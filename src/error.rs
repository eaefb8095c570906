use orchestrator_api::OrchestratorApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no pending change with id '{0}'")]
    UnknownChange(String),

    #[error("a decision for change '{0}' is already in flight")]
    DecisionInFlight(String),

    #[error("agent channel is unavailable; {0} was not sent")]
    ChannelUnavailable(&'static str),

    #[error(transparent)]
    Api(#[from] OrchestratorApiError),
}

impl SessionError {
    /// True when the failure left local state untouched and the user can retry.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::UnknownChange(_))
    }
}
