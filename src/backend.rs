//! Seams between the session core and the orchestrator transport.

use std::future::Future;

use orchestrator_api::{ConnectionManager, OrchestratorApiError, OrchestratorClient};
use orchestrator_protocol::{
    DecisionResponse, FileEntry, OutboundEvent, PendingChangeRecord, UsageStats,
};

use crate::change_queue::ApprovalGateway;
use crate::context::FileSource;

/// HTTP collaborators the session consumes.
pub trait OrchestratorBackend: FileSource + ApprovalGateway {
    fn pending_changes(
        &self,
    ) -> impl Future<Output = Result<Vec<PendingChangeRecord>, OrchestratorApiError>>;
    fn usage(&self) -> impl Future<Output = Result<UsageStats, OrchestratorApiError>>;
}

/// Fire-and-forget sender for the agent channel.
pub trait OutboundChannel {
    /// Returns false when the event was dropped.
    fn send(&self, event: &OutboundEvent) -> bool;
    fn is_connected(&self) -> bool;
}

impl FileSource for OrchestratorClient {
    async fn list_files(&self) -> Result<Vec<FileEntry>, OrchestratorApiError> {
        OrchestratorClient::list_files(self).await
    }

    async fn read_file(&self, path: &str) -> Result<String, OrchestratorApiError> {
        OrchestratorClient::read_file(self, path).await
    }
}

impl ApprovalGateway for OrchestratorClient {
    async fn decide(
        &self,
        change_id: &str,
        approved: bool,
    ) -> Result<DecisionResponse, OrchestratorApiError> {
        self.decide_change(change_id, approved).await
    }
}

impl OrchestratorBackend for OrchestratorClient {
    async fn pending_changes(&self) -> Result<Vec<PendingChangeRecord>, OrchestratorApiError> {
        OrchestratorClient::pending_changes(self).await
    }

    async fn usage(&self) -> Result<UsageStats, OrchestratorApiError> {
        OrchestratorClient::usage(self).await
    }
}

impl OutboundChannel for ConnectionManager {
    fn send(&self, event: &OutboundEvent) -> bool {
        ConnectionManager::send(self, event)
    }

    fn is_connected(&self) -> bool {
        self.status().is_connected()
    }
}
