use std::collections::VecDeque;
use std::future::Future;

use orchestrator_api::OrchestratorApiError;
use orchestrator_protocol::{
    ChangeAction, ChatContext, DecisionResponse, FileChangeEvent, OutboundEvent,
    PendingChangeRecord,
};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::error::SessionError;

/// Maximum approved changes kept in history.
pub const APPROVED_HISTORY_CAPACITY: usize = 50;

/// Backend endpoint that applies or discards a proposed change.
pub trait ApprovalGateway {
    fn decide(
        &self,
        change_id: &str,
        approved: bool,
    ) -> impl Future<Output = Result<DecisionResponse, OrchestratorApiError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn is_approval(&self) -> bool {
        matches!(self, Self::Approve)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

/// Lifecycle of one change.
///
/// `Pending -> Approving | Rejecting -> Approved | Rejected`. A failed round
/// trip returns the change to `Pending`. Rejected changes leave the queue, so
/// that status is only seen on the [`ResumeTicket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Pending,
    Approving,
    Rejecting,
    Approved,
    Rejected,
}

impl ChangeStatus {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Approving | Self::Rejecting)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approving => "approving",
            Self::Rejecting => "rejecting",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub id: String,
    pub path: String,
    pub action: ChangeAction,
    pub old_content: Option<String>,
    pub new_content: String,
    pub agent: Option<String>,
    pub status: ChangeStatus,
    pub received_at: OffsetDateTime,
}

impl From<FileChangeEvent> for Change {
    fn from(event: FileChangeEvent) -> Self {
        Self {
            id: event.change_id,
            path: event.path,
            action: event.action,
            old_content: event.old_content,
            new_content: event.new_content,
            agent: event.agent,
            status: ChangeStatus::Pending,
            received_at: OffsetDateTime::now_utc(),
        }
    }
}

impl From<PendingChangeRecord> for Change {
    fn from(record: PendingChangeRecord) -> Self {
        Self {
            id: record.id,
            path: record.path,
            action: record.action,
            old_content: record.old_content,
            new_content: record.new_content,
            agent: record.agent,
            status: ChangeStatus::Pending,
            received_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Proof that the backend confirmed a decision.
///
/// Only [`ChangeQueue`] creates tickets, so the resume send that tells the
/// orchestrator to continue can only follow a terminal decision.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a confirmed decision must be followed by a resume send"]
pub struct ResumeTicket {
    change_id: String,
    status: ChangeStatus,
    feedback: Option<String>,
}

impl ResumeTicket {
    pub fn change_id(&self) -> &str {
        &self.change_id
    }

    /// Terminal status the backend confirmed.
    pub fn status(&self) -> ChangeStatus {
        self.status
    }

    pub fn approved(&self) -> bool {
        self.status == ChangeStatus::Approved
    }

    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    /// Builds the `approval_done` frame carrying freshly assembled context.
    pub fn into_event(self, context: ChatContext) -> OutboundEvent {
        OutboundEvent::ApprovalDone {
            approved: self.approved(),
            feedback: self.feedback,
            context,
        }
    }
}

/// Pending proposals plus a bounded newest-first history of approved ones.
#[derive(Debug, Clone, Default)]
pub struct ChangeQueue {
    pending: Vec<Change>,
    approved: VecDeque<Change>,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending changes in arrival order.
    pub fn pending(&self) -> &[Change] {
        &self.pending
    }

    /// Approved changes, newest first.
    pub fn approved(&self) -> impl ExactSizeIterator<Item = &Change> + '_ {
        self.approved.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Change> {
        self.pending.iter().find(|change| change.id == id)
    }

    /// Ids of pending changes with no decision in flight, in arrival order.
    pub fn decidable_ids(&self) -> Vec<String> {
        self.pending
            .iter()
            .filter(|change| change.status == ChangeStatus::Pending)
            .map(|change| change.id.clone())
            .collect()
    }

    /// Records a proposal. Returns false when the id is already pending.
    pub fn on_file_change(&mut self, event: FileChangeEvent) -> bool {
        if self.position(&event.change_id).is_some() {
            debug!(change_id = %event.change_id, "duplicate file_change ignored");
            return false;
        }

        info!(change_id = %event.change_id, path = %event.path, "change proposed");
        self.pending.push(Change::from(event));
        true
    }

    /// Runs one approve/reject round trip.
    ///
    /// Local state changes only when the backend confirms. On failure the
    /// change is pending again and the error is returned.
    pub async fn decide<G>(
        &mut self,
        gateway: &G,
        id: &str,
        decision: Decision,
        feedback: Option<String>,
    ) -> Result<ResumeTicket, SessionError>
    where
        G: ApprovalGateway,
    {
        self.begin(id, decision)?;
        let outcome = gateway.decide(id, decision.is_approval()).await;
        self.settle(id, decision, feedback, outcome)
    }

    /// Reconciles a `change_result` broadcast, which may describe a decision
    /// made elsewhere. Returns true when local state changed.
    pub fn on_change_result(&mut self, id: &str, approved: bool, result: &Value) -> bool {
        if result.get("status").and_then(Value::as_str) == Some("failed") {
            return false;
        }
        let Some(index) = self.position(id) else {
            return false;
        };
        if self.pending[index].status.is_in_flight() {
            return false;
        }

        let change = self.pending.remove(index);
        info!(change_id = id, approved, "change resolved by broadcast");
        if approved {
            self.push_approved(change);
        }
        true
    }

    /// Replaces the pending set with the backend's authoritative list.
    ///
    /// Known entries keep their local record, entries with a decision in
    /// flight survive even when the backend no longer lists them.
    pub fn resync(&mut self, records: Vec<PendingChangeRecord>) {
        let mut previous = std::mem::take(&mut self.pending);
        for record in records {
            if self.position(&record.id).is_some() {
                continue;
            }
            match previous.iter().position(|change| change.id == record.id) {
                Some(index) => self.pending.push(previous.remove(index)),
                None => self.pending.push(Change::from(record)),
            }
        }
        for change in previous {
            if change.status.is_in_flight() {
                self.pending.push(change);
            }
        }
        debug!(pending = self.pending.len(), "pending changes resynchronized");
    }

    pub fn clear_history(&mut self) {
        self.approved.clear();
    }

    fn begin(&mut self, id: &str, decision: Decision) -> Result<(), SessionError> {
        let index = self
            .position(id)
            .ok_or_else(|| SessionError::UnknownChange(id.to_string()))?;
        let change = &mut self.pending[index];
        if change.status.is_in_flight() {
            return Err(SessionError::DecisionInFlight(id.to_string()));
        }
        change.status = match decision {
            Decision::Approve => ChangeStatus::Approving,
            Decision::Reject => ChangeStatus::Rejecting,
        };
        Ok(())
    }

    fn settle(
        &mut self,
        id: &str,
        decision: Decision,
        feedback: Option<String>,
        outcome: Result<DecisionResponse, OrchestratorApiError>,
    ) -> Result<ResumeTicket, SessionError> {
        let index = self.position(id);
        match outcome {
            Ok(response) => {
                if let Some(index) = index {
                    let change = self.pending.remove(index);
                    if decision.is_approval() {
                        self.push_approved(change);
                    }
                }
                info!(
                    change_id = id,
                    decision = decision.as_str(),
                    status = %response.status,
                    "change decision confirmed"
                );
                let status = if decision.is_approval() {
                    ChangeStatus::Approved
                } else {
                    ChangeStatus::Rejected
                };
                Ok(ResumeTicket {
                    change_id: id.to_string(),
                    status,
                    feedback,
                })
            }
            Err(error) => {
                if let Some(index) = index {
                    self.pending[index].status = ChangeStatus::Pending;
                }
                warn!(change_id = id, decision = decision.as_str(), %error, "change decision failed");
                Err(error.into())
            }
        }
    }

    fn push_approved(&mut self, mut change: Change) {
        change.status = ChangeStatus::Approved;
        self.approved.push_front(change);
        self.approved.truncate(APPROVED_HISTORY_CAPACITY);
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.pending.iter().position(|change| change.id == id)
    }
}
