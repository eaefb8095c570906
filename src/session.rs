use orchestrator_api::{ConnectionEvent, ConnectionState, ConnectionStatus};
use orchestrator_protocol::{InboundEvent, OutboundEvent, UsageStats};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::{OrchestratorBackend, OutboundChannel};
use crate::change_queue::{ChangeQueue, Decision, ResumeTicket};
use crate::context::{ContextAssembler, FileSource};
use crate::conversation::{ConversationReducer, ReducerHost};
use crate::error::SessionError;
use crate::timeline::TimelineProjector;

/// Chat text sent when the user resumes after a backend timeout.
pub const CONTINUE_PROMPT: &str = "continue";

/// Result of one confirmed approve/reject round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub change_id: String,
    pub approved: bool,
    /// Whether the resume frame reached the channel writer.
    pub resumed: bool,
}

#[derive(Debug, Default)]
struct PendingEffects {
    refresh_usage: bool,
    resync: bool,
    plans: Vec<Value>,
}

impl ReducerHost for PendingEffects {
    fn refresh_usage(&mut self) {
        self.refresh_usage = true;
    }

    fn plan_created(&mut self, plan: &Value) {
        self.plans.push(plan.clone());
    }
}

/// Single-writer session state driven by channel events and user actions.
///
/// Inbound events are folded synchronously by [`Session::handle`]; side
/// effects that need the HTTP collaborators are collected and run by
/// [`Session::run_effects`].
pub struct Session<B, C> {
    backend: B,
    channel: C,
    conversation: ConversationReducer,
    changes: ChangeQueue,
    timeline: TimelineProjector,
    context: ContextAssembler,
    connection: ConnectionStatus,
    usage: Option<UsageStats>,
    effects: PendingEffects,
}

impl<B, C> Session<B, C>
where
    B: OrchestratorBackend,
    C: OutboundChannel,
{
    pub fn new(backend: B, channel: C) -> Self {
        Self {
            backend,
            channel,
            conversation: ConversationReducer::new(),
            changes: ChangeQueue::new(),
            timeline: TimelineProjector::new(),
            context: ContextAssembler::new(),
            connection: ConnectionStatus {
                state: ConnectionState::Disconnected,
                attempts: 0,
                terminal: false,
            },
            usage: None,
            effects: PendingEffects::default(),
        }
    }

    pub fn conversation(&self) -> &ConversationReducer {
        &self.conversation
    }

    pub fn changes(&self) -> &ChangeQueue {
        &self.changes
    }

    pub fn timeline(&self) -> &TimelineProjector {
        &self.timeline
    }

    pub fn context(&self) -> &ContextAssembler {
        &self.context
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn usage(&self) -> Option<&UsageStats> {
        self.usage.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Plans announced by the orchestrator since the last call.
    pub fn take_plans(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.effects.plans)
    }

    /// True when [`Session::run_effects`] has work queued.
    pub fn has_pending_effects(&self) -> bool {
        self.effects.refresh_usage || self.effects.resync
    }

    pub fn handle(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Status(status) => self.on_status(status),
            ConnectionEvent::Inbound(event) => self.on_inbound(event),
        }
    }

    fn on_status(&mut self, status: ConnectionStatus) {
        let was_connected = self.connection.is_connected();
        self.connection = status;
        if status.is_connected() && !was_connected {
            // New socket: earlier event ordering no longer holds.
            self.effects.resync = true;
        }
        if status.terminal {
            warn!(attempts = status.attempts, "agent channel closed for good");
        }
        debug!(state = status.state.as_str(), attempts = status.attempts, "connection status");
    }

    fn on_inbound(&mut self, event: InboundEvent) {
        self.timeline.observe(&event);
        match event {
            InboundEvent::FileChange(change) => {
                self.changes.on_file_change(change);
            }
            InboundEvent::ChangeResult {
                change_id,
                approved,
                result,
            } => {
                self.changes.on_change_result(&change_id, approved, &result);
            }
            event => self.conversation.apply(&event, &mut self.effects),
        }
    }

    /// Runs queued collaborator calls: usage refresh and post-reconnect
    /// resync. Failures are logged and leave the previous snapshots in place.
    pub async fn run_effects(&mut self) {
        if std::mem::take(&mut self.effects.resync) {
            if let Err(error) = self.resync().await {
                warn!(%error, "resync after reconnect failed");
            }
        }
        if std::mem::take(&mut self.effects.refresh_usage) {
            if let Err(error) = self.refresh_usage().await {
                warn!(%error, "usage refresh failed");
            }
        }
    }

    /// Sends a chat turn. Blank input is ignored and returns `Ok(false)`.
    pub async fn send_chat(&mut self, text: &str) -> Result<bool, SessionError> {
        let message = text.trim();
        if message.is_empty() {
            return Ok(false);
        }
        if !self.channel.is_connected() {
            warn!("chat not sent; agent channel is not connected");
            return Err(SessionError::ChannelUnavailable("chat"));
        }

        self.conversation.push_user_message(message);
        let context = self.context.assemble(&self.backend).await;
        let sent = self.channel.send(&OutboundEvent::Chat {
            message: message.to_string(),
            context,
        });
        Ok(sent)
    }

    /// Clears typing state immediately and asks the backend to stop.
    pub fn stop(&mut self) -> bool {
        self.conversation.stop();
        self.channel.send(&OutboundEvent::Stop)
    }

    /// Resumes after a backend timeout. Returns `Ok(false)` when the session
    /// is not stopped.
    pub async fn continue_after_timeout(&mut self) -> Result<bool, SessionError> {
        if !self.conversation.is_stopped() {
            return Ok(false);
        }
        self.send_chat(CONTINUE_PROMPT).await
    }

    pub fn research(&mut self, query: &str) -> Result<bool, SessionError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(false);
        }
        if !self.channel.is_connected() {
            return Err(SessionError::ChannelUnavailable("research"));
        }

        self.conversation.begin_research(query);
        Ok(self.channel.send(&OutboundEvent::Research {
            query: query.to_string(),
        }))
    }

    pub async fn approve(
        &mut self,
        id: &str,
        feedback: Option<String>,
    ) -> Result<DecisionOutcome, SessionError> {
        self.decide(id, Decision::Approve, feedback).await
    }

    pub async fn reject(
        &mut self,
        id: &str,
        feedback: Option<String>,
    ) -> Result<DecisionOutcome, SessionError> {
        self.decide(id, Decision::Reject, feedback).await
    }

    /// Approves every decidable change one round trip at a time, resuming
    /// after each. Stops at the first failure; changes after it stay pending.
    pub async fn approve_all(&mut self) -> Result<Vec<DecisionOutcome>, SessionError> {
        let ids = self.changes.decidable_ids();
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            if self.changes.get(&id).is_none() {
                // Resolved by a broadcast while an earlier round trip ran.
                continue;
            }
            outcomes.push(self.approve(&id, None).await?);
        }
        Ok(outcomes)
    }

    async fn decide(
        &mut self,
        id: &str,
        decision: Decision,
        feedback: Option<String>,
    ) -> Result<DecisionOutcome, SessionError> {
        let ticket = self
            .changes
            .decide(&self.backend, id, decision, feedback)
            .await?;
        Ok(self.resume(ticket).await)
    }

    async fn resume(&mut self, ticket: ResumeTicket) -> DecisionOutcome {
        let change_id = ticket.change_id().to_string();
        let approved = ticket.approved();
        let context = self.context.assemble(&self.backend).await;
        let resumed = self.channel.send(&ticket.into_event(context));
        if !resumed {
            warn!(change_id = %change_id, "resume not sent; orchestrator will wait for the next turn");
        }
        DecisionOutcome {
            change_id,
            approved,
            resumed,
        }
    }

    pub fn select_file(&mut self, path: Option<String>) {
        self.context.select(path);
    }

    pub fn attach_file(&mut self, path: impl Into<String>) -> bool {
        self.context.attach(path.into())
    }

    pub fn detach_file(&mut self, path: &str) -> bool {
        self.context.detach(path)
    }

    /// Replaces the file list snapshot from the backend.
    pub async fn refresh_files(&mut self) -> Result<usize, SessionError> {
        let files = self.backend.list_files().await?;
        let count = files.len();
        self.context.set_files(files);
        Ok(count)
    }

    /// Refetches the file list and the authoritative pending changes.
    pub async fn resync(&mut self) -> Result<(), SessionError> {
        self.refresh_files().await?;
        let pending = self.backend.pending_changes().await?;
        self.changes.resync(pending);
        info!(pending = self.changes.pending().len(), "session resynchronized");
        Ok(())
    }

    pub async fn refresh_usage(&mut self) -> Result<(), SessionError> {
        self.usage = Some(self.backend.usage().await?);
        Ok(())
    }

    pub fn clear_transcript(&mut self) {
        self.conversation.clear();
    }
}
