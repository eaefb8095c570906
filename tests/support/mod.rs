#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use agent_session::{ApprovalGateway, FileSource, OrchestratorBackend, OutboundChannel, ReducerHost};
use orchestrator_api::{
    ConnectionEvent, ConnectionState, ConnectionStatus, OrchestratorApiError, StatusCode,
};
use orchestrator_protocol::{
    DecisionResponse, FileEntry, InboundEvent, OutboundEvent, PendingChangeRecord, UsageStats,
};
use serde_json::Value;

pub fn event(value: Value) -> InboundEvent {
    serde_json::from_value(value).expect("test frame should decode")
}

pub fn inbound(value: Value) -> ConnectionEvent {
    ConnectionEvent::Inbound(event(value))
}

pub fn status(state: ConnectionState, attempts: u32) -> ConnectionEvent {
    ConnectionEvent::Status(ConnectionStatus {
        state,
        attempts,
        terminal: false,
    })
}

pub fn server_error(message: &str) -> OrchestratorApiError {
    OrchestratorApiError::Status(StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
}

#[derive(Default)]
pub struct HostSpy {
    pub usage_refreshes: usize,
    pub plans: Vec<Value>,
}

impl ReducerHost for HostSpy {
    fn refresh_usage(&mut self) {
        self.usage_refreshes += 1;
    }

    fn plan_created(&mut self, plan: &Value) {
        self.plans.push(plan.clone());
    }
}

/// Scripted HTTP collaborators. Unscripted decisions succeed.
#[derive(Default)]
pub struct FakeBackend {
    pub files: RefCell<Vec<FileEntry>>,
    pub contents: RefCell<HashMap<String, String>>,
    pub reads: RefCell<Vec<String>>,
    pub decisions: RefCell<Vec<(String, bool)>>,
    pub decision_script: RefCell<VecDeque<Result<DecisionResponse, OrchestratorApiError>>>,
    pub pending: RefCell<Vec<PendingChangeRecord>>,
    pub usage_calls: Cell<usize>,
    pub fail_listing: Cell<bool>,
}

impl FakeBackend {
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.files
            .borrow_mut()
            .push(FileEntry::file(path, content.len() as u64));
        self.contents
            .borrow_mut()
            .insert(path.to_string(), content.to_string());
        self
    }

    pub fn script_decision(&self, outcome: Result<DecisionResponse, OrchestratorApiError>) {
        self.decision_script.borrow_mut().push_back(outcome);
    }
}

impl FileSource for FakeBackend {
    async fn list_files(&self) -> Result<Vec<FileEntry>, OrchestratorApiError> {
        if self.fail_listing.get() {
            return Err(server_error("listing unavailable"));
        }
        Ok(self.files.borrow().clone())
    }

    async fn read_file(&self, path: &str) -> Result<String, OrchestratorApiError> {
        self.reads.borrow_mut().push(path.to_string());
        self.contents
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| {
                OrchestratorApiError::Status(StatusCode::NOT_FOUND, "File not found".to_string())
            })
    }
}

impl ApprovalGateway for FakeBackend {
    async fn decide(
        &self,
        change_id: &str,
        approved: bool,
    ) -> Result<DecisionResponse, OrchestratorApiError> {
        self.decisions
            .borrow_mut()
            .push((change_id.to_string(), approved));
        match self.decision_script.borrow_mut().pop_front() {
            Some(outcome) => outcome,
            None => Ok(DecisionResponse {
                status: if approved { "applied" } else { "rejected" }.to_string(),
                error: None,
                path: None,
                action: None,
            }),
        }
    }
}

impl OrchestratorBackend for FakeBackend {
    async fn pending_changes(&self) -> Result<Vec<PendingChangeRecord>, OrchestratorApiError> {
        Ok(self.pending.borrow().clone())
    }

    async fn usage(&self) -> Result<UsageStats, OrchestratorApiError> {
        self.usage_calls.set(self.usage_calls.get() + 1);
        Ok(UsageStats::default())
    }
}

/// Channel double that records what reached the writer.
pub struct FakeChannel {
    pub connected: Cell<bool>,
    pub sent: RefCell<Vec<OutboundEvent>>,
}

impl FakeChannel {
    pub fn connected() -> Self {
        Self {
            connected: Cell::new(true),
            sent: RefCell::new(Vec::new()),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            connected: Cell::new(false),
            sent: RefCell::new(Vec::new()),
        }
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.sent.borrow().iter().map(OutboundEvent::kind).collect()
    }
}

impl OutboundChannel for FakeChannel {
    fn send(&self, event: &OutboundEvent) -> bool {
        if !self.connected.get() {
            return false;
        }
        self.sent.borrow_mut().push(event.clone());
        true
    }

    fn is_connected(&self) -> bool {
        self.connected.get()
    }
}
