//! Wire contract between the session client and the multi-agent orchestrator.
//!
//! This crate only defines the JSON shapes exchanged over the agent channel and
//! the HTTP collaborator endpoints. It owns no transport and no session state.
//!
//! Every channel frame is a JSON object discriminated by a `type` tag. Inbound
//! frames decode into [`InboundEvent`], outbound frames are encoded from
//! [`OutboundEvent`].

mod records;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use records::{
    ChangeAction, DecisionResponse, FileEntry, FileKind, FileListResponse, FileReadResponse,
    PendingChangeRecord, PendingChangesResponse, ProviderUsage, ResearchResult, UsageDay,
    UsageStats, UsageSummary,
};

/// Agent name used when the backend omits one on status and error frames.
pub const SYSTEM_AGENT: &str = "System";

/// Proposed file modification announced by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChangeEvent {
    #[serde(alias = "id")]
    pub change_id: String,
    pub path: String,
    #[serde(default)]
    pub action: ChangeAction,
    #[serde(default)]
    pub old_content: Option<String>,
    #[serde(default)]
    pub new_content: String,
    #[serde(default)]
    pub agent: Option<String>,
}

/// Frame received from the orchestrator channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    AgentStart {
        agent: String,
    },
    Thought {
        agent: String,
        #[serde(default)]
        content: String,
    },
    Message {
        agent: String,
        #[serde(default)]
        content: String,
    },
    Handoff {
        from_agent: String,
        to_agent: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cue: Option<String>,
    },
    FileChange(FileChangeEvent),
    MessageUpdate {
        concise_message: String,
        #[serde(default, alias = "isStatus")]
        is_status: bool,
    },
    AgentStatus {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
        status: String,
    },
    ResearchResults {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
        #[serde(default)]
        results: Vec<ResearchResult>,
    },
    AgentDone {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Complete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        turns: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_length: Option<u32>,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
        #[serde(default)]
        content: String,
        #[serde(default, rename = "isTimeout", alias = "is_timeout")]
        is_timeout: bool,
    },
    PlanCreated {
        plan: Value,
    },
    /// Broadcast after any approve/reject decision, including other clients'.
    ChangeResult {
        change_id: String,
        approved: bool,
        #[serde(default)]
        result: Value,
    },
    Pong,
}

impl InboundEvent {
    /// Returns the wire `type` tag for this event.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AgentStart { .. } => "agent_start",
            Self::Thought { .. } => "thought",
            Self::Message { .. } => "message",
            Self::Handoff { .. } => "handoff",
            Self::FileChange(_) => "file_change",
            Self::MessageUpdate { .. } => "message_update",
            Self::AgentStatus { .. } => "agent_status",
            Self::ResearchResults { .. } => "research_results",
            Self::AgentDone { .. } => "agent_done",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
            Self::PlanCreated { .. } => "plan_created",
            Self::ChangeResult { .. } => "change_result",
            Self::Pong => "pong",
        }
    }

    /// Returns true for events that end the orchestrator's current turn.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AgentDone { .. } | Self::Complete { .. })
    }
}

/// Context shipped with every chat message and approval decision.
///
/// The orchestrator keeps no file state between turns, so this is rebuilt from
/// fresh reads each time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContext {
    pub files: Vec<FileEntry>,
    pub current_file: Option<FileSnapshot>,
    pub attached_files: Vec<FileSnapshot>,
}

/// A file path with its content at assembly time; `content` is `None` when the
/// read failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub path: String,
    pub content: Option<String>,
}

impl FileSnapshot {
    #[must_use]
    pub fn new(path: impl Into<String>, content: Option<String>) -> Self {
        Self {
            path: path.into(),
            content,
        }
    }
}

/// Frame sent to the orchestrator channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    Chat {
        message: String,
        context: ChatContext,
    },
    ApprovalDone {
        approved: bool,
        feedback: Option<String>,
        context: ChatContext,
    },
    Stop,
    Research {
        query: String,
    },
    Ping,
}

impl OutboundEvent {
    /// Returns the wire `type` tag for this event.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chat { .. } => "chat",
            Self::ApprovalDone { .. } => "approval_done",
            Self::Stop => "stop",
            Self::Research { .. } => "research",
            Self::Ping => "ping",
        }
    }
}
