use std::collections::HashMap;
use std::sync::OnceLock;

use orchestrator_protocol::{InboundEvent, ResearchResult, SYSTEM_AGENT};
use regex::Regex;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::debug;

use crate::sanitizer::{sanitize, SanitizedText, StreamSanitizer};

pub type MessageId = u64;

/// Agent name carried by messages the local user typed.
pub const USER_AGENT: &str = "User";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Agent,
    User,
    Handoff,
    Status,
    Error,
}

/// One transcript record.
///
/// Agent messages stay open while deltas stream in. Once `complete` is set,
/// `content` and `thoughts` never change again.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub agent: String,
    pub kind: MessageKind,
    pub content: String,
    pub thoughts: String,
    pub concise_content: Option<String>,
    pub is_status_placeholder: bool,
    pub is_timeout: bool,
    pub complete: bool,
    pub timestamp: OffsetDateTime,
    sanitizer: StreamSanitizer,
}

impl Message {
    fn new(id: MessageId, agent: String, kind: MessageKind, content: String, complete: bool) -> Self {
        let mut sanitizer = StreamSanitizer::new();
        if kind == MessageKind::Agent {
            sanitizer.push(&content);
        }
        Self {
            id,
            agent,
            kind,
            content,
            thoughts: String::new(),
            concise_content: None,
            is_status_placeholder: false,
            is_timeout: false,
            complete,
            timestamp: OffsetDateTime::now_utc(),
            sanitizer,
        }
    }

    pub fn is_user(&self) -> bool {
        self.kind == MessageKind::User
    }

    /// Render-ready text for this record.
    ///
    /// Agent prose is sanitized and a backend summary, when present, replaces
    /// it. Commands extracted from the full content are always kept. Once the
    /// message is complete an unfinished bracket tail is shown as text.
    pub fn display(&self) -> SanitizedText {
        if self.kind != MessageKind::Agent {
            return SanitizedText {
                display: self.content.clone(),
                commands: Vec::new(),
            };
        }

        let mut text = if self.complete {
            self.sanitizer.final_snapshot()
        } else {
            self.sanitizer.snapshot()
        };
        if let Some(concise) = self.concise_content.as_deref() {
            text.display = sanitize(concise).display;
        }
        text
    }

    fn append_content(&mut self, delta: &str) {
        self.content.push_str(delta);
        self.sanitizer.push(delta);
    }
}

fn research_status_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)research|search|synthesis|analyz").expect("research regex must compile")
    })
}

/// Returns true when an `agent_status` text describes research work.
pub fn is_research_status(status: &str) -> bool {
    research_status_regex().is_match(status)
}

/// Side effects the conversation fold hands to its owner.
pub trait ReducerHost {
    fn refresh_usage(&mut self);
    fn plan_created(&mut self, plan: &Value);
}

/// Transcript fold over the inbound event stream.
///
/// `open` maps an agent to the index of its single open message so that
/// deltas find their target without scanning the transcript.
#[derive(Debug, Clone, Default)]
pub struct ConversationReducer {
    transcript: Vec<Message>,
    open: HashMap<String, usize>,
    next_id: MessageId,
    typing_agent: Option<String>,
    research_in_progress: bool,
    research_query: Option<String>,
    research_results: Vec<ResearchResult>,
    stopped: bool,
    last_turn_note: Option<String>,
}

impl ConversationReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn typing_agent(&self) -> Option<&str> {
        self.typing_agent.as_deref()
    }

    pub fn is_researching(&self) -> bool {
        self.research_in_progress
    }

    pub fn research_query(&self) -> Option<&str> {
        self.research_query.as_deref()
    }

    pub fn research_results(&self) -> &[ResearchResult] {
        &self.research_results
    }

    /// True after a backend timeout until the user sends the next turn.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Message attached to the latest `agent_done`, e.g. a pause for review.
    pub fn last_turn_note(&self) -> Option<&str> {
        self.last_turn_note.as_deref()
    }

    pub fn open_message(&self, agent: &str) -> Option<&Message> {
        self.open.get(agent).map(|index| &self.transcript[*index])
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Folds one inbound event. Events owned by other projections are ignored.
    pub fn apply(&mut self, event: &InboundEvent, host: &mut dyn ReducerHost) {
        debug!(kind = event.kind(), "conversation fold");
        match event {
            InboundEvent::AgentStart { agent } => {
                self.typing_agent = Some(agent.clone());
            }
            InboundEvent::Thought { agent, content } => {
                let index = self.open_index(agent);
                self.transcript[index].thoughts.push_str(content);
            }
            InboundEvent::Message { agent, content } => {
                let index = self.open_index(agent);
                self.transcript[index].append_content(content);
            }
            InboundEvent::Handoff {
                from_agent,
                to_agent,
                ..
            } => {
                self.close_all();
                self.push_record(
                    from_agent.clone(),
                    MessageKind::Handoff,
                    format!("{from_agent} → {to_agent}"),
                );
                self.typing_agent = Some(to_agent.clone());
            }
            InboundEvent::MessageUpdate {
                concise_message,
                is_status,
            } => self.patch_latest(concise_message, *is_status),
            InboundEvent::AgentStatus { agent, status } => {
                let agent = agent.clone().unwrap_or_else(|| SYSTEM_AGENT.to_string());
                self.push_record(agent, MessageKind::Status, status.clone());
                if is_research_status(status) {
                    self.research_in_progress = true;
                }
            }
            InboundEvent::ResearchResults { query, results } => {
                self.research_query = query.clone();
                self.research_results = results.clone();
                self.research_in_progress = false;
            }
            InboundEvent::AgentDone { message, .. } => {
                self.last_turn_note = message.clone();
                self.finish_turn(host);
            }
            InboundEvent::Complete { .. } => self.finish_turn(host),
            InboundEvent::Error {
                agent,
                content,
                is_timeout,
            } => {
                let agent = agent.clone().unwrap_or_else(|| SYSTEM_AGENT.to_string());
                let index = self.push_record(agent, MessageKind::Error, content.clone());
                self.transcript[index].is_timeout = *is_timeout;
                if *is_timeout {
                    self.stopped = true;
                }
            }
            InboundEvent::PlanCreated { plan } => host.plan_created(plan),
            InboundEvent::FileChange(_) | InboundEvent::ChangeResult { .. } | InboundEvent::Pong => {}
        }
    }

    /// Starts a new user turn: closes every open message and records `text`.
    pub fn push_user_message(&mut self, text: &str) -> MessageId {
        self.close_all();
        self.stopped = false;
        self.last_turn_note = None;
        let index = self.push_record(USER_AGENT.to_string(), MessageKind::User, text.to_string());
        self.transcript[index].id
    }

    /// Clears typing state without waiting for the backend's terminal event.
    pub fn stop(&mut self) {
        self.close_all();
        self.typing_agent = None;
        self.research_in_progress = false;
    }

    pub fn begin_research(&mut self, query: &str) {
        self.research_in_progress = true;
        self.research_query = Some(query.to_string());
    }

    pub fn clear(&mut self) {
        self.transcript.clear();
        self.open.clear();
        self.typing_agent = None;
        self.research_in_progress = false;
        self.last_turn_note = None;
    }

    fn open_index(&mut self, agent: &str) -> usize {
        if let Some(index) = self.open.get(agent) {
            return *index;
        }

        let id = self.allocate_id();
        self.transcript.push(Message::new(
            id,
            agent.to_string(),
            MessageKind::Agent,
            String::new(),
            false,
        ));
        let index = self.transcript.len() - 1;
        self.open.insert(agent.to_string(), index);
        index
    }

    fn push_record(&mut self, agent: String, kind: MessageKind, content: String) -> usize {
        let id = self.allocate_id();
        self.transcript.push(Message::new(id, agent, kind, content, true));
        self.transcript.len() - 1
    }

    fn allocate_id(&mut self) -> MessageId {
        self.next_id += 1;
        self.next_id
    }

    fn close_all(&mut self) {
        for (agent, index) in self.open.drain() {
            let message = &mut self.transcript[index];
            if message.sanitizer.has_pending_tag() {
                debug!(%agent, id = message.id, "message completed inside an unfinished tag");
            }
            message.complete = true;
        }
    }

    fn finish_turn(&mut self, host: &mut dyn ReducerHost) {
        self.close_all();
        self.typing_agent = None;
        self.research_in_progress = false;
        host.refresh_usage();
    }

    fn patch_latest(&mut self, concise: &str, is_status: bool) {
        let target = self.transcript.iter_mut().rev().find(|message| {
            !matches!(
                message.kind,
                MessageKind::User | MessageKind::Handoff | MessageKind::Status
            )
        });
        match target {
            Some(message) => {
                message.concise_content = Some(concise.to_string());
                message.is_status_placeholder = is_status;
            }
            None => debug!("message_update with no agent message to patch"),
        }
    }
}
