use std::collections::VecDeque;

use orchestrator_protocol::{InboundEvent, SYSTEM_AGENT};
use time::OffsetDateTime;
use uuid::Uuid;

/// Maximum retained timeline entries.
pub const TIMELINE_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineKind {
    AgentStart,
    Handoff,
    FileChange,
    AgentStatus,
}

impl TimelineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentStart => "agent_start",
            Self::Handoff => "handoff",
            Self::FileChange => "file_change",
            Self::AgentStatus => "agent_status",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    pub id: Uuid,
    pub kind: TimelineKind,
    pub message: String,
    pub agent: String,
    pub timestamp: OffsetDateTime,
}

/// Bounded activity log derived from the inbound event stream.
///
/// Entries are newest-first. Nothing else in the session reads this log.
#[derive(Debug, Clone, Default)]
pub struct TimelineProjector {
    entries: VecDeque<TimelineEntry>,
}

impl TimelineProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `event` if it belongs to the tracked subset.
    pub fn observe(&mut self, event: &InboundEvent) {
        let Some((kind, agent, message)) = describe(event) else {
            return;
        };

        self.entries.push_front(TimelineEntry {
            id: Uuid::new_v4(),
            kind,
            message,
            agent,
            timestamp: OffsetDateTime::now_utc(),
        });
        self.entries.truncate(TIMELINE_CAPACITY);
    }

    pub fn entries(&self) -> impl ExactSizeIterator<Item = &TimelineEntry> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&TimelineEntry> {
        self.entries.front()
    }
}

fn describe(event: &InboundEvent) -> Option<(TimelineKind, String, String)> {
    match event {
        InboundEvent::AgentStart { agent } => Some((
            TimelineKind::AgentStart,
            agent.clone(),
            format!("{agent} started working"),
        )),
        InboundEvent::Handoff {
            from_agent,
            to_agent,
            ..
        } => Some((
            TimelineKind::Handoff,
            from_agent.clone(),
            format!("{from_agent} handed off to {to_agent}"),
        )),
        InboundEvent::FileChange(change) => Some((
            TimelineKind::FileChange,
            change
                .agent
                .clone()
                .unwrap_or_else(|| SYSTEM_AGENT.to_string()),
            format!("Proposed {} of {}", change.action.as_str(), change.path),
        )),
        InboundEvent::AgentStatus { agent, status } => Some((
            TimelineKind::AgentStatus,
            agent.clone().unwrap_or_else(|| SYSTEM_AGENT.to_string()),
            status.clone(),
        )),
        _ => None,
    }
}
