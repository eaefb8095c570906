use std::collections::HashSet;
use std::io::{self, Write};

use agent_session::{
    Change, Message, MessageId, MessageKind, OrchestratorBackend, OutboundChannel, Session,
    TimelineEntry,
};
use orchestrator_api::{ConnectionState, ConnectionStatus};
use orchestrator_protocol::{ResearchResult, UsageStats};

/// Line-oriented transcript printer.
///
/// Each completed message is printed exactly once. Open messages are held back
/// until the agent finishes, so partial tags never reach the terminal. The
/// printed and announced sets only track what the session still holds.
pub struct Renderer<W> {
    out: W,
    printed: HashSet<MessageId>,
    announced: HashSet<String>,
    connection: Option<ConnectionStatus>,
    research: Vec<ResearchResult>,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: HashSet::new(),
            announced: HashSet::new(),
            connection: None,
            research: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn system(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "* {line}")?;
        self.out.flush()
    }

    pub fn error(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "! {line}")?;
        self.out.flush()
    }

    pub fn raw(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")?;
        self.out.flush()
    }

    /// Prints everything that became visible since the previous frame.
    pub fn frame<B, C>(&mut self, session: &Session<B, C>) -> io::Result<()>
    where
        B: OrchestratorBackend,
        C: OutboundChannel,
    {
        self.connection(session.connection())?;
        self.transcript(session.conversation().transcript())?;
        self.new_changes(session.changes().pending())?;
        self.research(session.conversation().research_results())?;
        self.out.flush()
    }

    pub fn connection(&mut self, status: ConnectionStatus) -> io::Result<()> {
        if self.connection == Some(status) {
            return Ok(());
        }
        let first = self.connection.is_none();
        self.connection = Some(status);
        if first && status.state == ConnectionState::Disconnected && !status.terminal {
            return Ok(());
        }
        match describe_connection(status) {
            Some(line) if status.terminal => writeln!(self.out, "! {line}"),
            Some(line) => writeln!(self.out, "* {line}"),
            None => Ok(()),
        }
    }

    pub fn transcript(&mut self, messages: &[Message]) -> io::Result<()> {
        let live: HashSet<MessageId> = messages.iter().map(|message| message.id).collect();
        self.printed.retain(|id| live.contains(id));

        for message in messages {
            if !message.complete || self.printed.contains(&message.id) {
                continue;
            }
            self.printed.insert(message.id);
            if let Some(text) = format_message(message) {
                writeln!(self.out, "{text}")?;
            }
        }
        Ok(())
    }

    pub fn new_changes(&mut self, pending: &[Change]) -> io::Result<()> {
        self.announced
            .retain(|id| pending.iter().any(|change| &change.id == id));

        for change in pending {
            if self.announced.insert(change.id.clone()) {
                writeln!(
                    self.out,
                    "* proposed {}; /approve {} or /reject {}",
                    describe_change(change),
                    change.id,
                    change.id
                )?;
            }
        }
        Ok(())
    }

    pub fn research(&mut self, results: &[ResearchResult]) -> io::Result<()> {
        if results == self.research.as_slice() {
            return Ok(());
        }
        self.research = results.to_vec();
        for (index, result) in results.iter().enumerate() {
            writeln!(self.out, "  {}. {} <{}>", index + 1, result.title, result.url)?;
            if !result.snippet.is_empty() {
                writeln!(self.out, "     {}", result.snippet)?;
            }
        }
        Ok(())
    }

    pub fn pending_list(&mut self, pending: &[Change]) -> io::Result<()> {
        if pending.is_empty() {
            return self.system("no pending changes");
        }
        for change in pending {
            writeln!(
                self.out,
                "  {} [{}] {}",
                change.id,
                change.status.as_str(),
                describe_change(change)
            )?;
        }
        self.out.flush()
    }

    pub fn timeline<'a>(
        &mut self,
        entries: impl ExactSizeIterator<Item = &'a TimelineEntry>,
    ) -> io::Result<()> {
        if entries.len() == 0 {
            return self.system("no activity yet");
        }
        for entry in entries {
            writeln!(
                self.out,
                "  {:<12} {}: {}",
                entry.kind.as_str(),
                entry.agent,
                entry.message
            )?;
        }
        self.out.flush()
    }

    pub fn usage(&mut self, usage: Option<&UsageStats>) -> io::Result<()> {
        let Some(usage) = usage else {
            return self.system("usage not loaded yet");
        };
        let today = &usage.today;
        writeln!(
            self.out,
            "* today: {} calls of {} ({} remaining), estimated cost {}",
            today.today_calls, today.daily_limit, today.remaining, today.estimated_cost
        )?;
        for (provider, stats) in &usage.by_provider {
            writeln!(
                self.out,
                "  {provider}: {} calls, {} in / {} out tokens",
                stats.calls, stats.tokens_in, stats.tokens_out
            )?;
        }
        self.out.flush()
    }
}

/// Printable form of one completed record. `None` for records with nothing
/// left to show once tags are stripped.
pub fn format_message(message: &Message) -> Option<String> {
    match message.kind {
        MessageKind::User => None,
        MessageKind::Handoff => Some(format!("-- {}", message.content)),
        MessageKind::Status => Some(format!("* {}: {}", message.agent, message.content)),
        MessageKind::Error if message.is_timeout => Some(format!(
            "! {}: {} (type /continue to resume)",
            message.agent, message.content
        )),
        MessageKind::Error => Some(format!("! {}: {}", message.agent, message.content)),
        MessageKind::Agent => {
            let text = message.display();
            if text.display.is_empty() && text.commands.is_empty() {
                return None;
            }
            let mut out = format!("[{}] {}", message.agent, text.display);
            for command in &text.commands {
                out.push_str("\n  $ ");
                out.push_str(command);
            }
            Some(out)
        }
    }
}

fn describe_connection(status: ConnectionStatus) -> Option<String> {
    if status.terminal {
        return Some(format!(
            "agent channel closed after {} reconnect attempts; restart to reconnect",
            status.attempts
        ));
    }
    match status.state {
        ConnectionState::Connected => Some("connected".to_string()),
        ConnectionState::Connecting if status.attempts > 0 => {
            Some(format!("reconnecting (attempt {})", status.attempts))
        }
        ConnectionState::Connecting => None,
        ConnectionState::Disconnected => Some("disconnected".to_string()),
    }
}

fn describe_change(change: &Change) -> String {
    match change.agent.as_deref() {
        Some(agent) => format!("{} {} by {agent}", change.action.as_str(), change.path),
        None => format!("{} {}", change.action.as_str(), change.path),
    }
}
