pub const HELP: &str = "\
Plain lines are sent to the agents as chat.
  /approve <id> [feedback]   apply a proposed change and resume
  /reject <id> [feedback]    discard a proposed change and resume
  /approve-all               approve every pending change in order
  /changes                   list pending changes
  /stop                      stop the running task
  /continue                  resume after a timeout
  /research <query>          run a web research query
  /open [path]               set (or clear) the current file
  /attach <path>             attach a file to every chat turn
  /detach <path>             remove an attached file
  /timeline                  show recent agent activity
  /usage                     show today's API usage
  /clear                     clear the transcript
  /quit                      exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Approve { id: String, feedback: Option<String> },
    Reject { id: String, feedback: Option<String> },
    ApproveAll,
    Changes,
    Stop,
    Continue,
    Research(String),
    Open(Option<String>),
    Attach(String),
    Detach(String),
    Timeline,
    Usage,
    Clear,
    Quit,
    /// A known command with missing arguments; carries the expected form.
    MissingArgument(&'static str),
    Unknown(String),
}

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (command, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };

    let parsed = match command {
        "/help" => SlashCommand::Help,
        "/approve" => match decision_args(rest) {
            Some((id, feedback)) => SlashCommand::Approve { id, feedback },
            None => SlashCommand::MissingArgument("/approve <id> [feedback]"),
        },
        "/reject" => match decision_args(rest) {
            Some((id, feedback)) => SlashCommand::Reject { id, feedback },
            None => SlashCommand::MissingArgument("/reject <id> [feedback]"),
        },
        "/approve-all" => SlashCommand::ApproveAll,
        "/changes" => SlashCommand::Changes,
        "/stop" => SlashCommand::Stop,
        "/continue" => SlashCommand::Continue,
        "/research" => required(rest, "/research <query>", SlashCommand::Research),
        "/open" => SlashCommand::Open(non_empty(rest)),
        "/attach" => required(rest, "/attach <path>", SlashCommand::Attach),
        "/detach" => required(rest, "/detach <path>", SlashCommand::Detach),
        "/timeline" => SlashCommand::Timeline,
        "/usage" => SlashCommand::Usage,
        "/clear" => SlashCommand::Clear,
        "/quit" | "/exit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command.to_string()),
    };

    Some(parsed)
}

fn decision_args(rest: &str) -> Option<(String, Option<String>)> {
    let (id, feedback) = match rest.split_once(char::is_whitespace) {
        Some((id, feedback)) => (id, non_empty(feedback.trim())),
        None => (rest, None),
    };
    non_empty(id).map(|id| (id, feedback))
}

fn required(
    rest: &str,
    usage: &'static str,
    build: impl FnOnce(String) -> SlashCommand,
) -> SlashCommand {
    match non_empty(rest) {
        Some(value) => build(value),
        None => SlashCommand::MissingArgument(usage),
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_slash_command("refactor the parser"), None);
        assert_eq!(parse_slash_command("  "), None);
    }

    #[test]
    fn bare_commands_parse() {
        assert_eq!(parse_slash_command("/help"), Some(SlashCommand::Help));
        assert_eq!(parse_slash_command(" /stop "), Some(SlashCommand::Stop));
        assert_eq!(parse_slash_command("/approve-all"), Some(SlashCommand::ApproveAll));
        assert_eq!(parse_slash_command("/exit"), Some(SlashCommand::Quit));
        assert_eq!(parse_slash_command("/open"), Some(SlashCommand::Open(None)));
    }

    #[test]
    fn decisions_split_id_from_feedback() {
        assert_eq!(
            parse_slash_command("/approve c1"),
            Some(SlashCommand::Approve {
                id: "c1".to_string(),
                feedback: None
            })
        );
        assert_eq!(
            parse_slash_command("/reject c2   use a dict instead "),
            Some(SlashCommand::Reject {
                id: "c2".to_string(),
                feedback: Some("use a dict instead".to_string())
            })
        );
    }

    #[test]
    fn missing_arguments_report_usage() {
        assert_eq!(
            parse_slash_command("/approve"),
            Some(SlashCommand::MissingArgument("/approve <id> [feedback]"))
        );
        assert_eq!(
            parse_slash_command("/research   "),
            Some(SlashCommand::MissingArgument("/research <query>"))
        );
        assert_eq!(
            parse_slash_command("/attach"),
            Some(SlashCommand::MissingArgument("/attach <path>"))
        );
    }

    #[test]
    fn path_arguments_keep_inner_spaces() {
        assert_eq!(
            parse_slash_command("/attach docs/design notes.md"),
            Some(SlashCommand::Attach("docs/design notes.md".to_string()))
        );
        assert_eq!(
            parse_slash_command("/research tokio select fairness"),
            Some(SlashCommand::Research("tokio select fairness".to_string()))
        );
    }

    #[test]
    fn unknown_command_is_reported() {
        assert_eq!(
            parse_slash_command("/deploy now"),
            Some(SlashCommand::Unknown("/deploy".to_string()))
        );
    }
}
