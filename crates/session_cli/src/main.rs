//! Headless line-oriented client for the multi-agent orchestrator.
//!
//! Plain stdin lines are chat turns; `/help` lists the slash commands. The
//! sanitized transcript goes to stdout and logs go to stderr, filtered by
//! `AGENT_SESSION_LOG` (default `warn`).

mod commands;
mod config;
mod render;

use std::io::{self, Write};

use agent_session::{DecisionOutcome, Session, SessionError};
use orchestrator_api::{ConnectionManager, OrchestratorClient};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{parse_slash_command, SlashCommand, HELP};
use crate::config::{CliConfig, LOG_FILTER_ENV};
use crate::render::Renderer;

type CliSession = Session<OrchestratorClient, ConnectionManager>;

enum Flow {
    Continue,
    Quit,
}

fn main() -> io::Result<()> {
    init_tracing();

    let config = CliConfig::from_env().map_err(io::Error::other)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(config));
    // A pending stdin read must not hold the process open.
    runtime.shutdown_background();
    result
}

fn init_tracing() {
    let default_level = "warn";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_FILTER_ENV)
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .try_init();
}

async fn run(config: CliConfig) -> io::Result<()> {
    let client = OrchestratorClient::new(config.orchestrator.clone()).map_err(io::Error::other)?;
    let (connection, mut events) =
        ConnectionManager::connect(&config.orchestrator).map_err(io::Error::other)?;
    let mut session = Session::new(client, connection);
    let mut renderer = Renderer::new(io::stdout());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut poll = tokio::time::interval(config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut channel_open = true;

    info!(base_url = %config.orchestrator.base_url, "agent-session started");
    renderer.system("type /help for commands")?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if let Flow::Quit = dispatch(&mut session, &mut renderer, &line).await? {
                    break;
                }
            }
            event = events.recv(), if channel_open => match event {
                Some(event) => {
                    session.handle(event);
                    session.run_effects().await;
                    for plan in session.take_plans() {
                        renderer.system(&format!("plan created: {plan}"))?;
                    }
                }
                None => channel_open = false,
            },
            _ = poll.tick() => {
                if let Err(error) = session.refresh_files().await {
                    debug!(%error, "file list poll failed");
                }
            }
        }
        renderer.frame(&session)?;
    }

    info!("agent-session exiting");
    Ok(())
}

async fn dispatch<W: Write>(
    session: &mut CliSession,
    renderer: &mut Renderer<W>,
    line: &str,
) -> io::Result<Flow> {
    let Some(command) = parse_slash_command(line) else {
        if let Err(error) = session.send_chat(line).await {
            renderer.error(&error.to_string())?;
        }
        return Ok(Flow::Continue);
    };

    match command {
        SlashCommand::Help => renderer.raw(HELP)?,
        SlashCommand::Quit => return Ok(Flow::Quit),
        SlashCommand::Approve { id, feedback } => {
            report_decision(renderer, session.approve(&id, feedback).await)?
        }
        SlashCommand::Reject { id, feedback } => {
            report_decision(renderer, session.reject(&id, feedback).await)?
        }
        SlashCommand::ApproveAll => match session.approve_all().await {
            Ok(outcomes) if outcomes.is_empty() => renderer.system("no pending changes")?,
            Ok(outcomes) => {
                for outcome in outcomes {
                    report_decision(renderer, Ok(outcome))?;
                }
            }
            Err(error) => renderer.error(&format!("approve-all stopped: {error}"))?,
        },
        SlashCommand::Changes => renderer.pending_list(session.changes().pending())?,
        SlashCommand::Stop => {
            if session.stop() {
                renderer.system("stop requested")?;
            } else {
                renderer.system("stopped locally; agent channel is not connected")?;
            }
        }
        SlashCommand::Continue => match session.continue_after_timeout().await {
            Ok(true) => {}
            Ok(false) => renderer.system("nothing to continue")?,
            Err(error) => renderer.error(&error.to_string())?,
        },
        SlashCommand::Research(query) => match session.research(&query) {
            Ok(_) => renderer.system(&format!("researching: {query}"))?,
            Err(error) => renderer.error(&error.to_string())?,
        },
        SlashCommand::Open(path) => {
            let line = match &path {
                Some(path) => format!("current file: {path}"),
                None => "current file cleared".to_string(),
            };
            session.select_file(path);
            renderer.system(&line)?;
        }
        SlashCommand::Attach(path) => {
            let line = if session.attach_file(path.as_str()) {
                format!("attached {path}")
            } else {
                format!("{path} is already attached")
            };
            renderer.system(&line)?;
        }
        SlashCommand::Detach(path) => {
            let line = if session.detach_file(&path) {
                format!("detached {path}")
            } else {
                format!("{path} was not attached")
            };
            renderer.system(&line)?;
        }
        SlashCommand::Timeline => renderer.timeline(session.timeline().entries())?,
        SlashCommand::Usage => {
            if let Err(error) = session.refresh_usage().await {
                warn!(%error, "usage refresh failed");
            }
            renderer.usage(session.usage())?;
        }
        SlashCommand::Clear => {
            session.clear_transcript();
            renderer.system("transcript cleared")?;
        }
        SlashCommand::MissingArgument(usage) => renderer.error(&format!("usage: {usage}"))?,
        SlashCommand::Unknown(command) => {
            renderer.error(&format!("unknown command {command}; try /help"))?
        }
    }

    Ok(Flow::Continue)
}

fn report_decision<W: Write>(
    renderer: &mut Renderer<W>,
    outcome: Result<DecisionOutcome, SessionError>,
) -> io::Result<()> {
    match outcome {
        Ok(outcome) => {
            let verb = if outcome.approved { "approved" } else { "rejected" };
            renderer.system(&format!("{verb} {}", outcome.change_id))?;
            if !outcome.resumed {
                renderer.error("agents were not resumed; the channel is down")?;
            }
            Ok(())
        }
        Err(error) if error.is_recoverable() => {
            renderer.error(&format!("{error}; the change is still pending"))
        }
        Err(error) => renderer.error(&error.to_string()),
    }
}
