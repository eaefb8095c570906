use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

use orchestrator_api::{OrchestratorConfig, ReconnectPolicy};
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "AGENT_SESSION_CONFIG_PATH";
pub const BASE_URL_ENV: &str = "AGENT_SESSION_BASE_URL";
pub const LOG_FILTER_ENV: &str = "AGENT_SESSION_LOG";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("config file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("config field `{0}` must be > 0")]
    ZeroDuration(&'static str),
    #[error("config field `{0}` must not be empty")]
    EmptyUrl(&'static str),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    base_url: Option<String>,
    ws_url: Option<String>,
    timeout_sec: Option<u64>,
    heartbeat_sec: Option<u64>,
    poll_interval_sec: Option<u64>,
    max_reconnect_attempts: Option<u32>,
}

/// Resolved settings for one `agent-session` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    pub orchestrator: OrchestratorConfig,
    pub poll_interval: Duration,
}

impl CliConfig {
    /// Reads `AGENT_SESSION_CONFIG_PATH` and `AGENT_SESSION_BASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let base_url = env::var(BASE_URL_ENV).ok();
        Self::load(path.as_deref(), base_url)
    }

    pub fn load(path: Option<&Path>, base_url_override: Option<String>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => read_config_file(path)?,
            None => ConfigFile::default(),
        };

        let base_url = match base_url_override.or(file.base_url) {
            Some(url) if url.trim().is_empty() => return Err(ConfigError::EmptyUrl("base_url")),
            Some(url) => url,
            None => OrchestratorConfig::default().base_url,
        };

        let mut orchestrator = OrchestratorConfig::new(base_url);
        if let Some(ws_url) = file.ws_url {
            if ws_url.trim().is_empty() {
                return Err(ConfigError::EmptyUrl("ws_url"));
            }
            orchestrator = orchestrator.with_ws_url(ws_url);
        }
        if let Some(timeout) = positive_secs("timeout_sec", file.timeout_sec)? {
            orchestrator = orchestrator.with_timeout(timeout);
        }
        if let Some(heartbeat) = positive_secs("heartbeat_sec", file.heartbeat_sec)? {
            orchestrator = orchestrator.with_heartbeat(heartbeat);
        }
        if let Some(max_attempts) = file.max_reconnect_attempts {
            orchestrator = orchestrator
                .with_reconnect_policy(ReconnectPolicy::default().with_max_attempts(max_attempts));
        }

        let poll_interval =
            positive_secs("poll_interval_sec", file.poll_interval_sec)?.unwrap_or(DEFAULT_POLL_INTERVAL);

        Ok(Self {
            orchestrator,
            poll_interval,
        })
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn positive_secs(field: &'static str, value: Option<u64>) -> Result<Option<Duration>, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::ZeroDuration(field)),
        Some(secs) => Ok(Some(Duration::from_secs(secs))),
        None => Ok(None),
    }
}
