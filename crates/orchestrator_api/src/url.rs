use crate::error::OrchestratorApiError;

/// Default base URL of the orchestrator backend.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
/// Path of the agent channel relative to the base URL.
pub const AGENT_CHANNEL_PATH: &str = "/ws/agents";

/// Trim whitespace and trailing slashes, falling back to the default base.
pub fn normalize_base_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        input.trim()
    };

    base.trim_end_matches('/').to_string()
}

/// Join a collaborator endpoint path onto a base URL.
pub fn endpoint_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        normalize_base_url(base),
        path.trim_start_matches('/')
    )
}

/// Derive the agent channel URL from an HTTP(S) base URL.
///
/// Normalization rules:
/// 1) `http`/`ws` become `ws`, `https`/`wss` become `wss`
/// 2) keep a path already ending in `/ws/agents` unchanged
/// 3) append `/ws/agents` otherwise
pub fn websocket_url(base: &str) -> Result<String, OrchestratorApiError> {
    let base = normalize_base_url(base);
    let mut url = ::url::Url::parse(&base)
        .map_err(|error| OrchestratorApiError::InvalidBaseUrl(format!("{base}: {error}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(OrchestratorApiError::InvalidBaseUrl(format!(
                "{base}: unsupported scheme '{other}'"
            )))
        }
    };
    url.set_scheme(scheme).map_err(|()| {
        OrchestratorApiError::InvalidBaseUrl(format!("{base}: cannot switch scheme to {scheme}"))
    })?;

    let path = url.path().trim_end_matches('/').to_string();
    if !path.ends_with(AGENT_CHANNEL_PATH) {
        url.set_path(&format!("{path}{AGENT_CHANNEL_PATH}"));
    }

    Ok(url.to_string())
}
