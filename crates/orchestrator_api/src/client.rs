use orchestrator_protocol::{
    DecisionResponse, FileEntry, FileListResponse, FileReadResponse, PendingChangeRecord,
    PendingChangesResponse, UsageStats,
};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::OrchestratorConfig;
use crate::error::{parse_error_message, OrchestratorApiError};
use crate::url::{endpoint_url, normalize_base_url};

/// HTTP client for the orchestrator's collaborator endpoints.
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    http: Client,
    config: OrchestratorConfig,
}

#[derive(Debug, Serialize)]
struct DecisionRequest<'a> {
    change_id: &'a str,
    approved: bool,
}

impl OrchestratorClient {
    pub fn new(config: OrchestratorConfig) -> Result<Self, OrchestratorApiError> {
        let base = normalize_base_url(&config.base_url);
        ::url::Url::parse(&base)
            .map_err(|error| OrchestratorApiError::InvalidBaseUrl(format!("{base}: {error}")))?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn endpoint(&self, path: &str) -> String {
        endpoint_url(&self.config.base_url, path)
    }

    /// `GET /files`
    pub async fn list_files(&self) -> Result<Vec<FileEntry>, OrchestratorApiError> {
        let listing: FileListResponse = self.get_json("files").await?;
        Ok(listing.files)
    }

    /// `GET /files/{path}`
    pub async fn read_file(&self, path: &str) -> Result<String, OrchestratorApiError> {
        let file: FileReadResponse = self
            .get_json(&format!("files/{}", path.trim_start_matches('/')))
            .await?;
        Ok(file.content)
    }

    /// `GET /pending-changes`
    pub async fn pending_changes(&self) -> Result<Vec<PendingChangeRecord>, OrchestratorApiError> {
        let pending: PendingChangesResponse = self.get_json("pending-changes").await?;
        Ok(pending.changes)
    }

    /// `GET /usage`
    pub async fn usage(&self) -> Result<UsageStats, OrchestratorApiError> {
        self.get_json("usage").await
    }

    /// `POST /approve`
    ///
    /// A body reporting `status: "failed"` is returned as
    /// [`OrchestratorApiError::DecisionFailed`] even when the HTTP status is 200.
    pub async fn decide_change(
        &self,
        change_id: &str,
        approved: bool,
    ) -> Result<DecisionResponse, OrchestratorApiError> {
        let response = self
            .http
            .post(self.endpoint("approve"))
            .json(&DecisionRequest {
                change_id,
                approved,
            })
            .send()
            .await?;
        let decision: DecisionResponse = decode_response(response).await?;

        if decision.is_failure() {
            return Err(OrchestratorApiError::DecisionFailed {
                change_id: change_id.to_string(),
                message: decision
                    .error
                    .clone()
                    .unwrap_or_else(|| decision.status.clone()),
            });
        }

        debug!(change_id, approved, status = %decision.status, "change decision confirmed");
        Ok(decision)
    }

    async fn get_json<T>(&self, path: &str) -> Result<T, OrchestratorApiError>
    where
        T: DeserializeOwned,
    {
        let response = self.http.get(self.endpoint(path)).send().await?;
        decode_response(response).await
    }
}

async fn decode_response<T>(response: Response) -> Result<T, OrchestratorApiError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(OrchestratorApiError::Status(
            status,
            parse_error_message(status, &body),
        ));
    }

    Ok(serde_json::from_str(&body)?)
}
