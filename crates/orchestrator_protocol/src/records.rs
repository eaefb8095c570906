use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kind of modification a change proposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Create,
    #[default]
    Edit,
    Delete,
}

impl ChangeAction {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "create" => Self::Create,
            "edit" => Self::Edit,
            "delete" => Self::Delete,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    #[default]
    File,
    Folder,
}

/// One row of the workspace listing (`GET /files`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: FileKind,
}

impl FileEntry {
    #[must_use]
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        let path = path.into();
        let extension = path
            .rsplit_once('.')
            .map(|(_, extension)| format!(".{extension}"));
        Self {
            path,
            size,
            modified: None,
            extension,
            kind: FileKind::File,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReadResponse {
    pub path: String,
    pub content: String,
}

/// Pending change as reported by `GET /pending-changes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChangeRecord {
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub action: ChangeAction,
    #[serde(default)]
    pub new_content: String,
    #[serde(default)]
    pub old_content: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChangesResponse {
    #[serde(default)]
    pub changes: Vec<PendingChangeRecord>,
}

/// Body returned by `POST /approve`.
///
/// `status` is `applied` or `rejected` on success and `failed` otherwise; a
/// failed decision can still arrive with HTTP 200.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub action: Option<ChangeAction>,
}

impl DecisionResponse {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status == "failed" || self.error.is_some()
    }
}

/// Search hit carried by `research_results`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    #[serde(default)]
    pub today_calls: u64,
    #[serde(default)]
    pub daily_limit: u64,
    #[serde(default)]
    pub remaining: u64,
    #[serde(default)]
    pub estimated_cost: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUsage {
    #[serde(default)]
    pub calls: u64,
    #[serde(default)]
    pub tokens_in: u64,
    #[serde(default)]
    pub tokens_out: u64,
    #[serde(default)]
    pub cost_estimate: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDay {
    pub date: String,
    #[serde(default)]
    pub calls: u64,
    #[serde(default)]
    pub cost: String,
}

/// Body returned by `GET /usage`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    #[serde(default)]
    pub today: UsageSummary,
    #[serde(default)]
    pub by_provider: BTreeMap<String, ProviderUsage>,
    #[serde(default)]
    pub history: Vec<UsageDay>,
}
