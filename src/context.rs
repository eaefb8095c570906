use std::future::Future;

use orchestrator_api::OrchestratorApiError;
use orchestrator_protocol::{ChatContext, FileEntry, FileSnapshot};
use tracing::warn;

/// Workspace file access used when assembling outbound context.
pub trait FileSource {
    fn list_files(&self) -> impl Future<Output = Result<Vec<FileEntry>, OrchestratorApiError>>;
    fn read_file(&self, path: &str) -> impl Future<Output = Result<String, OrchestratorApiError>>;
}

/// Inputs for the context attached to every chat message and resume send.
///
/// The file list is a replaceable snapshot: the poller and the post-reconnect
/// resync both overwrite it and the last writer wins. File contents are never
/// cached here; every assembly reads them again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextAssembler {
    files: Vec<FileEntry>,
    current_file: Option<String>,
    attached: Vec<String>,
}

impl ContextAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn current_file(&self) -> Option<&str> {
        self.current_file.as_deref()
    }

    pub fn attached(&self) -> &[String] {
        &self.attached
    }

    pub fn set_files(&mut self, files: Vec<FileEntry>) {
        self.files = files;
    }

    pub fn select(&mut self, path: Option<String>) {
        self.current_file = path;
    }

    /// Returns false when `path` is already attached.
    pub fn attach(&mut self, path: String) -> bool {
        if self.attached.contains(&path) {
            return false;
        }
        self.attached.push(path);
        true
    }

    pub fn detach(&mut self, path: &str) -> bool {
        let before = self.attached.len();
        self.attached.retain(|attached| attached != path);
        self.attached.len() != before
    }

    /// Builds a context payload from fresh reads.
    ///
    /// A failed read yields a snapshot with `content: None`; the send goes
    /// ahead with whatever could be read.
    pub async fn assemble<S>(&self, source: &S) -> ChatContext
    where
        S: FileSource,
    {
        let current_file = match self.current_file.as_deref() {
            Some(path) => Some(read_snapshot(source, path).await),
            None => None,
        };

        let mut attached_files = Vec::with_capacity(self.attached.len());
        for path in &self.attached {
            attached_files.push(read_snapshot(source, path).await);
        }

        ChatContext {
            files: self.files.clone(),
            current_file,
            attached_files,
        }
    }
}

async fn read_snapshot<S>(source: &S, path: &str) -> FileSnapshot
where
    S: FileSource,
{
    match source.read_file(path).await {
        Ok(content) => FileSnapshot::new(path, Some(content)),
        Err(error) => {
            warn!(path, %error, "context read failed; sending without content");
            FileSnapshot::new(path, None)
        }
    }
}
