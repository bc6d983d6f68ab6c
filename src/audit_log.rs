//! Append-only audit trail of processed files.
//!
//! Every processing attempt contributes at most one line. The file is opened in
//! append mode for each entry and the whole line goes out in a single write, so
//! concurrent attempts may interleave lines but never overwrite each other.

use crate::error::{Error, Result};
use crate::types::LogEntry;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Shared audit log file.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a single line.
    pub async fn append(&self, entry: &LogEntry) -> Result<()> {
        let line = format!("{}\n", entry);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(Error::AuditLog)?;
        file.write_all(line.as_bytes()).await.map_err(Error::AuditLog)?;
        file.flush().await.map_err(Error::AuditLog)?;

        Ok(())
    }
}
