//! Append-only security event log.
//!
//! Stored at `state_dir/security.jsonl`. One JSON object per line:
//!
//! | Field | Description |
//! |-------|-------------|
//! | `ts` | RFC 3339 timestamp |
//! | `kind` | Error kind: `authentication`, `validation`, `not_found`, `backend_failure`, `unknown` |
//! | `status` | Status code carried by the error, if any |
//! | `message` | Internal message, credentials redacted |
//! | `error_id` | Identifier also shown to the caller for unexpected errors |
//! | `source` | Command that produced the failure |
//!
//! The log is never read back by the gateway itself; it exists for operators.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::redact::redact_secrets;
use crate::error::ErrorKind;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityEvent {
    pub ts: String,
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub message: String,
    pub error_id: String,
    pub source: String,
}

impl SecurityEvent {
    pub fn new(
        kind: ErrorKind,
        status: Option<u16>,
        message: &str,
        error_id: &str,
        source: &str,
    ) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339(),
            kind,
            status,
            message: redact_secrets(message),
            error_id: error_id.to_string(),
            source: source.to_string(),
        }
    }
}

/// Handle to the JSONL sink. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SecurityLog {
    path: PathBuf,
}

impl SecurityLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a single write so concurrent requests never interleave lines.
    pub async fn append(&self, event: &SecurityEvent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut line = serde_json::to_string(event).context("Failed to serialize security event")?;
        line.push('\n');

        let mut options = tokio::fs::OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open security log: {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .context("Failed to write security event")?;
        file.flush().await?;
        Ok(())
    }
}

/// Read every parseable event from a log file. Corrupt lines are skipped.
pub fn read_events(path: &Path) -> Result<Vec<SecurityEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read security log: {}", path.display()))?;

    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}
