//! Output sinks
//!
//! Every event is written to every configured sink before anything else
//! happens to it. Sink failures are logged by the dispatcher and never
//! stop the pipeline.

use crate::error::{AuditError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Destination for serialized events
#[async_trait]
pub trait Sink: Send + Sync {
    /// Write one serialized event
    async fn write(&self, record: &[u8]) -> Result<()>;

    /// Sink name for logging
    fn name(&self) -> &str;
}

/// Append-only local log, one JSON object per line
pub struct FileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileSink {
    /// Open `path` for appending, creating it and its parent directory
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| AuditError::Sink {
                sink: path.display().to_string(),
                reason: format!("failed to create {}: {}", parent.display(), e),
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| AuditError::Sink {
                sink: path.display().to_string(),
                reason: format!("failed to open: {}", e),
            })?;

        tracing::debug!(path = %path.display(), "Audit file opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered writes to disk
    pub async fn flush(&self) -> Result<()> {
        let mut file = self.file.lock().await;
        file.flush().await.map_err(|e| self.sink_error(e))?;
        file.sync_all().await.map_err(|e| self.sink_error(e))
    }

    fn sink_error(&self, e: std::io::Error) -> AuditError {
        AuditError::Sink {
            sink: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn write(&self, record: &[u8]) -> Result<()> {
        let mut line = Vec::with_capacity(record.len() + 1);
        line.extend_from_slice(record);
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await.map_err(|e| self.sink_error(e))
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// In-memory sink for development and testing
#[derive(Debug, Default)]
pub struct MemorySink {
    name: String,
    records: std::sync::Mutex<Vec<Vec<u8>>>,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Everything written so far, oldest first
    pub fn records(&self) -> Vec<Vec<u8>> {
        self.records
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Records parsed as JSON; unparseable records are skipped
    pub fn json(&self) -> Vec<serde_json::Value> {
        self.records()
            .iter()
            .filter_map(|r| serde_json::from_slice(r).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn write(&self, record: &[u8]) -> Result<()> {
        self.records
            .lock()
            .map_err(|e| AuditError::Sink {
                sink: self.name.clone(),
                reason: format!("lock poisoned: {}", e),
            })?
            .push(record.to_vec());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
