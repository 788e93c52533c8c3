//! In-memory transport for development and testing

use super::Transport;
use crate::error::{AuditError, Result};
use crate::types::OpCode;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::RwLock;
use std::time::Duration;

/// One recorded send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub op: OpCode,
    pub payload: Bytes,
}

/// Records every send; can be switched into a failing mode
#[derive(Debug)]
pub struct MemoryTransport {
    name: String,
    sent: RwLock<Vec<Sent>>,
    fail_with: RwLock<Option<String>>,
}

impl MemoryTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sent: RwLock::new(Vec::new()),
            fail_with: RwLock::new(None),
        }
    }

    /// Make every following send fail with `reason` (`None` restores)
    pub fn set_failure(&self, reason: Option<String>) {
        *self.fail_with.write().unwrap_or_else(|p| p.into_inner()) = reason;
    }

    /// Sends recorded so far, oldest first
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Recorded payloads parsed as JSON
    pub fn json(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .filter_map(|s| serde_json::from_slice(&s.payload).ok())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sent.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Wait until at least `n` sends were recorded or `timeout` elapses
    pub async fn wait_for(&self, n: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.count() >= n {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, op: OpCode, payload: Bytes) -> Result<()> {
        let failure = self
            .fail_with
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        if let Some(reason) = failure {
            return Err(AuditError::Transport {
                transport: self.name.clone(),
                reason,
            });
        }

        self.sent
            .write()
            .map_err(|e| AuditError::Transport {
                transport: self.name.clone(),
                reason: format!("lock poisoned: {}", e),
            })?
            .push(Sent { op, payload });
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn health(&self) -> Result<bool> {
        Ok(self
            .fail_with
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .is_none())
    }
}
