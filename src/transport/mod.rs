//! Remote transport for uploaded events
//!
//! The dispatcher hands every event marked for upload to a `Transport`.
//! Sends run off the producer's path; failures are logged with the
//! transport name and never retried by the dispatcher.

use crate::error::Result;
use crate::types::OpCode;
use async_trait::async_trait;
use bytes::Bytes;

pub mod memory;
pub mod nats;

/// Channel to the remote collector
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one payload tagged with `op`
    async fn send(&self, op: OpCode, payload: Bytes) -> Result<()>;

    /// Transport name (e.g., "nats", "memory"), used in logs
    fn name(&self) -> &str;

    /// Health check; true if the transport can currently send
    ///
    /// Default implementation reports healthy.
    async fn health(&self) -> Result<bool> {
        Ok(true)
    }
}
