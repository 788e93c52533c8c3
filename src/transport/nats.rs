//! NATS transport
//!
//! Publishes uploads to `<subject_prefix>.<opcode>` on a NATS server.

use super::Transport;
use crate::error::{AuditError, Result};
use crate::types::OpCode;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for [`NatsTransport`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsTransportConfig {
    /// Server URL
    pub url: String,

    /// Subject prefix; the op code is appended (`audit.event`)
    pub subject_prefix: String,

    /// Optional auth token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for NatsTransportConfig {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".to_string(),
            subject_prefix: "vela.audit".to_string(),
            token: None,
            connect_timeout_secs: 5,
            request_timeout_secs: 10,
        }
    }
}

impl NatsTransportConfig {
    /// Subject an op code is published to
    pub fn subject(&self, op: OpCode) -> String {
        format!("{}.{}", self.subject_prefix, op.as_str())
    }
}

/// Transport over core NATS publish
pub struct NatsTransport {
    client: async_nats::Client,
    config: NatsTransportConfig,
}

impl NatsTransport {
    /// Connect to the server
    pub async fn connect(config: NatsTransportConfig) -> Result<Self> {
        let client = build_connect_options(&config)
            .connect(&config.url)
            .await
            .map_err(|e| AuditError::Transport {
                transport: "nats".to_string(),
                reason: format!("connect {}: {}", config.url, e),
            })?;

        tracing::info!(url = %config.url, prefix = %config.subject_prefix, "Connected to NATS");

        Ok(Self { client, config })
    }

    /// Flush pending publishes to the server
    pub async fn flush(&self) -> Result<()> {
        self.client.flush().await.map_err(|e| AuditError::Transport {
            transport: "nats".to_string(),
            reason: format!("flush: {}", e),
        })
    }

    pub fn config(&self) -> &NatsTransportConfig {
        &self.config
    }

    /// Underlying client for advanced usage
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }
}

#[async_trait]
impl Transport for NatsTransport {
    async fn send(&self, op: OpCode, payload: Bytes) -> Result<()> {
        let subject = self.config.subject(op);
        self.client
            .publish(subject.clone(), payload)
            .await
            .map_err(|e| AuditError::Transport {
                transport: "nats".to_string(),
                reason: format!("publish to '{}': {}", subject, e),
            })?;

        tracing::trace!(subject = %subject, "Audit event published");
        Ok(())
    }

    fn name(&self) -> &str {
        "nats"
    }

    async fn health(&self) -> Result<bool> {
        Ok(matches!(
            self.client.connection_state(),
            async_nats::connection::State::Connected
        ))
    }
}

/// Build NATS connect options from config
fn build_connect_options(config: &NatsTransportConfig) -> async_nats::ConnectOptions {
    let mut opts = async_nats::ConnectOptions::new()
        .connection_timeout(Duration::from_secs(config.connect_timeout_secs))
        .request_timeout(Some(Duration::from_secs(config.request_timeout_secs)));

    if let Some(ref token) = config.token {
        opts = opts.token(token.clone());
    }

    opts
}
