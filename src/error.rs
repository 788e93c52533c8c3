//! Error types for vela-audit

use thiserror::Error;

/// Boxed error attached to an event or returned by a collaborator
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur in the audit pipeline
#[derive(Debug, Error)]
pub enum AuditError {
    /// Configuration failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration table carried a key nobody recognizes
    #[error("Unknown configuration option '{0}'")]
    UnknownOption(String),

    /// `start()` on a running dispatcher
    #[error("{0} is running")]
    AlreadyRunning(String),

    /// `close()` on a dispatcher that is not running
    #[error("{0} can't close: not running")]
    NotRunning(String),

    /// Sink write failure
    #[error("Sink '{sink}' write failed: {reason}")]
    Sink {
        sink: String,
        reason: String,
    },

    /// Counter store failure
    #[error("Counter store error for {buckets:?} key '{key}': {reason}")]
    Store {
        buckets: Vec<String>,
        key: String,
        reason: String,
    },

    /// Region lookup failure
    #[error("Region lookup failed for '{ip}': {reason}")]
    Region {
        ip: String,
        reason: String,
    },

    /// Remote transport failure
    #[error("Transport '{transport}' send failed: {reason}")]
    Transport {
        transport: String,
        reason: String,
    },

    /// Downstream pipe handler failure
    #[error("Pipe error: {0}")]
    Pipe(String),

    /// Pass-rule pattern could not be compiled
    #[error("Invalid pattern '{pattern}': {reason}")]
    Pattern {
        pattern: String,
        reason: String,
    },

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Event message exceeded the size cap
    #[error("msg data too long: {len} bytes > {limit}")]
    MessageTooLong {
        len: usize,
        limit: usize,
    },

    /// Event message exceeded the size cap while another error was attached
    #[error("{cause}; msg data too long: {len} bytes > {limit}")]
    MessageTooLongWith {
        #[source]
        cause: BoxError,
        len: usize,
        limit: usize,
    },
}

/// Result type alias for audit operations
pub type Result<T> = std::result::Result<T, AuditError>;
