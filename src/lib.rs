//! # vela-audit
//!
//! Audit-event pipeline for the Vela security agent.
//!
//! ## Overview
//!
//! `vela-audit` records security-relevant events, writes them to local and
//! external sinks, rate-limits repeated alerts through a TTL counter store,
//! forwards events to a downstream processing pipe and uploads them to a
//! remote collector. Every collaborator (counter store, transport, region
//! lookup, ID generation) is injected through an [`Environment`].
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use vela_audit::{AuditDispatcher, DispatcherConfig, Environment, Event, MemorySink};
//!
//! # async fn example() -> vela_audit::Result<()> {
//! let env = Arc::new(Environment::default());
//! let sink = Arc::new(MemorySink::new("sdk"));
//!
//! let config = DispatcherConfig::builder()
//!     .to(sink.clone())
//!     .pass("from", "cron*")
//!     .build()?;
//! let dispatcher = AuditDispatcher::new(env.clone(), config);
//!
//! Event::new(&env, "ssh")
//!     .with_subject("login failed")
//!     .with_remote("10.0.0.8:52011")
//!     .with_user("root")
//!     .with_alert()
//!     .put(&dispatcher)
//!     .await;
//!
//! assert_eq!(sink.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! Each event runs, in order: output to sinks, pass check, inhibition,
//! pipe handoff, upload. Failures are logged through `tracing` and never
//! returned to the producer.
//!
//! ## Architecture
//!
//! - **Event**: builder-style audit record, sealed by `put`
//! - **Template**: compiled `$field` templates for inhibition keys
//! - **PassRule**: field pattern that marks an event as routine
//! - **InhibitRule**: fingerprint template plus TTL window
//! - **AuditDispatcher**: orchestrates the pipeline over a config snapshot
//! - **CounterStore** / **Sink** / **Pipe** / **Transport**: collaborator traits

pub mod config;
pub mod dispatcher;
pub mod env;
pub mod error;
pub mod event;
pub mod filter;
pub mod inhibit;
pub mod pipe;
pub mod sink;
pub mod store;
pub mod template;
pub mod transport;
pub mod types;

// Re-export core types
pub use config::{AuditOptions, DispatcherConfig, DispatcherConfigBuilder, InhibitOption, PassOption};
pub use dispatcher::AuditDispatcher;
pub use env::{Environment, EnvironmentBuilder, IdGenerator, NoRegion, RegionLookup, StaticRegions, UuidIds};
pub use error::{AuditError, BoxError, Result};
pub use event::{Event, EventOption, EventRecord, Remote, MAX_MSG_BYTES};
pub use filter::{GrepCompiler, PassRule, PatternCompiler, RegexCompiler};
pub use inhibit::{InhibitRule, SuppressPolicy};
pub use pipe::{ChannelPipe, ErrorCallback, ExecutionContext, HandlerPipe, Pipe};
pub use sink::{FileSink, MemorySink, Sink};
pub use store::{CounterStore, MemoryCounterStore};
pub use template::Template;
pub use types::{Level, OpCode, Region, RunMode};

// Re-export transports for convenience
pub use transport::memory::MemoryTransport;
pub use transport::nats::{NatsTransport, NatsTransportConfig};
pub use transport::Transport;
