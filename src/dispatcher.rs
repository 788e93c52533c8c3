//! Audit dispatcher: per-event pipeline orchestration
//!
//! Every event handed to [`AuditDispatcher::handle`] runs the same ordered
//! stages: output to sinks, pass check, inhibition, pipe handoff and
//! upload. A failing stage is logged and the remaining stages still run;
//! nothing is returned to the producer.

use crate::config::DispatcherConfig;
use crate::env::Environment;
use crate::error::{AuditError, Result};
use crate::event::Event;
use crate::filter::{should_pass, PassRule};
use crate::inhibit::{suppress, InhibitRule};
use crate::pipe::{ErrorCallback, ExecutionContext, Pipe};
use crate::sink::{FileSink, Sink};
use crate::types::OpCode;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, RwLock};

/// State held while the dispatcher is running
struct Runtime {
    started_at: DateTime<Utc>,
    file: Option<Arc<FileSink>>,
}

/// Orchestrates the audit pipeline over an injected environment
pub struct AuditDispatcher {
    env: Arc<Environment>,
    config: RwLock<Arc<DispatcherConfig>>,
    /// Local file sink of the running dispatcher, read on every event
    file: RwLock<Option<Arc<FileSink>>>,
    /// Serializes start/close
    runtime: tokio::sync::Mutex<Option<Runtime>>,
}

impl AuditDispatcher {
    /// Create a stopped dispatcher
    pub fn new(env: Arc<Environment>, config: DispatcherConfig) -> Self {
        Self {
            env,
            config: RwLock::new(Arc::new(config)),
            file: RwLock::new(None),
            runtime: tokio::sync::Mutex::new(None),
        }
    }

    /// Create a stopped dispatcher with the default configuration
    pub fn with_defaults(env: Arc<Environment>) -> Self {
        Self::new(env, DispatcherConfig::default())
    }

    pub fn env(&self) -> &Arc<Environment> {
        &self.env
    }

    /// Current configuration snapshot
    pub fn snapshot(&self) -> Arc<DispatcherConfig> {
        self.config.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn name(&self) -> String {
        self.snapshot().name().to_string()
    }

    /// Open the local file sink and mark the dispatcher running
    ///
    /// A file that cannot be opened is logged; the dispatcher then runs
    /// without local output.
    pub async fn start(&self) -> Result<()> {
        let mut runtime = self.runtime.lock().await;
        let config = self.snapshot();
        if runtime.is_some() {
            return Err(AuditError::AlreadyRunning(config.name().to_string()));
        }

        let file = match FileSink::open(config.file()).await {
            Ok(sink) => Some(Arc::new(sink)),
            Err(e) => {
                tracing::error!(
                    dispatcher = config.name(),
                    file = %config.file().display(),
                    error = %e,
                    "Failed to open audit file, running without it"
                );
                None
            }
        };

        *self.file.write().unwrap_or_else(|p| p.into_inner()) = file.clone();
        *runtime = Some(Runtime {
            started_at: Utc::now(),
            file,
        });

        tracing::info!(
            dispatcher = config.name(),
            file = %config.file().display(),
            "Audit dispatcher started"
        );
        Ok(())
    }

    /// Close the local file sink and reset the configuration to defaults
    pub async fn close(&self) -> Result<()> {
        let mut runtime = self.runtime.lock().await;
        let name = self.name();
        let Some(state) = runtime.take() else {
            return Err(AuditError::NotRunning(name));
        };

        *self.file.write().unwrap_or_else(|p| p.into_inner()) = None;
        if let Some(file) = state.file {
            if let Err(e) = file.flush().await {
                tracing::warn!(dispatcher = %name, error = %e, "Failed to flush audit file");
            }
        }
        *self.config.write().unwrap_or_else(|p| p.into_inner()) =
            Arc::new(DispatcherConfig::default());

        tracing::info!(dispatcher = %name, "Audit dispatcher closed");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.runtime.lock().await.is_some()
    }

    /// When the running dispatcher was started
    pub async fn started_at(&self) -> Option<DateTime<Utc>> {
        self.runtime.lock().await.as_ref().map(|r| r.started_at)
    }

    /// Replace the whole configuration
    pub fn configure(&self, config: DispatcherConfig) -> Result<()> {
        config.verify()?;
        *self.config.write().unwrap_or_else(|p| p.into_inner()) = Arc::new(config);
        Ok(())
    }

    pub fn add_pass_rule(&self, rule: PassRule) {
        self.update(|c| c.with_pass_rule(rule));
    }

    pub fn add_inhibit_rule(&self, rule: InhibitRule) -> Result<()> {
        if rule.ttl().is_zero() {
            return Err(AuditError::Config(format!(
                "inhibit rule '{}' needs a ttl > 0",
                rule.template()
            )));
        }
        self.update(|c| c.with_inhibit_rule(rule));
        Ok(())
    }

    pub fn set_writer(&self, writer: Arc<dyn Sink>) {
        self.update(|c| c.with_writer(writer));
    }

    pub fn set_pipe(&self, pipe: Arc<dyn Pipe>) {
        self.update(|c| c.with_pipe(pipe));
    }

    /// Swap in a snapshot derived from the current one
    fn update(&self, edit: impl FnOnce(&DispatcherConfig) -> DispatcherConfig) {
        let mut guard = self.config.write().unwrap_or_else(|p| p.into_inner());
        let next = edit(&guard);
        *guard = Arc::new(next);
    }

    /// Run the pipeline for one event
    pub async fn handle(&self, mut event: Event) {
        let config = self.snapshot();
        let record = event.to_bytes();

        self.output(&config, &record).await;

        if should_pass(config.pass_rules(), &event) {
            tracing::debug!(
                dispatcher = config.name(),
                event_id = %event.id(),
                "Event passed, skipping inhibit and upload"
            );
            return;
        }

        if event.is_alert() && !self.env.is_debug() {
            let inhibited = suppress(
                config.inhibit_rules(),
                config.buckets(),
                config.policy(),
                self.env.store().as_ref(),
                &event,
            )
            .await;
            if inhibited {
                event.set_alert(false);
            }
        }

        let event = Arc::new(event);
        let ctx = ExecutionContext {
            dispatcher: config.name().to_string(),
            mode: self.env.mode(),
            debug: self.env.is_debug(),
        };
        config
            .pipe()
            .submit(Arc::clone(&event), &ctx, pipe_error_logger(config.name()));

        if event.is_upload() {
            self.upload(&event).await;
        }
    }

    /// Write the serialized event to every configured sink
    async fn output(&self, config: &DispatcherConfig, record: &[u8]) {
        let file = self
            .file
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .map(|f| f as Arc<dyn Sink>);

        let sinks: Vec<Arc<dyn Sink>> = config.writer().cloned().into_iter().chain(file).collect();
        if sinks.is_empty() {
            return;
        }

        let results = futures::future::join_all(sinks.iter().map(|s| s.write(record))).await;
        for (sink, result) in sinks.iter().zip(results) {
            if let Err(e) = result {
                tracing::error!(
                    dispatcher = config.name(),
                    sink = sink.name(),
                    error = %e,
                    "Audit sink write failed"
                );
            }
        }
    }

    /// Ship the event to the collector
    ///
    /// Inside a tokio runtime the send runs on a spawned task. Any other
    /// executor awaits it inline.
    async fn upload(&self, event: &Event) {
        let Some(transport) = self.env.transport().cloned() else {
            tracing::debug!(event_id = %event.id(), "No transport configured, upload skipped");
            return;
        };

        let payload = Bytes::from(event.to_bytes());
        let event_id = event.id().to_string();
        let send = async move {
            if let Err(e) = transport.send(OpCode::Event, payload).await {
                tracing::error!(
                    transport = transport.name(),
                    event_id = %event_id,
                    error = %e,
                    "Audit upload failed"
                );
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(send);
            }
            Err(_) => send.await,
        }
    }
}

fn pipe_error_logger(dispatcher: &str) -> ErrorCallback {
    let dispatcher = dispatcher.to_string();
    Arc::new(move |e: AuditError| {
        tracing::error!(dispatcher = %dispatcher, error = %e, "Audit pipe processing failed");
    })
}

impl fmt::Debug for AuditDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditDispatcher")
            .field("env", &self.env)
            .field("config", &self.snapshot())
            .finish_non_exhaustive()
    }
}
