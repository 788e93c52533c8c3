//! Downstream stream-processing pipe
//!
//! After inhibition, each event that was not passed is handed to a pipe
//! together with an execution context and an error callback. Handoff is
//! fire-and-forget: `submit` must not block on downstream work, and pipe
//! failures reach the callback rather than the producer.

use crate::error::{AuditError, Result};
use crate::event::Event;
use crate::types::RunMode;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receives pipe processing errors
pub type ErrorCallback = Arc<dyn Fn(AuditError) + Send + Sync>;

/// Context a pipe runs its handlers in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Name of the dispatcher submitting the event
    pub dispatcher: String,
    pub mode: RunMode,
    pub debug: bool,
}

/// Stream-processing stage events are handed to
pub trait Pipe: Send + Sync {
    fn submit(&self, event: Arc<Event>, ctx: &ExecutionContext, on_error: ErrorCallback);
}

/// Single pipe step
pub type Handler = Arc<dyn Fn(&Event, &ExecutionContext) -> Result<()> + Send + Sync>;

/// Ordered handlers run inline
///
/// A failing handler reports through the error callback; the handlers
/// after it still run.
#[derive(Clone, Default)]
pub struct HandlerPipe {
    handlers: Vec<Handler>,
}

impl HandlerPipe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler
    pub fn with<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Event, &ExecutionContext) -> Result<()> + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Pipe for HandlerPipe {
    fn submit(&self, event: Arc<Event>, ctx: &ExecutionContext, on_error: ErrorCallback) {
        for handler in &self.handlers {
            if let Err(e) = handler(&event, ctx) {
                on_error(e);
            }
        }
    }
}

impl fmt::Debug for HandlerPipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerPipe")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Forwards events into a bounded channel for an async consumer
///
/// A full or closed channel is reported through the error callback and
/// the event is dropped for this pipe.
#[derive(Debug, Clone)]
pub struct ChannelPipe {
    tx: mpsc::Sender<Arc<Event>>,
}

impl ChannelPipe {
    /// Create a pipe and the receiving end of its channel
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Arc<Event>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl Pipe for ChannelPipe {
    fn submit(&self, event: Arc<Event>, _ctx: &ExecutionContext, on_error: ErrorCallback) {
        if let Err(e) = self.tx.try_send(event) {
            let reason = match e {
                mpsc::error::TrySendError::Full(ev) => {
                    format!("channel full, dropped event {}", ev.id())
                }
                mpsc::error::TrySendError::Closed(ev) => {
                    format!("channel closed, dropped event {}", ev.id())
                }
            };
            on_error(AuditError::Pipe(reason));
        }
    }
}
