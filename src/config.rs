//! Dispatcher configuration
//!
//! `DispatcherConfig` is the live, immutable configuration of a dispatcher.
//! It is replaced wholesale, never edited in place while events flow.
//! `AuditOptions` is the declarative option table it can be built from;
//! unknown keys are a hard error.

use crate::error::{AuditError, Result};
use crate::filter::{GrepCompiler, PassRule, PatternCompiler};
use crate::inhibit::{InhibitRule, SuppressPolicy};
use crate::pipe::{HandlerPipe, Pipe};
use crate::sink::Sink;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Dispatcher name used in logs and lifecycle errors
pub const DEFAULT_NAME: &str = "vela.audit";
/// Local log file
pub const DEFAULT_FILE: &str = "vela.audit.log";
/// Counter bucket for inhibition fingerprints
pub const DEFAULT_BUCKET: &str = "audit_inhibit_record";
/// Fingerprint of the built-in inhibit rule
pub const DEFAULT_INHIBIT_TEMPLATE: &str = "$inet_$id_$typeof_$from";
/// Window of the built-in inhibit rule
pub const DEFAULT_INHIBIT_TTL_SECS: u64 = 5 * 60;

/// Keys accepted in an option table
const KNOWN_OPTIONS: &[&str] = &["file", "to", "pass", "inhibit", "buckets", "policy"];

/// Declarative option table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditOptions {
    /// Local sink path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Name of a registered external writer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    /// Pass rules, appended in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pass: Vec<PassOption>,

    /// Inhibit rules, appended after the built-in rule
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inhibit: Vec<InhibitOption>,

    /// Counter bucket path; replaces the default when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buckets: Option<Vec<String>>,

    /// Suppression policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<SuppressPolicy>,
}

/// `{ "field": ..., "pattern": ... }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PassOption {
    pub field: String,
    pub pattern: String,
}

/// `{ "template": ..., "ttl": seconds }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InhibitOption {
    pub template: String,
    pub ttl: u64,
}

impl AuditOptions {
    /// Parse an option table from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse an option table from a JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let table = value
            .as_object()
            .ok_or_else(|| AuditError::Config("options must be a table".to_string()))?;

        if let Some(key) = table.keys().find(|k| !KNOWN_OPTIONS.contains(&k.as_str())) {
            return Err(AuditError::UnknownOption(key.clone()));
        }

        serde_json::from_value(value).map_err(|e| AuditError::Config(e.to_string()))
    }
}

/// Live configuration of a dispatcher
#[derive(Clone)]
pub struct DispatcherConfig {
    name: String,
    file: PathBuf,
    writer: Option<Arc<dyn Sink>>,
    pass: Vec<PassRule>,
    inhibit: Vec<InhibitRule>,
    buckets: Vec<String>,
    policy: SuppressPolicy,
    pipe: Arc<dyn Pipe>,
}

impl DispatcherConfig {
    pub fn builder() -> DispatcherConfigBuilder {
        DispatcherConfigBuilder::default()
    }

    /// Build from an option table
    ///
    /// `to` is resolved against `writers`; an unknown writer name is a
    /// configuration error.
    pub fn from_options(
        options: AuditOptions,
        writers: &HashMap<String, Arc<dyn Sink>>,
    ) -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(file) = options.file {
            builder = builder.file(file);
        }
        if let Some(name) = options.to {
            let writer = writers
                .get(&name)
                .ok_or_else(|| AuditError::Config(format!("writer '{}' not found", name)))?;
            builder = builder.to(Arc::clone(writer));
        }
        for pass in options.pass {
            builder = builder.pass(pass.field, pass.pattern);
        }
        for inhibit in options.inhibit {
            builder = builder.inhibit(inhibit.template, inhibit.ttl);
        }
        if let Some(buckets) = options.buckets {
            builder = builder.buckets(buckets);
        }
        if let Some(policy) = options.policy {
            builder = builder.policy(policy);
        }

        builder.build()
    }

    /// Reject settings that cannot work
    pub fn verify(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(AuditError::Config("name cannot be empty".to_string()));
        }
        if self.file.as_os_str().is_empty() {
            return Err(AuditError::Config("file cannot be empty".to_string()));
        }
        if let Some(rule) = self.inhibit.iter().find(|r| r.ttl().is_zero()) {
            return Err(AuditError::Config(format!(
                "inhibit rule '{}' needs a ttl > 0",
                rule.template()
            )));
        }
        if self.buckets.iter().any(|b| b.is_empty()) {
            return Err(AuditError::Config("bucket names cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn writer(&self) -> Option<&Arc<dyn Sink>> {
        self.writer.as_ref()
    }

    pub fn pass_rules(&self) -> &[PassRule] {
        &self.pass
    }

    pub fn inhibit_rules(&self) -> &[InhibitRule] {
        &self.inhibit
    }

    pub fn buckets(&self) -> &[String] {
        &self.buckets
    }

    pub fn policy(&self) -> SuppressPolicy {
        self.policy
    }

    pub fn pipe(&self) -> &Arc<dyn Pipe> {
        &self.pipe
    }

    // Copy-on-write edits used by the dispatcher's reconfiguration calls

    pub(crate) fn with_pass_rule(&self, rule: PassRule) -> Self {
        let mut next = self.clone();
        next.pass.push(rule);
        next
    }

    pub(crate) fn with_inhibit_rule(&self, rule: InhibitRule) -> Self {
        let mut next = self.clone();
        next.inhibit.push(rule);
        next
    }

    pub(crate) fn with_writer(&self, writer: Arc<dyn Sink>) -> Self {
        let mut next = self.clone();
        next.writer = Some(writer);
        next
    }

    pub(crate) fn with_pipe(&self, pipe: Arc<dyn Pipe>) -> Self {
        let mut next = self.clone();
        next.pipe = pipe;
        next
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            file: PathBuf::from(DEFAULT_FILE),
            writer: None,
            pass: Vec::new(),
            inhibit: vec![InhibitRule::from_secs(
                DEFAULT_INHIBIT_TEMPLATE,
                DEFAULT_INHIBIT_TTL_SECS,
            )],
            buckets: vec![DEFAULT_BUCKET.to_string()],
            policy: SuppressPolicy::default(),
            pipe: Arc::new(HandlerPipe::new()),
        }
    }
}

impl fmt::Debug for DispatcherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherConfig")
            .field("name", &self.name)
            .field("file", &self.file)
            .field("writer", &self.writer.as_ref().map(|w| w.name().to_string()))
            .field("pass", &self.pass)
            .field("inhibit", &self.inhibit)
            .field("buckets", &self.buckets)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`DispatcherConfig`]
///
/// Starts from the defaults. The first pattern compilation error is kept
/// and returned by `build`.
pub struct DispatcherConfigBuilder {
    config: DispatcherConfig,
    compiler: Arc<dyn PatternCompiler>,
    error: Option<AuditError>,
}

impl Default for DispatcherConfigBuilder {
    fn default() -> Self {
        Self {
            config: DispatcherConfig::default(),
            compiler: Arc::new(GrepCompiler),
            error: None,
        }
    }
}

impl DispatcherConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn file(mut self, file: impl Into<PathBuf>) -> Self {
        self.config.file = file.into();
        self
    }

    /// External writer sink
    pub fn to(mut self, writer: Arc<dyn Sink>) -> Self {
        self.config.writer = Some(writer);
        self
    }

    /// Compiler used by subsequent `pass` calls
    pub fn compiler(mut self, compiler: impl PatternCompiler + 'static) -> Self {
        self.compiler = Arc::new(compiler);
        self
    }

    /// Add a pass rule on `field`
    pub fn pass(mut self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        match PassRule::new(field, pattern, self.compiler.as_ref()) {
            Ok(rule) => self.config.pass.push(rule),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    pub fn pass_rule(mut self, rule: PassRule) -> Self {
        self.config.pass.push(rule);
        self
    }

    /// Add an inhibit rule with a TTL in seconds
    pub fn inhibit(mut self, template: impl Into<String>, ttl_secs: u64) -> Self {
        self.config
            .inhibit
            .push(InhibitRule::from_secs(template, ttl_secs));
        self
    }

    pub fn inhibit_rule(mut self, rule: InhibitRule) -> Self {
        self.config.inhibit.push(rule);
        self
    }

    /// Drop every inhibit rule added so far, the built-in one included
    pub fn clear_inhibit(mut self) -> Self {
        self.config.inhibit.clear();
        self
    }

    /// Replace the counter bucket path
    pub fn buckets<I, S>(mut self, buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.buckets = buckets.into_iter().map(Into::into).collect();
        self
    }

    /// Append one segment to the counter bucket path
    pub fn bucket(mut self, name: impl Into<String>) -> Self {
        self.config.buckets.push(name.into());
        self
    }

    pub fn policy(mut self, policy: SuppressPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    pub fn pipe(mut self, pipe: impl Pipe + 'static) -> Self {
        self.config.pipe = Arc::new(pipe);
        self
    }

    pub fn shared_pipe(mut self, pipe: Arc<dyn Pipe>) -> Self {
        self.config.pipe = pipe;
        self
    }

    /// Finish and verify
    pub fn build(self) -> Result<DispatcherConfig> {
        if let Some(e) = self.error {
            return Err(e);
        }
        self.config.verify()?;
        Ok(self.config)
    }
}
