//! Pass rules
//!
//! A pass rule pairs an event field with a compiled pattern. When any rule
//! matches, the event is routine: it is still written to the sinks but
//! skips inhibition, the downstream pipe and upload.

use crate::error::{AuditError, Result};
use crate::event::Event;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Compiled string predicate
pub type Matcher = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Turns a pattern string into a [`Matcher`]
pub trait PatternCompiler: Send + Sync {
    fn compile(&self, pattern: &str) -> Result<Matcher>;
}

/// Shell-style glob patterns
///
/// - `*` matches any run of characters
/// - `?` matches exactly one character
/// - `a|b` matches either alternative
///
/// The whole value must match.
#[derive(Debug, Default, Clone, Copy)]
pub struct GrepCompiler;

impl PatternCompiler for GrepCompiler {
    fn compile(&self, pattern: &str) -> Result<Matcher> {
        let alternatives: Vec<String> = pattern.split('|').map(glob_to_regex).collect();
        let source = format!("^(?:{})$", alternatives.join("|"));
        let re = Regex::new(&source).map_err(|e| AuditError::Pattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Arc::new(move |value: &str| re.is_match(value)))
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2);
    let mut literal = String::new();
    for ch in glob.chars() {
        match ch {
            '*' | '?' => {
                out.push_str(&regex::escape(&std::mem::take(&mut literal)));
                out.push_str(if ch == '*' { ".*" } else { "." });
            }
            _ => literal.push(ch),
        }
    }
    out.push_str(&regex::escape(&literal));
    out
}

/// Raw regular expressions, unanchored
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexCompiler;

impl PatternCompiler for RegexCompiler {
    fn compile(&self, pattern: &str) -> Result<Matcher> {
        let re = Regex::new(pattern).map_err(|e| AuditError::Pattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Arc::new(move |value: &str| re.is_match(value)))
    }
}

/// One (field, pattern) predicate
#[derive(Clone)]
pub struct PassRule {
    field: String,
    pattern: String,
    matcher: Matcher,
}

impl PassRule {
    /// Compile a rule with the given pattern compiler
    pub fn new(
        field: impl Into<String>,
        pattern: impl Into<String>,
        compiler: &dyn PatternCompiler,
    ) -> Result<Self> {
        let pattern = pattern.into();
        let matcher = compiler.compile(&pattern)?;
        Ok(Self {
            field: field.into(),
            pattern,
            matcher,
        })
    }

    /// Compile a rule with [`GrepCompiler`]
    pub fn grep(field: impl Into<String>, pattern: impl Into<String>) -> Result<Self> {
        Self::new(field, pattern, &GrepCompiler)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, event: &Event) -> bool {
        (self.matcher)(&event.field(&self.field))
    }
}

impl fmt::Debug for PassRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassRule")
            .field("field", &self.field)
            .field("pattern", &self.pattern)
            .finish()
    }
}

/// True iff any rule matches; an empty rule set never passes
pub fn should_pass(rules: &[PassRule], event: &Event) -> bool {
    rules.iter().any(|rule| rule.matches(event))
}
