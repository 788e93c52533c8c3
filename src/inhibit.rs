//! Alert inhibition
//!
//! Suppresses repeated alerts. Each rule renders a fingerprint key from
//! the event, increments a TTL-bound counter for that key in the counter
//! store, and suppresses when the returned count crosses the policy
//! threshold. Store failures count as "no match": inhibition must never
//! block delivery.

use crate::event::Event;
use crate::store::CounterStore;
use crate::template::Template;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When a post-increment count suppresses an alert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuppressPolicy {
    /// Let the first alert of a fingerprint window through, silence repeats
    /// (count >= 2)
    #[default]
    Repeats,
    /// Silence every alert that reaches a rule, the first included
    /// (count >= 1)
    Always,
}

impl SuppressPolicy {
    fn threshold(&self) -> i64 {
        match self {
            SuppressPolicy::Repeats => 2,
            SuppressPolicy::Always => 1,
        }
    }

    pub fn suppresses(&self, count: i64) -> bool {
        count >= self.threshold()
    }
}

/// Compiled fingerprint template with its window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InhibitRule {
    template: Template,
    ttl: Duration,
}

impl InhibitRule {
    pub fn new(template: impl Into<String>, ttl: Duration) -> Self {
        Self {
            template: Template::compile(template),
            ttl,
        }
    }

    /// TTL given in whole seconds
    pub fn from_secs(template: impl Into<String>, ttl_secs: u64) -> Self {
        Self::new(template, Duration::from_secs(ttl_secs))
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fingerprint key for `event`
    pub fn key(&self, event: &Event) -> String {
        self.template.render(event)
    }
}

/// Decide whether an alerting event should be demoted
///
/// Rules are tried in order and the first rule whose counter crosses the
/// policy threshold wins. Without buckets or without rules nothing is
/// ever suppressed.
pub async fn suppress(
    rules: &[InhibitRule],
    buckets: &[String],
    policy: SuppressPolicy,
    store: &dyn CounterStore,
    event: &Event,
) -> bool {
    if buckets.is_empty() || rules.is_empty() {
        return false;
    }

    for rule in rules {
        let key = rule.key(event);
        match store.increment(buckets, &key, 1, rule.ttl).await {
            Ok(count) if policy.suppresses(count) => {
                tracing::debug!(
                    event_id = %event.id(),
                    key = %key,
                    count,
                    template = %rule.template,
                    "Alert inhibited"
                );
                return true;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(
                    store = store.name(),
                    buckets = ?buckets,
                    key = %key,
                    error = %e,
                    "Inhibit counter increment failed"
                );
            }
        }
    }

    false
}
