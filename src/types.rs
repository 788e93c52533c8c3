//! Shared value types for the audit pipeline
//!
//! All enums use lowercase JSON serialization for wire compatibility.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of an audit event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Routine (lowest, default)
    #[default]
    Notice,
    /// Minor
    Middle,
    /// Important
    High,
    /// Emergency
    Disaster,
}

impl Level {
    /// Map the numeric severity used by producers
    ///
    /// `0 → notice`, `1 → middle`, `2 → high`, `4 → disaster`; every other
    /// value falls back to notice.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Level::Middle,
            2 => Level::High,
            4 => Level::Disaster,
            _ => Level::Notice,
        }
    }

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Notice => "notice",
            Level::Middle => "middle",
            Level::High => "high",
            Level::Disaster => "disaster",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process operating mode
///
/// `Event::log` only writes to the process log in worker mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Managed worker node
    Worker,
    /// Anything else (CLI, tests, embedded use)
    #[default]
    Standalone,
}

/// Operation code passed to the remote transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpCode {
    /// An audit event upload
    Event,
}

impl OpCode {
    /// Subject-safe name of the op code
    pub fn as_str(&self) -> &'static str {
        match self {
            OpCode::Event => "event",
        }
    }
}

/// Result of a GeoIP region lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub country: String,
    pub province: String,
    pub city: String,
    pub isp: String,
}

impl Region {
    /// Create a region from its parts
    pub fn new(
        country: impl Into<String>,
        province: impl Into<String>,
        city: impl Into<String>,
        isp: impl Into<String>,
    ) -> Self {
        Self {
            country: country.into(),
            province: province.into(),
            city: city.into(),
            isp: isp.into(),
        }
    }
}

/// `country|province|city|isp`, the form stored on events
impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.country, self.province, self.city, self.isp
        )
    }
}
