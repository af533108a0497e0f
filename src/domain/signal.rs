//! Health signals.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::ComponentId;

/// Signal severity, ordered `Info < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Stable numeric code used by persistent stores.
    pub fn code(self) -> i16 {
        match self {
            Severity::Info => 0,
            Severity::Warning => 1,
            Severity::Critical => 2,
        }
    }

    /// Inverse of [`Severity::code`].
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Severity::Info),
            1 => Some(Severity::Warning),
            2 => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive parse of `INFO`, `WARNING` or `CRITICAL`.
impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INFO" => Ok(Severity::Info),
            "WARNING" => Ok(Severity::Warning),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// An immutable health fact about one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal {
    pub component_id: ComponentId,
    pub severity: Severity,
    pub occurred_at: DateTime<Utc>,
}

impl Signal {
    pub fn new(component_id: ComponentId, severity: Severity, occurred_at: DateTime<Utc>) -> Self {
        Self {
            component_id,
            severity,
            occurred_at,
        }
    }
}
