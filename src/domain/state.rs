//! Component health states.

use std::collections::BTreeMap;
use std::fmt;

use super::ComponentId;

/// Health of a single component.
///
/// `Impacted` only ever comes out of propagation: the component looks fine
/// locally but a transitive upstream dependency is critical. `Impacted` and
/// `Degraded` are not ordered against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentState {
    /// No signal inside the evaluation window.
    Unknown,
    Healthy,
    Degraded,
    Critical,
    Impacted,
}

impl ComponentState {
    /// True while a component is in a locally elevated state and may need to
    /// recover.
    pub fn is_elevated(self) -> bool {
        matches!(self, ComponentState::Critical | ComponentState::Degraded)
    }

    /// Stable numeric code used by persistent stores.
    pub fn code(self) -> i16 {
        match self {
            ComponentState::Unknown => 0,
            ComponentState::Healthy => 1,
            ComponentState::Degraded => 2,
            ComponentState::Critical => 3,
            ComponentState::Impacted => 4,
        }
    }

    /// Inverse of [`ComponentState::code`].
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(ComponentState::Unknown),
            1 => Some(ComponentState::Healthy),
            2 => Some(ComponentState::Degraded),
            3 => Some(ComponentState::Critical),
            4 => Some(ComponentState::Impacted),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComponentState::Unknown => "UNKNOWN",
            ComponentState::Healthy => "HEALTHY",
            ComponentState::Degraded => "DEGRADED",
            ComponentState::Critical => "CRITICAL",
            ComponentState::Impacted => "IMPACTED",
        }
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Component states keyed by id, iterated in id order.
pub type StateMap = BTreeMap<ComponentId, ComponentState>;
