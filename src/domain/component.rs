//! Component identity.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// Namespace for name-derived component identifiers.
///
/// Changing this value re-keys every persisted component.
const COMPONENT_NAMESPACE: Uuid = Uuid::from_bytes([
    0x3c, 0x1f, 0x8e, 0x52, 0x07, 0x4b, 0x5d, 0x2a, 0x9e, 0x61, 0xd4, 0x0b, 0x7c, 0x33, 0xa5,
    0x90,
]);

/// Opaque, stable component identifier.
///
/// Derived from the declared component name (UUID v5), so the same name always
/// maps to the same id across restarts.
///
/// Ordering is the byte order of the UUID, which is identical to the order of
/// its canonical lowercase hyphenated text form. Every deterministic iteration
/// in the engine (topological tie-breaks, dirty-set processing) relies on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(Uuid);

impl ComponentId {
    /// Wrap an existing UUID.
    pub const fn new(value: Uuid) -> Self {
        Self(value)
    }

    /// Deterministic id for a component name.
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&COMPONENT_NAMESPACE, name.as_bytes()))
    }

    /// Underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ComponentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for ComponentId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// A declared component: its stable id and human-readable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
}

impl Component {
    /// Declare a component, deriving its id from the name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: ComponentId::from_name(&name),
            name,
        }
    }
}
