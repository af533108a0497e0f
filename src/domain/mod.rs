//! Domain types shared by every engine.
//!
//! Components are identified by a stable [`ComponentId`]; signals are
//! immutable facts about a component; [`ComponentState`] is the per-component
//! health verdict produced by evaluation and propagation.

mod component;
mod signal;
mod state;
mod threshold;

pub use component::{Component, ComponentId};
pub use signal::{Severity, Signal};
pub use state::{ComponentState, StateMap};
pub use threshold::{ThresholdConfig, ThresholdError};
