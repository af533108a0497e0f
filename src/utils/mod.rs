//! Process-wide helpers: tracing bootstrap and time sources.

pub mod bootstrap;
pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};
