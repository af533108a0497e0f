//! Per-component evaluation thresholds.

use std::time::Duration;

use chrono::TimeDelta;

/// Rejected threshold configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThresholdError {
    #[error("{0} must be > 0")]
    NotPositive(&'static str),

    #[error("{0} is out of range")]
    OutOfRange(&'static str),
}

/// Threshold and window settings for one component.
///
/// Only constructible through [`ThresholdConfig::new`], which rejects zero
/// thresholds and zero-length windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdConfig {
    critical_threshold: u32,
    degraded_threshold: u32,
    window: TimeDelta,
    recovery_window: TimeDelta,
}

impl ThresholdConfig {
    pub fn new(
        critical_threshold: u32,
        degraded_threshold: u32,
        window: Duration,
        recovery_window: Duration,
    ) -> Result<Self, ThresholdError> {
        if critical_threshold == 0 {
            return Err(ThresholdError::NotPositive("critical_threshold"));
        }
        if degraded_threshold == 0 {
            return Err(ThresholdError::NotPositive("degraded_threshold"));
        }
        if window.is_zero() {
            return Err(ThresholdError::NotPositive("window"));
        }
        if recovery_window.is_zero() {
            return Err(ThresholdError::NotPositive("recovery_window"));
        }

        Ok(Self {
            critical_threshold,
            degraded_threshold,
            window: TimeDelta::from_std(window)
                .map_err(|_| ThresholdError::OutOfRange("window"))?,
            recovery_window: TimeDelta::from_std(recovery_window)
                .map_err(|_| ThresholdError::OutOfRange("recovery_window"))?,
        })
    }

    /// Critical signals in the window needed to go CRITICAL.
    pub fn critical_threshold(&self) -> u32 {
        self.critical_threshold
    }

    /// Warning signals in the window needed to go DEGRADED.
    pub fn degraded_threshold(&self) -> u32 {
        self.degraded_threshold
    }

    pub fn window(&self) -> TimeDelta {
        self.window
    }

    pub fn recovery_window(&self) -> TimeDelta {
        self.recovery_window
    }
}
