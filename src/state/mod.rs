//! Per-component state evaluation.
//!
//! Turns a component's raw signal history into its isolated state using
//! windowed threshold counts plus a silence-based recovery rule.

use chrono::{DateTime, Utc};

use crate::domain::{ComponentState, Severity, Signal, ThresholdConfig};

/// Derives a component's isolated state from its own signals.
pub trait StateEvaluator: Send + Sync {
    fn evaluate(
        &self,
        signals: &[Signal],
        previous_state: ComponentState,
        config: &ThresholdConfig,
        now: DateTime<Utc>,
    ) -> ComponentState;
}

/// Pure, deterministic evaluator.
///
/// 1. No signals, or none inside `[now - window, now]`: UNKNOWN.
/// 2. Critical count in the window reaches the critical threshold: CRITICAL.
/// 3. Warning count in the window reaches the degraded threshold: DEGRADED.
/// 4. Previously CRITICAL/DEGRADED: stays put while a WARNING or CRITICAL
///    signal landed in `(now - recovery_window, now]`, else HEALTHY. INFO
///    signals are evidence of health, not of an ongoing problem.
/// 5. Otherwise HEALTHY.
///
/// Signals dated after `now` never count.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicStateEvaluator;

impl DeterministicStateEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl StateEvaluator for DeterministicStateEvaluator {
    fn evaluate(
        &self,
        signals: &[Signal],
        previous_state: ComponentState,
        config: &ThresholdConfig,
        now: DateTime<Utc>,
    ) -> ComponentState {
        if signals.is_empty() {
            return ComponentState::Unknown;
        }

        let window_start = now - config.window();
        let in_window = || {
            signals
                .iter()
                .filter(move |s| s.occurred_at <= now && s.occurred_at >= window_start)
        };

        if in_window().next().is_none() {
            return ComponentState::Unknown;
        }

        let critical = in_window()
            .filter(|s| s.severity == Severity::Critical)
            .count();
        if critical >= config.critical_threshold() as usize {
            return ComponentState::Critical;
        }

        let warnings = in_window()
            .filter(|s| s.severity == Severity::Warning)
            .count();
        if warnings >= config.degraded_threshold() as usize {
            return ComponentState::Degraded;
        }

        if previous_state.is_elevated() {
            let recovery_start = now - config.recovery_window();
            let recent_trouble = signals.iter().any(|s| {
                s.severity != Severity::Info
                    && s.occurred_at <= now
                    && s.occurred_at > recovery_start
            });
            return if recent_trouble {
                previous_state
            } else {
                ComponentState::Healthy
            };
        }

        ComponentState::Healthy
    }
}
