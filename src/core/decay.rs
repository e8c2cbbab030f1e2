//! Priority aging: how a waiting task's effective priority falls over time.

use std::fmt;
use std::sync::Arc;

/// Maps elapsed decay intervals to a decay multiplier.
///
/// Implementations must be non-negative and non-decreasing; otherwise a waiting
/// task is no longer guaranteed to reach a more urgent tier eventually. The
/// scheduler does not enforce this.
pub trait DecayCurve: Send + Sync + 'static {
    /// Decay multiplier after `elapsed_units` whole intervals.
    fn decay(&self, elapsed_units: u64) -> f64;
}

impl<F> DecayCurve for F
where
    F: Fn(u64) -> f64 + Send + Sync + 'static,
{
    fn decay(&self, elapsed_units: u64) -> f64 {
        self(elapsed_units)
    }
}

/// Identity curve: one unit of decay per elapsed interval.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearDecay;

impl DecayCurve for LinearDecay {
    #[allow(clippy::cast_precision_loss)]
    fn decay(&self, elapsed_units: u64) -> f64 {
        elapsed_units as f64
    }
}

/// Effective-priority calculator.
///
/// `effective = base - base_decay_rate * curve(floor((now - submitted) / decay_interval_ms))`
#[derive(Clone)]
pub struct DecayModel {
    base_decay_rate: f64,
    decay_interval_ms: u64,
    curve: Arc<dyn DecayCurve>,
}

impl fmt::Debug for DecayModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecayModel")
            .field("base_decay_rate", &self.base_decay_rate)
            .field("decay_interval_ms", &self.decay_interval_ms)
            .finish_non_exhaustive()
    }
}

impl DecayModel {
    /// Build a model. A zero interval is treated as one millisecond.
    pub fn new(base_decay_rate: f64, decay_interval_ms: u64, curve: Arc<dyn DecayCurve>) -> Self {
        Self {
            base_decay_rate,
            decay_interval_ms: decay_interval_ms.max(1),
            curve,
        }
    }

    /// Whole decay intervals elapsed between `submitted_at_ms` and `now_ms`.
    pub const fn elapsed_units(&self, submitted_at_ms: u64, now_ms: u64) -> u64 {
        now_ms.saturating_sub(submitted_at_ms) / self.decay_interval_ms
    }

    /// Effective priority of a task at `now_ms`.
    pub fn effective_priority(&self, base_priority: f64, submitted_at_ms: u64, now_ms: u64) -> f64 {
        let units = self.elapsed_units(submitted_at_ms, now_ms);
        base_priority - self.base_decay_rate * self.curve.decay(units)
    }
}
