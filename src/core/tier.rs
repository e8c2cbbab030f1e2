//! Priority tiers: the threshold table and the per-tier runtime state.

use serde::{Deserialize, Serialize};

use crate::core::heap::PriorityHeap;
use crate::core::SchedulerError;

/// Upper bound (inclusive) of the priorities admitted by one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Inclusive upper bound of admitted priority.
    pub value: f64,
    /// Optional human-readable tier name.
    pub label: Option<String>,
}

impl Threshold {
    /// Unlabelled threshold.
    pub const fn new(value: f64) -> Self {
        Self { value, label: None }
    }

    /// Labelled threshold.
    pub fn labeled(value: f64, label: impl Into<String>) -> Self {
        Self {
            value,
            label: Some(label.into()),
        }
    }
}

/// Ordered partition of priority space into tiers.
///
/// Tier 0 is the most urgent. The last tier also catches every priority above
/// its own threshold.
#[derive(Debug, Clone)]
pub struct ThresholdTable {
    thresholds: Vec<Threshold>,
}

impl ThresholdTable {
    /// Build a table from strictly ascending, finite thresholds.
    pub fn new(thresholds: Vec<Threshold>) -> Result<Self, SchedulerError> {
        Self::check_values(thresholds.iter().map(|t| t.value))
            .map_err(SchedulerError::Configuration)?;
        Ok(Self { thresholds })
    }

    /// Check that threshold values are non-empty, finite and strictly ascending.
    pub fn check_values<I>(values: I) -> Result<(), String>
    where
        I: IntoIterator<Item = f64>,
    {
        let values: Vec<f64> = values.into_iter().collect();
        if values.is_empty() {
            return Err("at least one threshold must be defined".into());
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(format!("threshold {bad} is not a finite number"));
        }
        if let Some(pair) = values.windows(2).find(|w| w[0] >= w[1]) {
            return Err(format!(
                "thresholds must be strictly ascending: {} is followed by {}",
                pair[0], pair[1]
            ));
        }
        Ok(())
    }

    /// Number of tiers.
    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    /// Always false: a table holds at least one tier.
    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// Threshold of tier `index`.
    pub fn get(&self, index: usize) -> Option<&Threshold> {
        self.thresholds.get(index)
    }

    /// All thresholds, most urgent first.
    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    /// First tier whose threshold admits `priority`, else the last tier.
    pub fn tier_for(&self, priority: f64) -> usize {
        self.thresholds
            .iter()
            .position(|t| t.value >= priority)
            .unwrap_or(self.thresholds.len() - 1)
    }
}

/// Runtime state of one tier, owned by the scheduler.
pub(crate) struct Tier<I> {
    pub(crate) threshold: Threshold,
    /// Tasks dispatched from this tier and not yet finished.
    pub(crate) running: usize,
    /// Quota computed by the most recent dispatch attempt.
    pub(crate) last_quota: usize,
    pub(crate) heap: PriorityHeap<I>,
}

impl<I> Tier<I> {
    pub(crate) fn new(threshold: Threshold) -> Self {
        Self {
            threshold,
            running: 0,
            last_quota: 0,
            heap: PriorityHeap::new(),
        }
    }
}
