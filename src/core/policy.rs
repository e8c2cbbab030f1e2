//! Concurrency allocation across tiers.

use serde::{Deserialize, Serialize};

/// Per-tier view exposed to concurrency policies and `get_state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSnapshot {
    /// Tier label, if configured.
    pub label: Option<String>,
    /// Quota for this tier. Inside a policy call this is the quota computed by
    /// the previous dispatch attempt; in `get_state` it is freshly computed.
    pub quota: usize,
    /// Tasks from this tier currently running.
    pub running: usize,
    /// Tasks waiting in this tier.
    pub pending: usize,
}

/// Scheduler state visible to concurrency policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStateSnapshot {
    /// Global concurrency ceiling.
    pub global_max: usize,
    /// Tasks running across all tiers.
    pub global_running: usize,
    /// Tasks waiting across all tiers.
    pub global_pending: usize,
    /// Per-tier state, tier 0 first.
    pub tiers: Vec<TierSnapshot>,
}

/// Decides how many tasks a tier may run concurrently.
///
/// Called on every dispatch attempt; results are never cached.
pub trait ConcurrencyPolicy: Send + Sync + 'static {
    /// Quota for `tier` given the current scheduler state.
    fn quota(&self, tier: usize, state: &SchedulerStateSnapshot) -> usize;
}

impl<F> ConcurrencyPolicy for F
where
    F: Fn(usize, &SchedulerStateSnapshot) -> usize + Send + Sync + 'static,
{
    fn quota(&self, tier: usize, state: &SchedulerStateSnapshot) -> usize {
        self(tier, state)
    }
}

/// Default two-phase weighted allocation.
///
/// Phase 1 gives tier `i` of `n` the share
/// `ceil(max * (n - i) / n * pending(i) / total_pending)`, capped at `pending(i)`.
/// Phase 2 lifts tier 0 to `min(ceil(max * top_tier_share), pending(0))` when
/// its phase-1 share leaves demand unmet.
#[derive(Debug, Clone, Copy)]
pub struct WeightedAllocation {
    /// Fraction of the global ceiling reserved for tier 0 under unmet demand.
    pub top_tier_share: f64,
}

impl Default for WeightedAllocation {
    fn default() -> Self {
        Self {
            top_tier_share: 0.6,
        }
    }
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
impl ConcurrencyPolicy for WeightedAllocation {
    fn quota(&self, tier: usize, state: &SchedulerStateSnapshot) -> usize {
        let total_tiers = state.tiers.len();
        let Some(current) = state.tiers.get(tier) else {
            return 0;
        };
        let pending = current.pending;
        if state.global_pending == 0 || pending == 0 {
            return 0;
        }

        let max = state.global_max as f64;
        let weight = (total_tiers - tier) as f64 / total_tiers as f64;
        let raw = (max * weight * pending as f64 / state.global_pending as f64).ceil() as usize;
        let mut share = raw.min(pending);

        if tier == 0 && share < pending {
            let reserved = ((max * self.top_tier_share).ceil() as usize).min(pending);
            share = share.max(reserved);
        }
        share
    }
}
