//! Builder assembling a [`Scheduler`] from configuration and strategy objects.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{SchedulerConfig, ThresholdConfig};
use crate::core::decay::{DecayCurve, DecayModel, LinearDecay};
use crate::core::policy::{ConcurrencyPolicy, WeightedAllocation};
use crate::core::scheduler::{Scheduler, SchedulerSettings};
use crate::core::tier::{Threshold, ThresholdTable};
use crate::core::{SchedulerError, Spawn};
use crate::runtime::TokioSpawner;
use crate::util::clock::{Clock, SystemClock};

/// Builds a [`Scheduler`].
///
/// Serializable options live in [`SchedulerConfig`]; strategies (decay curve,
/// concurrency policy), the clock and the spawner are injected here.
///
/// # Example
///
/// ```rust,ignore
/// let scheduler = SchedulerBuilder::<u64>::new()
///     .max_concurrency(8)
///     .thresholds([(0.0, "interactive"), (10.0, "batch")])
///     .decay_curve(|units: u64| (units as f64).sqrt())
///     .build()?;
/// ```
pub struct SchedulerBuilder<T> {
    config: SchedulerConfig,
    decay_curve: Arc<dyn DecayCurve>,
    policy: Arc<dyn ConcurrencyPolicy>,
    clock: Arc<dyn Clock>,
    spawner: Option<Arc<dyn Spawn>>,
    _result: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for SchedulerBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerBuilder")
            .field("config", &self.config)
            .field("custom_spawner", &self.spawner.is_some())
            .finish_non_exhaustive()
    }
}

impl<T> Default for SchedulerBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SchedulerBuilder<T> {
    /// Start from default configuration and strategies.
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            decay_curve: Arc::new(LinearDecay),
            policy: Arc::new(WeightedAllocation::default()),
            clock: Arc::new(SystemClock),
            spawner: None,
            _result: PhantomData,
        }
    }

    /// Replace the whole serializable configuration.
    #[must_use]
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Configuration accumulated so far.
    pub const fn current_config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Global ceiling on concurrently running tasks.
    #[must_use]
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.config.max_concurrency = max;
        self
    }

    /// Tier boundaries, most urgent first.
    #[must_use]
    pub fn thresholds<I, C>(mut self, thresholds: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ThresholdConfig>,
    {
        self.config.thresholds = thresholds.into_iter().map(Into::into).collect();
        self
    }

    /// Priority units removed per unit of decay.
    #[must_use]
    pub fn base_decay_rate(mut self, rate: f64) -> Self {
        self.config.base_decay_rate = rate;
        self
    }

    /// Length of one decay interval.
    #[must_use]
    pub fn decay_interval_ms(mut self, ms: u64) -> Self {
        self.config.decay_interval_ms = ms;
        self
    }

    /// Period of the aging sweep.
    #[must_use]
    pub fn priority_check_interval_ms(mut self, ms: u64) -> Self {
        self.config.priority_check_interval_ms = ms;
        self
    }

    /// Period of the expiry sweep.
    #[must_use]
    pub fn cleanup_interval_ms(mut self, ms: u64) -> Self {
        self.config.cleanup_interval_ms = ms;
        self
    }

    /// Maximum wait before a pending task is expired.
    #[must_use]
    pub fn task_ttl_ms(mut self, ms: u64) -> Self {
        self.config.task_ttl_ms = ms;
        self
    }

    /// Priority for submissions that omit one.
    #[must_use]
    pub fn default_priority(mut self, priority: f64) -> Self {
        self.config.default_priority = Some(priority);
        self
    }

    /// Decay curve applied to elapsed intervals.
    #[must_use]
    pub fn decay_curve(mut self, curve: impl DecayCurve) -> Self {
        self.decay_curve = Arc::new(curve);
        self
    }

    /// Per-tier quota strategy.
    #[must_use]
    pub fn concurrency_policy(mut self, policy: impl ConcurrencyPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Time source for submission timestamps, decay and expiry.
    #[must_use]
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Runtime used for task execution and sweeps. Defaults to the current tokio runtime.
    #[must_use]
    pub fn spawner(mut self, spawner: impl Spawn) -> Self {
        self.spawner = Some(Arc::new(spawner));
        self
    }
}

impl<T: Send + 'static> SchedulerBuilder<T> {
    /// Validate the configuration and start the scheduler with its sweeps.
    pub fn build(self) -> Result<Scheduler<T>, SchedulerError> {
        self.config
            .validate()
            .map_err(SchedulerError::Configuration)?;
        let table = ThresholdTable::new(self.config.thresholds.iter().map(Threshold::from).collect())?;
        let spawner: Arc<dyn Spawn> = match self.spawner {
            Some(spawner) => spawner,
            None => Arc::new(TokioSpawner::current()?),
        };

        let cfg = &self.config;
        Ok(Scheduler::from_settings(SchedulerSettings {
            max_concurrency: cfg.max_concurrency,
            decay: DecayModel::new(cfg.base_decay_rate, cfg.decay_interval_ms, self.decay_curve),
            default_priority: cfg.resolved_default_priority(),
            task_ttl_ms: cfg.task_ttl_ms,
            priority_check_interval: Duration::from_millis(cfg.priority_check_interval_ms),
            cleanup_interval: Duration::from_millis(cfg.cleanup_interval_ms),
            table,
            policy: self.policy,
            clock: self.clock,
            spawner,
        }))
    }
}
