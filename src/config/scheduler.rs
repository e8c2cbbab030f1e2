//! Scheduler configuration structures.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::tier::{Threshold, ThresholdTable};

/// Prefix of environment variables read by [`SchedulerConfig::from_env`].
pub const ENV_PREFIX: &str = "TIER_SCHEDULER_";

/// One tier boundary: a bare number or a labelled value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdConfig {
    /// Unlabelled boundary.
    Value(f64),
    /// Boundary with a tier label.
    Labeled {
        /// Inclusive upper bound of admitted priority.
        value: f64,
        /// Tier label.
        label: String,
    },
}

impl ThresholdConfig {
    /// Boundary value.
    pub const fn value(&self) -> f64 {
        match self {
            Self::Value(value) | Self::Labeled { value, .. } => *value,
        }
    }
}

impl From<f64> for ThresholdConfig {
    fn from(value: f64) -> Self {
        Self::Value(value)
    }
}

impl From<(f64, &str)> for ThresholdConfig {
    fn from((value, label): (f64, &str)) -> Self {
        Self::Labeled {
            value,
            label: label.to_string(),
        }
    }
}

impl From<&ThresholdConfig> for Threshold {
    fn from(cfg: &ThresholdConfig) -> Self {
        match cfg {
            ThresholdConfig::Value(value) => Self::new(*value),
            ThresholdConfig::Labeled { value, label } => Self::labeled(*value, label.clone()),
        }
    }
}

/// Root scheduler configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Global ceiling on concurrently running tasks.
    pub max_concurrency: usize,
    /// Ascending tier boundaries; defines tier count and labels.
    pub thresholds: Vec<ThresholdConfig>,
    /// Priority units removed per unit of decay.
    pub base_decay_rate: f64,
    /// Length of one decay interval in milliseconds.
    pub decay_interval_ms: u64,
    /// Period of the aging sweep in milliseconds.
    pub priority_check_interval_ms: u64,
    /// Period of the expiry sweep in milliseconds.
    pub cleanup_interval_ms: u64,
    /// Maximum time a task may wait before it is expired, in milliseconds.
    pub task_ttl_ms: u64,
    /// Priority for submissions that omit one. Defaults to the last tier's threshold.
    pub default_priority: Option<f64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: num_cpus::get().max(1),
            thresholds: vec![(0.0, "high").into(), (10.0, "normal").into()],
            base_decay_rate: 1.0,
            decay_interval_ms: 1_000,
            priority_check_interval_ms: 1_000,
            cleanup_interval_ms: 60_000,
            task_ttl_ms: 300_000,
            default_priority: None,
        }
    }
}

impl SchedulerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be greater than 0".into());
        }
        ThresholdTable::check_values(self.thresholds.iter().map(ThresholdConfig::value))?;
        if !self.base_decay_rate.is_finite() || self.base_decay_rate < 0.0 {
            return Err("base_decay_rate must be a finite, non-negative number".into());
        }
        for (name, value) in [
            ("decay_interval_ms", self.decay_interval_ms),
            ("priority_check_interval_ms", self.priority_check_interval_ms),
            ("cleanup_interval_ms", self.cleanup_interval_ms),
            ("task_ttl_ms", self.task_ttl_ms),
        ] {
            if value == 0 {
                return Err(format!("{name} must be greater than 0"));
            }
        }
        if let Some(priority) = self.default_priority {
            if !priority.is_finite() {
                return Err("default_priority must be a finite number".into());
            }
        }
        Ok(())
    }

    /// Priority applied to submissions without an explicit one.
    pub fn resolved_default_priority(&self) -> f64 {
        self.default_priority
            .or_else(|| self.thresholds.last().map(ThresholdConfig::value))
            .unwrap_or(0.0)
    }

    /// Parse scheduler configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load overrides from the process environment (and a `.env` file, if
    /// present) on top of the defaults, then validate.
    ///
    /// Recognised variables, all prefixed with [`ENV_PREFIX`]:
    /// `MAX_CONCURRENCY`, `THRESHOLDS` (JSON array), `BASE_DECAY_RATE`,
    /// `DECAY_INTERVAL_MS`, `PRIORITY_CHECK_INTERVAL_MS`, `CLEANUP_INTERVAL_MS`,
    /// `TASK_TTL_MS`, `DEFAULT_PRIORITY`.
    pub fn from_env() -> Result<Self, String> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("failed to load .env file: {e}");
            }
        }
        Self::from_vars(std::env::vars())
    }

    /// Same as [`SchedulerConfig::from_env`] but reading from an explicit
    /// variable list. Unrelated variables are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut cfg = Self::default();
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref().trim();
            match name {
                "MAX_CONCURRENCY" => cfg.max_concurrency = parse_var(name, value)?,
                "THRESHOLDS" => {
                    cfg.thresholds = serde_json::from_str(value)
                        .map_err(|e| format!("{ENV_PREFIX}{name}: {e}"))?;
                }
                "BASE_DECAY_RATE" => cfg.base_decay_rate = parse_var(name, value)?,
                "DECAY_INTERVAL_MS" => cfg.decay_interval_ms = parse_var(name, value)?,
                "PRIORITY_CHECK_INTERVAL_MS" => {
                    cfg.priority_check_interval_ms = parse_var(name, value)?;
                }
                "CLEANUP_INTERVAL_MS" => cfg.cleanup_interval_ms = parse_var(name, value)?,
                "TASK_TTL_MS" => cfg.task_ttl_ms = parse_var(name, value)?,
                "DEFAULT_PRIORITY" => cfg.default_priority = Some(parse_var(name, value)?),
                other => tracing::debug!("ignoring unknown variable {ENV_PREFIX}{other}"),
            }
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| format!("{ENV_PREFIX}{name}: cannot parse `{value}`: {e}"))
}
