//! Configuration types.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const ENV_TICK_INTERVAL_MS: &str = "DEVTEAM_TICK_INTERVAL_MS";
const ENV_MAX_CONCURRENT_TASKS: &str = "DEVTEAM_MAX_CONCURRENT_TASKS";
const ENV_RETRY_MAX_ATTEMPTS: &str = "DEVTEAM_RETRY_MAX_ATTEMPTS";
const ENV_RETRY_DELAY_MS: &str = "DEVTEAM_RETRY_DELAY_MS";
const ENV_STRICT_TRANSITIONS: &str = "DEVTEAM_STRICT_TRANSITIONS";

/// Ceiling on the number of tasks the scheduler keeps in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyLimit {
    /// No ceiling; every eligible task is dispatched on the tick it becomes eligible.
    #[default]
    Unbounded,
    /// At most this many tasks in flight.
    Max(NonZeroUsize),
}

impl ConcurrencyLimit {
    /// Build a bounded limit. Zero is rejected.
    pub fn max(n: usize) -> Result<Self, ConfigError> {
        NonZeroUsize::new(n)
            .map(Self::Max)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "max_concurrent_tasks".to_string(),
                message: "must be a positive integer".to_string(),
            })
    }

    /// Free slots given the number of tasks currently running.
    pub fn capacity(&self, running: usize) -> usize {
        match self {
            Self::Unbounded => usize::MAX,
            Self::Max(max) => max.get().saturating_sub(running),
        }
    }
}

impl std::fmt::Display for ConcurrencyLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::Max(max) => write!(f, "{max}"),
        }
    }
}

/// Retry behaviour for agent execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Pause between a failed attempt and the next one.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(1000),
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Time between scheduling ticks.
    pub tick_interval: Duration,
    /// Concurrency ceiling applied at selection time.
    pub max_concurrent_tasks: ConcurrencyLimit,
    /// Retry policy for agent execution faults.
    pub retry: RetryConfig,
    /// Whether the task store rejects transitions outside the lifecycle.
    pub strict_transitions: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            max_concurrent_tasks: ConcurrencyLimit::Unbounded,
            retry: RetryConfig::default(),
            strict_transitions: true,
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from `DEVTEAM_*` environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64>(&lookup, ENV_TICK_INTERVAL_MS)? {
            if ms == 0 {
                return Err(invalid(ENV_TICK_INTERVAL_MS, "must be greater than zero"));
            }
            config.tick_interval = Duration::from_millis(ms);
        }

        if let Some(max) = parse_var::<usize>(&lookup, ENV_MAX_CONCURRENT_TASKS)? {
            config.max_concurrent_tasks = ConcurrencyLimit::max(max)
                .map_err(|_| invalid(ENV_MAX_CONCURRENT_TASKS, "must be a positive integer"))?;
        }

        if let Some(attempts) = parse_var::<u32>(&lookup, ENV_RETRY_MAX_ATTEMPTS)? {
            if attempts == 0 {
                return Err(invalid(ENV_RETRY_MAX_ATTEMPTS, "must be at least 1"));
            }
            config.retry.max_attempts = attempts;
        }

        if let Some(ms) = parse_var::<u64>(&lookup, ENV_RETRY_DELAY_MS)? {
            config.retry.delay = Duration::from_millis(ms);
        }

        if let Some(strict) = parse_var::<bool>(&lookup, ENV_STRICT_TRANSITIONS)? {
            config.strict_transitions = strict;
        }

        Ok(config)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(key, &e.to_string())),
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
