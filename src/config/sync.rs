//! Batch commit and retry settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::duration_format;

/// Delay growth between retries of one write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Same delay before every retry
    #[default]
    Fixed,
    /// Delay doubles per retry, capped at `max_retry_delay`
    Exponential,
}

/// File synchronization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Files written concurrently per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Retries after the first attempt of a write
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay", with = "duration_format")]
    pub retry_delay: Duration,

    #[serde(default = "default_max_retry_delay", with = "duration_format")]
    pub max_retry_delay: Duration,

    /// Pause between consecutive batches
    #[serde(default = "default_inter_batch_delay", with = "duration_format")]
    pub inter_batch_delay: Duration,

    #[serde(default)]
    pub backoff: BackoffKind,

    /// Random extra delay as a fraction of the computed delay (0.0 - 1.0)
    #[serde(default)]
    pub jitter: f64,
}

fn default_batch_size() -> usize {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_retry_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_inter_batch_delay() -> Duration {
    Duration::from_secs(1)
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            max_retry_delay: default_max_retry_delay(),
            inter_batch_delay: default_inter_batch_delay(),
            backoff: BackoffKind::default(),
            jitter: 0.0,
        }
    }
}
