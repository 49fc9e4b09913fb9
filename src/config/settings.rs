//! Tunable settings sections of [`AutotuneConfig`](super::AutotuneConfig)
//!
//! # Main Types
//!
//! - [`SearchSettings`] - Overall search and per-sample durations
//! - [`SamplerSettings`] - Poll interval, health timeout and teardown grace
//! - [`StageCatalog`] - Which stage kinds and property keys the search understands
//! - [`GeneratorSettings`] - Candidate values for the batch and concurrency generators

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default overall search duration in seconds
pub const DEFAULT_SEARCH_DURATION_SECS: f64 = 300.0;

/// Default duration of one sample window in seconds
pub const DEFAULT_SAMPLE_DURATION_SECS: f64 = 10.0;

/// Default interval between instance health checks in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default time allowed for an instance to settle after it is stopped
pub const DEFAULT_TEARDOWN_GRACE_MS: u64 = 2000;

/// Search budget settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Wall-clock time allotted to the whole search, in seconds
    pub search_duration_secs: f64,
    /// Length of one sample window, in seconds
    pub sample_duration_secs: f64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            search_duration_secs: DEFAULT_SEARCH_DURATION_SECS,
            sample_duration_secs: DEFAULT_SAMPLE_DURATION_SECS,
        }
    }
}

impl SearchSettings {
    pub fn search_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.search_duration_secs).unwrap_or(Duration::ZERO)
    }

    pub fn sample_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.sample_duration_secs).unwrap_or(Duration::ZERO)
    }
}

/// Sampler timing settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerSettings {
    /// Interval between health checks of a running instance
    pub poll_interval_ms: u64,
    /// How long an instance may stay in the stuck state before it is aborted.
    /// Zero aborts on the first observation.
    pub health_timeout_ms: u64,
    /// Upper bound on waiting for an instance to settle after stop
    pub teardown_grace_ms: u64,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            health_timeout_ms: 0,
            teardown_grace_ms: DEFAULT_TEARDOWN_GRACE_MS,
        }
    }
}

impl SamplerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn teardown_grace(&self) -> Duration {
        Duration::from_millis(self.teardown_grace_ms)
    }
}

/// Stage kinds and property keys understood by the sampler and generators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageCatalog {
    /// Stage kinds that run inference and carry device/batch/concurrency keys
    pub inference_kinds: Vec<String>,
    /// Stage kind that measures throughput
    pub counter_kind: String,
    /// Readable property of the counter stage holding the average rate
    pub counter_property: String,
    pub device_key: String,
    pub backend_key: String,
    pub batch_key: String,
    pub concurrency_key: String,
    /// Device value of the always-available fallback
    pub cpu_device: String,
    /// Pre-processing backend paired with the fallback device
    pub cpu_backend: String,
}

impl Default for StageCatalog {
    fn default() -> Self {
        Self {
            inference_kinds: vec!["gvadetect".to_string(), "gvaclassify".to_string()],
            counter_kind: "gvafpscounter".to_string(),
            counter_property: "avg-fps".to_string(),
            device_key: "device".to_string(),
            backend_key: "pre-process-backend".to_string(),
            batch_key: "batch-size".to_string(),
            concurrency_key: "nireq".to_string(),
            cpu_device: "CPU".to_string(),
            cpu_backend: "opencv".to_string(),
        }
    }
}

/// Candidate values for the parameter generators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub batch_sizes: Vec<u32>,
    pub concurrency_min: u32,
    pub concurrency_max: u32,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            batch_sizes: vec![1, 2, 4, 8, 16, 32],
            concurrency_min: 1,
            concurrency_max: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_durations() {
        let search = SearchSettings::default();
        assert_eq!(search.search_duration(), Duration::from_secs(300));
        assert_eq!(search.sample_duration(), Duration::from_secs(10));

        let sampler = SamplerSettings::default();
        assert_eq!(sampler.poll_interval(), Duration::from_secs(1));
        assert_eq!(sampler.health_timeout(), Duration::ZERO);
    }

    #[test]
    fn test_invalid_seconds_clamp_to_zero() {
        let search = SearchSettings {
            search_duration_secs: -5.0,
            sample_duration_secs: f64::NAN,
        };
        assert_eq!(search.search_duration(), Duration::ZERO);
        assert_eq!(search.sample_duration(), Duration::ZERO);
    }

    #[test]
    fn test_default_generator_values() {
        let generators = GeneratorSettings::default();
        assert_eq!(generators.batch_sizes, vec![1, 2, 4, 8, 16, 32]);
        assert_eq!((generators.concurrency_min, generators.concurrency_max), (1, 8));
    }
}
