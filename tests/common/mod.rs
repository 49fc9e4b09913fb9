//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use pipetune::config::SamplerSettings;
use pipetune::AutotuneConfig;
use std::time::Duration;

/// Sample window short enough to keep tests fast
pub fn test_sample_duration() -> Duration {
    Duration::from_millis(10)
}

/// Sampler settings with millisecond polling
pub fn fast_sampler_settings() -> SamplerSettings {
    SamplerSettings {
        poll_interval_ms: 2,
        health_timeout_ms: 0,
        teardown_grace_ms: 1,
    }
}

/// Default config with fast sampler timings
pub fn fast_config() -> AutotuneConfig {
    AutotuneConfig {
        sampler: fast_sampler_settings(),
        ..AutotuneConfig::default()
    }
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}
