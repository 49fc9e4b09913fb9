//! Configuration module for pipetune
//!
//! Every knob of the search lives in [`AutotuneConfig`], which can be read
//! from a TOML file. All sections are optional; missing keys take the
//! built-in defaults.
//!
//! # Config Location
//!
//! Without `--config`, the file is looked up in the platform config directory:
//! - **Linux**: `~/.config/pipetune/config.toml`
//! - **macOS**: `~/Library/Application Support/pipetune/config.toml`
//! - **Windows**: `%APPDATA%\pipetune\config.toml`
//!
//! A missing default file is not an error. An explicit path that cannot be
//! read or parsed is.
//!
//! # Example
//!
//! ```toml
//! [search]
//! search_duration_secs = 120
//!
//! [sampler]
//! health_timeout_ms = 3000
//!
//! [[accelerators]]
//! name = "GPU"
//! device_dir = "/dev/dri"
//! node_prefix = "render"
//! package = "intel-opencl-icd"
//! preprocess_backend = "va-surface-sharing"
//! ```

pub mod settings;

pub use settings::*;

use crate::capabilities::AcceleratorClass;
use crate::error::{AutotuneError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "pipetune";

/// Config filename inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Complete search configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutotuneConfig {
    pub search: SearchSettings,
    pub sampler: SamplerSettings,
    pub stages: StageCatalog,
    pub generators: GeneratorSettings,
    /// Accelerator classes probed on the host, in suggestion order
    pub accelerators: Vec<AcceleratorClass>,
}

impl Default for AutotuneConfig {
    fn default() -> Self {
        Self {
            search: SearchSettings::default(),
            sampler: SamplerSettings::default(),
            stages: StageCatalog::default(),
            generators: GeneratorSettings::default(),
            accelerators: AcceleratorClass::defaults(),
        }
    }
}

impl AutotuneConfig {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(AutotuneError::from)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Parse and validate config text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise the default file if it exists, otherwise defaults
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_path() {
            Some(default) if default.exists() => Self::load(default),
            _ => Ok(Self::default()),
        }
    }

    /// Write the config as pretty TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings the search cannot run with
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| -> Result<()> { Err(AutotuneError::Config(msg.to_string())) };

        for (name, secs) in [
            ("search_duration_secs", self.search.search_duration_secs),
            ("sample_duration_secs", self.search.sample_duration_secs),
        ] {
            if !secs.is_finite() || secs < 0.0 {
                return Err(AutotuneError::Config(format!(
                    "{} must be a non-negative number of seconds, got {}",
                    name, secs
                )));
            }
        }
        if self.sampler.poll_interval_ms == 0 {
            return fail("poll_interval_ms must be positive");
        }
        if self.stages.inference_kinds.is_empty() {
            return fail("at least one inference stage kind is required");
        }
        if self.stages.counter_kind.is_empty() || self.stages.counter_property.is_empty() {
            return fail("throughput counter kind and property must be set");
        }
        if self.generators.batch_sizes.is_empty() {
            return fail("batch_sizes must not be empty");
        }
        if self.generators.concurrency_min == 0
            || self.generators.concurrency_min > self.generators.concurrency_max
        {
            return fail("concurrency range must satisfy 1 <= concurrency_min <= concurrency_max");
        }
        if let Some(class) = self
            .accelerators
            .iter()
            .find(|c| c.name == self.stages.cpu_device)
        {
            return Err(AutotuneError::Config(format!(
                "accelerator `{}` collides with the CPU fallback device",
                class.name
            )));
        }
        Ok(())
    }
}
