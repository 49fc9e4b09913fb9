//! Error handling for pipetune
//!
//! This module defines the library-wide error type and a Result alias.
//! Per-candidate failures are not errors at this level: they are
//! [`SampleFailure`](crate::sampler::SampleFailure) values that the explorer
//! swallows. Only an invalid or unsampleable input pipeline surfaces here.

use crate::sampler::SampleFailure;
use thiserror::Error;

/// Main error type for pipetune operations
#[derive(Error, Debug)]
pub enum AutotuneError {
    /// The submitted pipeline text could not be parsed into stages
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// The submitted pipeline could not be sampled, so it cannot be improved
    #[error("Pipeline is not sampleable: {pipeline} ({cause})")]
    UnsampleablePipeline {
        pipeline: String,
        cause: SampleFailure,
    },

    /// Errors related to configuration loading/saving/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse errors
    #[error("Config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("Config serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<AutotuneError>,
    },
}

impl AutotuneError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        AutotuneError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error ended the search before any candidate was explored
    pub fn is_fatal_input(&self) -> bool {
        match self {
            AutotuneError::InvalidPipeline(_) | AutotuneError::UnsampleablePipeline { .. } => true,
            AutotuneError::WithContext { source, .. } => source.is_fatal_input(),
            _ => false,
        }
    }
}

/// Result type alias for pipetune operations
pub type Result<T> = std::result::Result<T, AutotuneError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
