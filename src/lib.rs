//! # pipetune: media pipeline configuration autotuner
//!
//! Given a textual media pipeline, pipetune searches for the stage settings
//! that give the highest throughput on the current host. It measures the
//! submitted pipeline once, folds legacy stage spellings into their current
//! form, and then runs a fixed sequence of search phases under a wall-clock
//! budget, each phase trying alternatives for one kind of setting.
//!
//! ## Architecture
//!
//! - **Capabilities**: detects accelerator classes from device nodes and driver packages
//! - **Normalizer**: ordered regex rule table over the serialized pipeline
//! - **Sampler**: runs one candidate for a fixed window and reads its average rate
//! - **Suggest**: device, batch-size and concurrency generators
//! - **Explorer**: walks one generator's combinations under a budget
//! - **Orchestrator**: baseline, normalization and phases, in that order
//!
//! Pipelines are executed by a [`PipelineEngine`](engine::PipelineEngine).
//! The GStreamer engine is behind the `gstreamer` feature; the scripted engine
//! is always available for tests and dry runs.
//!
//! ## Configuration
//!
//! Settings are read from `pipetune/config.toml` in the platform config
//! directory when present:
//!
//! - **Linux**: `~/.config/pipetune/config.toml`
//! - **macOS**: `~/Library/Application Support/pipetune/config.toml`
//!
//! ## Example
//!
//! ```
//! use pipetune::{AutotuneConfig, Orchestrator, ScriptedBehavior, ScriptedEngine};
//! use std::time::Duration;
//!
//! let engine = ScriptedEngine::new(10.0)
//!     .with_rule("batch-size=8", ScriptedBehavior::Throughput(30.0));
//! let mut config = AutotuneConfig::default();
//! config.accelerators.clear();
//! config.sampler.poll_interval_ms = 5;
//! config.sampler.teardown_grace_ms = 5;
//!
//! let outcome = Orchestrator::new(&engine, config)
//!     .optimize(
//!         "filesrc location=in.mp4 ! decodebin3 ! gvadetect model=m.xml ! fakesink",
//!         Duration::from_secs(5),
//!         Duration::from_millis(10),
//!     )
//!     .unwrap();
//! assert!(outcome.fps >= outcome.baseline_fps);
//! ```

pub mod capabilities;
pub mod config;
pub mod engine;
pub mod error;
pub mod explorer;
pub mod normalizer;
pub mod orchestrator;
pub mod sampler;
pub mod suggest;
pub mod types;

pub use capabilities::{
    AcceleratorClass, CapabilityScanner, HostProbe, SystemCapabilities, SystemProbe,
};
pub use config::AutotuneConfig;
pub use engine::{
    EngineError, EngineInstance, EngineState, PipelineEngine, ScriptedBehavior, ScriptedEngine,
    StateSnapshot,
};
pub use error::{AutotuneError, Result, ResultExt};
pub use explorer::{Exploration, Explorer, SearchBudget};
pub use normalizer::{Normalizer, RewriteRule};
pub use orchestrator::{Orchestrator, PhaseReport, SearchOutcome, SearchState};
pub use sampler::{SampleFailure, SampleResult, SampleStats, Sampler};
pub use suggest::{BatchGenerator, ConcurrencyGenerator, DeviceGenerator, SuggestionGenerator};
pub use types::{PipelineDescriptor, Stage, StageProperty, Suggestion, SuggestionSet};
