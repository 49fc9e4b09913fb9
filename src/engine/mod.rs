//! Pipeline engine interface
//!
//! The search never executes stages itself. It hands a serialized pipeline to
//! a [`PipelineEngine`], which returns an [`EngineInstance`] with lifecycle
//! control, a message bus and named-stage property access. These traits are
//! the whole contract; implementations are the GStreamer-backed engine (with
//! the `gstreamer` feature) and the in-process [`ScriptedEngine`] used by tests.
//!
//! An instance is exclusively owned by one sampler call and released by
//! dropping it.

pub mod mock;

#[cfg(feature = "gstreamer")]
pub mod gst;

pub use mock::{ScriptedBehavior, ScriptedEngine};

#[cfg(feature = "gstreamer")]
pub use gst::GstEngine;

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by the engine collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The description could not be turned into an instance
    #[error("Launch failed: {0}")]
    Launch(String),

    /// A state transition was refused
    #[error("State change failed: {0}")]
    StateChange(String),

    /// A stage property could not be read
    #[error("Property read failed: {0}")]
    Property(String),

    /// The engine itself is not usable on this host
    #[error("Engine unavailable: {0}")]
    Unavailable(String),
}

/// Lifecycle states of an instance, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EngineState {
    /// Released or never started (stopped)
    Null,
    /// Resources allocated but not negotiated; the stuck state
    Ready,
    Paused,
    /// Running and processing data
    Playing,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Null => "NULL",
            EngineState::Ready => "READY",
            EngineState::Paused => "PAUSED",
            EngineState::Playing => "PLAYING",
        };
        write!(f, "{}", name)
    }
}

/// Result of a state query
///
/// `pending` is set while a transition is still in progress, e.g. while a
/// pipeline prerolls. Only a settled state says anything about health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    pub current: EngineState,
    pub pending: Option<EngineState>,
}

impl StateSnapshot {
    pub fn settled(current: EngineState) -> Self {
        Self {
            current,
            pending: None,
        }
    }

    pub fn transitioning(current: EngineState, pending: EngineState) -> Self {
        Self {
            current,
            pending: Some(pending),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.pending.is_none()
    }
}

/// Messages posted on an instance's bus
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    Error { source: String, message: String },
    Warning { source: String, message: String },
    StateChanged { from: EngineState, to: EngineState },
    EndOfStream,
    Other(String),
}

/// Builds runnable instances from pipeline descriptions
pub trait PipelineEngine {
    type Instance: EngineInstance;

    /// Construct an instance; malformed descriptions and missing stage kinds fail here
    fn launch(&self, description: &str) -> Result<Self::Instance, EngineError>;
}

/// A constructed pipeline instance
pub trait EngineInstance {
    /// Request a state transition
    fn set_state(&mut self, state: EngineState) -> Result<(), EngineError>;

    /// Current state, waiting at most `timeout` for a pending transition to settle
    fn current_state(&mut self, timeout: Duration) -> Result<StateSnapshot, EngineError>;

    /// Next pending bus message, if any
    fn pop_message(&mut self) -> Option<EngineMessage>;

    /// Name of the last stage of the given kind
    fn find_stage(&self, kind: &str) -> Option<String>;

    /// Read a numeric property of a named stage
    fn property_f64(&self, stage: &str, property: &str) -> Result<f64, EngineError>;
}
