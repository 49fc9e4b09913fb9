//! Scripted Engine Implementation for Testing
//!
//! An in-process [`PipelineEngine`] whose instances follow a script instead of
//! running real stages. Behaviour is chosen per launched description: the
//! first rule whose pattern is a substring of the description wins, otherwise
//! the default behaviour applies.
//!
//! # Behaviours
//!
//! - [`ScriptedBehavior::Throughput`] - Runs normally and reports a fixed rate
//! - [`ScriptedBehavior::LaunchFailure`] - The description is rejected at launch
//! - [`ScriptedBehavior::StartFailure`] - The transition to running is refused
//! - [`ScriptedBehavior::StuckInReady`] - Starts but never leaves the stuck state
//! - [`ScriptedBehavior::SlowStart`] - Stays in the stuck state for a while, then runs
//! - [`ScriptedBehavior::Prerolling`] - Reports a pending transition for a while, then runs
//! - [`ScriptedBehavior::StateQueryFailure`] - State queries fail while running
//! - [`ScriptedBehavior::PropertyFailure`] - Runs but the rate cannot be read
//!
//! # Example
//!
//! ```
//! use pipetune::engine::{ScriptedBehavior, ScriptedEngine};
//!
//! let engine = ScriptedEngine::new(10.0)
//!     .with_rule("device=GPU", ScriptedBehavior::Throughput(25.0))
//!     .with_rule("device=NPU", ScriptedBehavior::StuckInReady);
//! assert_eq!(engine.launch_count(), 0);
//! ```

use super::{
    EngineError, EngineInstance, EngineMessage, EngineState, PipelineEngine, StateSnapshot,
};
use crate::types::CONNECTOR;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// What a scripted instance does once launched
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedBehavior {
    Throughput(f64),
    LaunchFailure(String),
    StartFailure(String),
    StuckInReady,
    SlowStart { fps: f64, ready_for: Duration },
    Prerolling { fps: f64, pending_for: Duration },
    StateQueryFailure(String),
    PropertyFailure(String),
}

/// Engine driven by substring rules
pub struct ScriptedEngine {
    rules: Vec<(String, ScriptedBehavior)>,
    default_behavior: ScriptedBehavior,
    messages: Vec<EngineMessage>,
    counter_kind: String,
    launched: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    /// Engine where every pipeline runs at `default_fps`
    pub fn new(default_fps: f64) -> Self {
        Self::with_default(ScriptedBehavior::Throughput(default_fps))
    }

    pub fn with_default(behavior: ScriptedBehavior) -> Self {
        Self {
            rules: Vec::new(),
            default_behavior: behavior,
            messages: Vec::new(),
            counter_kind: "gvafpscounter".to_string(),
            launched: Mutex::new(Vec::new()),
        }
    }

    /// Add a rule; earlier rules take precedence
    pub fn with_rule(mut self, pattern: impl Into<String>, behavior: ScriptedBehavior) -> Self {
        self.rules.push((pattern.into(), behavior));
        self
    }

    /// Queue a bus message on every instance
    pub fn with_message(mut self, message: EngineMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Stage kind treated as the throughput counter
    pub fn with_counter_kind(mut self, kind: impl Into<String>) -> Self {
        self.counter_kind = kind.into();
        self
    }

    /// Every description passed to `launch`, in order
    pub fn launched(&self) -> Vec<String> {
        self.launched
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    pub fn launch_count(&self) -> usize {
        self.launched.lock().map(|l| l.len()).unwrap_or(0)
    }

    fn behavior_for(&self, description: &str) -> &ScriptedBehavior {
        self.rules
            .iter()
            .find(|(pattern, _)| description.contains(pattern.as_str()))
            .map(|(_, behavior)| behavior)
            .unwrap_or(&self.default_behavior)
    }
}

impl PipelineEngine for ScriptedEngine {
    type Instance = ScriptedInstance;

    fn launch(&self, description: &str) -> Result<ScriptedInstance, EngineError> {
        if let Ok(mut launched) = self.launched.lock() {
            launched.push(description.to_string());
        }

        let behavior = self.behavior_for(description).clone();
        if let ScriptedBehavior::LaunchFailure(reason) = &behavior {
            return Err(EngineError::Launch(reason.clone()));
        }

        // Auto-named like real engines: <kind><index>, last occurrence wins
        let counters = description
            .split(CONNECTOR)
            .filter(|token| token.split_whitespace().next() == Some(self.counter_kind.as_str()))
            .count();
        let counter = (counters > 0).then(|| format!("{}{}", self.counter_kind, counters - 1));

        Ok(ScriptedInstance {
            behavior,
            state: EngineState::Null,
            started_at: None,
            messages: self.messages.iter().cloned().collect(),
            counter,
        })
    }
}

/// Instance produced by [`ScriptedEngine`]
pub struct ScriptedInstance {
    behavior: ScriptedBehavior,
    state: EngineState,
    started_at: Option<Instant>,
    messages: VecDeque<EngineMessage>,
    counter: Option<String>,
}

impl EngineInstance for ScriptedInstance {
    fn set_state(&mut self, state: EngineState) -> Result<(), EngineError> {
        if state == EngineState::Playing {
            if let ScriptedBehavior::StartFailure(reason) = &self.behavior {
                return Err(EngineError::StateChange(reason.clone()));
            }
            self.started_at = Some(Instant::now());
        }

        let previous = self.state;
        self.state = state;
        self.messages.push_back(EngineMessage::StateChanged {
            from: previous,
            to: state,
        });
        Ok(())
    }

    fn current_state(&mut self, _timeout: Duration) -> Result<StateSnapshot, EngineError> {
        if self.state != EngineState::Playing {
            return Ok(StateSnapshot::settled(self.state));
        }
        let running_for = self.started_at.map(|t| t.elapsed()).unwrap_or_default();
        match &self.behavior {
            ScriptedBehavior::StuckInReady => Ok(StateSnapshot::settled(EngineState::Ready)),
            ScriptedBehavior::SlowStart { ready_for, .. } if running_for < *ready_for => {
                Ok(StateSnapshot::settled(EngineState::Ready))
            }
            ScriptedBehavior::Prerolling { pending_for, .. } if running_for < *pending_for => {
                Ok(StateSnapshot::transitioning(EngineState::Ready, EngineState::Playing))
            }
            ScriptedBehavior::StateQueryFailure(reason) => {
                Err(EngineError::StateChange(reason.clone()))
            }
            _ => Ok(StateSnapshot::settled(self.state)),
        }
    }

    fn pop_message(&mut self) -> Option<EngineMessage> {
        self.messages.pop_front()
    }

    fn find_stage(&self, kind: &str) -> Option<String> {
        self.counter
            .as_ref()
            .filter(|name| name.starts_with(kind))
            .cloned()
    }

    fn property_f64(&self, stage: &str, property: &str) -> Result<f64, EngineError> {
        if self.counter.as_deref() != Some(stage) {
            return Err(EngineError::Property(format!(
                "no stage named `{}` exposes `{}`",
                stage, property
            )));
        }
        match &self.behavior {
            ScriptedBehavior::Throughput(fps)
            | ScriptedBehavior::SlowStart { fps, .. }
            | ScriptedBehavior::Prerolling { fps, .. } => Ok(*fps),
            ScriptedBehavior::PropertyFailure(reason) => Err(EngineError::Property(reason.clone())),
            _ => Ok(0.0),
        }
    }
}
