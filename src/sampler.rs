//! Throughput sampling of a single candidate pipeline
//!
//! A sample launches the candidate through the engine, lets it run for a
//! fixed window and reads the throughput counter's average rate. The window
//! is a cancellable timer; a ticker drives health checks alongside it so a
//! candidate that hangs in the stuck state is aborted early instead of being
//! waited out.
//!
//! Every path stops the instance, drains its bus and drops it before
//! returning, so no two samples ever hold the engine at the same time.

use crate::config::{SamplerSettings, StageCatalog};
use crate::engine::{EngineInstance, EngineMessage, EngineState, PipelineEngine};
use crate::types::{PipelineDescriptor, Stage};
use crossbeam_channel::{after, select, tick};
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;

/// State in which a started instance is considered stuck
pub const STUCK_STATE: EngineState = EngineState::Ready;

/// Why a candidate could not be measured
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SampleFailure {
    /// The engine rejected the description or refused to start it
    #[error("start failure: {0}")]
    Start(String),

    /// The instance stayed in the stuck state past the health timeout
    #[error("pipeline not healthy: stuck in {state} for {after:?}")]
    Unhealthy { state: EngineState, after: Duration },

    /// The instance failed while running or its rate could not be read
    #[error("crashed: {0}")]
    Crashed(String),
}

/// Measured frames per second, or why there is no measurement
pub type SampleResult = std::result::Result<f64, SampleFailure>;

/// Statistics across all samples of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SampleStats {
    pub attempts: u64,
    pub successes: u64,
    pub start_failures: u64,
    pub unhealthy_aborts: u64,
    pub crashes: u64,
    /// Wall-clock time spent inside samples, in seconds
    pub total_sample_secs: f64,
    pub best_fps: Option<f64>,
    pub last_fps: Option<f64>,
}

impl SampleStats {
    pub fn record_success(&mut self, elapsed: Duration, fps: f64) {
        self.attempts += 1;
        self.successes += 1;
        self.total_sample_secs += elapsed.as_secs_f64();
        self.last_fps = Some(fps);
        if self.best_fps.map_or(true, |best| fps > best) {
            self.best_fps = Some(fps);
        }
    }

    pub fn record_failure(&mut self, failure: &SampleFailure, elapsed: Duration) {
        self.attempts += 1;
        self.total_sample_secs += elapsed.as_secs_f64();
        match failure {
            SampleFailure::Start(_) => self.start_failures += 1,
            SampleFailure::Unhealthy { .. } => self.unhealthy_aborts += 1,
            SampleFailure::Crashed(_) => self.crashes += 1,
        }
    }

    pub fn failures(&self) -> u64 {
        self.attempts - self.successes
    }

    /// Success rate as percentage
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            100.0
        } else {
            (self.successes as f64 / self.attempts as f64) * 100.0
        }
    }
}

/// Ensure a throughput counter sits downstream of the last inference stage.
///
/// Without any inference stage the pipeline is returned unchanged.
pub fn with_throughput_counter(
    pipeline: &PipelineDescriptor,
    catalog: &StageCatalog,
) -> PipelineDescriptor {
    let mut measured = pipeline.clone();
    let last_inference = pipeline.last_position_of(&catalog.inference_kinds);
    let last_counter = pipeline.last_position_of(&[catalog.counter_kind.as_str()]);

    match (last_inference, last_counter) {
        (Some(inference), Some(counter)) if counter > inference => {}
        (Some(inference), _) => measured.insert(inference + 1, Stage::new(&catalog.counter_kind)),
        (None, _) => {}
    }
    measured
}

/// Runs candidates one at a time against an engine
pub struct Sampler<'e, E: PipelineEngine> {
    engine: &'e E,
    settings: SamplerSettings,
    catalog: StageCatalog,
    stats: SampleStats,
}

impl<'e, E: PipelineEngine> Sampler<'e, E> {
    pub fn new(engine: &'e E, settings: SamplerSettings, catalog: StageCatalog) -> Self {
        Self {
            engine,
            settings,
            catalog,
            stats: SampleStats::default(),
        }
    }

    pub fn stats(&self) -> &SampleStats {
        &self.stats
    }

    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    /// Run `pipeline` for `duration` and return its average rate
    pub fn sample(&mut self, pipeline: &PipelineDescriptor, duration: Duration) -> SampleResult {
        let started = Instant::now();
        let result = self.run(pipeline, duration);
        let elapsed = started.elapsed();

        match &result {
            Ok(fps) => {
                tracing::debug!("Sampled fps: {:.2}", fps);
                self.stats.record_success(elapsed, *fps);
            }
            Err(failure) => self.stats.record_failure(failure, elapsed),
        }
        result
    }

    fn run(&self, pipeline: &PipelineDescriptor, duration: Duration) -> SampleResult {
        let description = with_throughput_counter(pipeline, &self.catalog).to_string();
        tracing::debug!("Testing: {}", description);

        let mut instance = self
            .engine
            .launch(&description)
            .map_err(|e| SampleFailure::Start(e.to_string()))?;

        let Some(counter) = instance.find_stage(&self.catalog.counter_kind) else {
            self.teardown(&mut instance);
            return Err(SampleFailure::Start(format!(
                "no `{}` stage to measure throughput",
                self.catalog.counter_kind
            )));
        };

        if let Err(e) = instance.set_state(EngineState::Playing) {
            self.teardown(&mut instance);
            return Err(SampleFailure::Start(e.to_string()));
        }

        tracing::info!("Sampling for {:.1} seconds...", duration.as_secs_f64());
        let watched = self.watch(&mut instance, duration);
        self.teardown(&mut instance);
        watched?;

        instance
            .property_f64(&counter, &self.catalog.counter_property)
            .map_err(|e| SampleFailure::Crashed(e.to_string()))
    }

    /// Wait out the sample window, checking health on every tick
    ///
    /// Only a settled stuck state counts; an instance still prerolling
    /// towards a running state is left alone until the window closes.
    fn watch(&self, instance: &mut E::Instance, duration: Duration) -> Result<(), SampleFailure> {
        // None when the window is too long to represent as an instant
        let deadline = Instant::now().checked_add(duration);
        let window = after(duration);
        let ticker = tick(self.settings.poll_interval());
        let mut stuck_since: Option<Instant> = None;

        loop {
            select! {
                recv(window) -> _ => return Ok(()),
                recv(ticker) -> _ => {
                    let poll = self.settings.poll_interval();
                    let wait = match deadline {
                        Some(deadline) => {
                            poll.min(deadline.saturating_duration_since(Instant::now()))
                        }
                        None => poll,
                    };
                    let snapshot = instance
                        .current_state(wait)
                        .map_err(|e| SampleFailure::Crashed(e.to_string()))?;

                    if snapshot.is_settled() && snapshot.current == STUCK_STATE {
                        let state = snapshot.current;
                        let stuck_for = stuck_since.get_or_insert_with(Instant::now).elapsed();
                        if stuck_for >= self.settings.health_timeout() {
                            tracing::debug!(%state, "Pipeline not healthy, terminating early");
                            return Err(SampleFailure::Unhealthy { state, after: stuck_for });
                        }
                    } else {
                        if let Some(pending) = snapshot.pending {
                            tracing::trace!(
                                "Pipeline still changing state: {} -> {}",
                                snapshot.current,
                                pending
                            );
                        }
                        stuck_since = None;
                    }
                }
            }
        }
    }

    /// Stop the instance and drain its bus
    fn teardown(&self, instance: &mut E::Instance) {
        if let Err(e) = instance.set_state(EngineState::Null) {
            tracing::warn!("Failed to stop pipeline: {}", e);
        }
        if let Err(e) = instance.current_state(self.settings.teardown_grace()) {
            tracing::debug!("Pipeline did not settle after stop: {}", e);
        }

        while let Some(message) = instance.pop_message() {
            match message {
                EngineMessage::Error { source, message } => {
                    tracing::error!("Pipeline error from {}: {}", source, message)
                }
                EngineMessage::Warning { source, message } => {
                    tracing::warn!("Pipeline warning from {}: {}", source, message)
                }
                EngineMessage::StateChanged { from, to } => {
                    tracing::debug!("State changed: {} -> {}", from, to)
                }
                EngineMessage::EndOfStream => tracing::debug!("End of stream"),
                EngineMessage::Other(text) => tracing::debug!("Other message: {}", text),
            }
        }
    }
}
