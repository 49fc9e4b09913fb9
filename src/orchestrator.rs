//! End-to-end search driver
//!
//! ```text
//! Baseline ──► Normalizing ──► Phase(0) ──► Phase(1) ──► ... ──► Done
//!    │
//!    └──► Fatal
//! ```
//!
//! The baseline is the only place a run can fail. After it, every candidate
//! failure is absorbed by the explorer and the best pipeline can only get
//! faster. Phases share one search budget; a phase that would start with no
//! time left is skipped rather than run with an empty budget.

use crate::capabilities::{CapabilityScanner, HostProbe, SystemCapabilities, SystemProbe};
use crate::config::AutotuneConfig;
use crate::engine::PipelineEngine;
use crate::error::{AutotuneError, Result};
use crate::explorer::{log_parameters_of_interest, Explorer, SearchBudget};
use crate::normalizer::Normalizer;
use crate::sampler::{SampleStats, Sampler};
use crate::suggest::{default_generators, SuggestionGenerator};
use crate::types::PipelineDescriptor;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Baseline,
    Normalizing,
    Phase(usize),
    Done,
    Fatal,
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchState::Baseline => write!(f, "baseline"),
            SearchState::Normalizing => write!(f, "normalizing"),
            SearchState::Phase(index) => write!(f, "phase {}", index),
            SearchState::Done => write!(f, "done"),
            SearchState::Fatal => write!(f, "fatal"),
        }
    }
}

/// Summary of one generator's phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseReport {
    pub generator: String,
    /// Size of the combination product, identity included
    pub combinations: u64,
    pub sampled: usize,
    pub fps_before: f64,
    pub fps_after: f64,
    pub budget_exhausted: bool,
    pub elapsed_secs: f64,
}

impl PhaseReport {
    pub fn improved(&self) -> bool {
        self.fps_after > self.fps_before
    }
}

/// Result of a complete run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    /// Best pipeline, serialized
    pub pipeline: String,
    pub fps: f64,
    pub baseline_fps: f64,
    /// Whether normalization changed the submitted pipeline
    pub normalized: bool,
    pub capabilities: Vec<String>,
    pub phases: Vec<PhaseReport>,
    /// Generators not run because the budget was spent
    pub skipped: Vec<String>,
    pub stats: SampleStats,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
}

impl SearchOutcome {
    /// Speedup of the best pipeline over the baseline
    pub fn speedup(&self) -> f64 {
        if self.baseline_fps > 0.0 {
            self.fps / self.baseline_fps
        } else {
            1.0
        }
    }
}

/// Drives baseline, normalization and every generator phase against one engine
pub struct Orchestrator<'e, E: PipelineEngine, P: SystemProbe = HostProbe> {
    engine: &'e E,
    config: AutotuneConfig,
    scanner: CapabilityScanner<P>,
    normalizer: Normalizer,
    generators: Vec<Box<dyn SuggestionGenerator>>,
    state: SearchState,
}

impl<'e, E: PipelineEngine> Orchestrator<'e, E, HostProbe> {
    /// Orchestrator probing the real host with the built-in rules and generators
    pub fn new(engine: &'e E, config: AutotuneConfig) -> Self {
        let scanner = CapabilityScanner::host(config.accelerators.clone());
        let generators = default_generators(&config);
        Self {
            engine,
            config,
            scanner,
            normalizer: Normalizer::default(),
            generators,
            state: SearchState::Baseline,
        }
    }
}

impl<'e, E: PipelineEngine, P: SystemProbe> Orchestrator<'e, E, P> {
    /// Replace the capability scanner
    pub fn with_scanner<Q: SystemProbe>(
        self,
        scanner: CapabilityScanner<Q>,
    ) -> Orchestrator<'e, E, Q> {
        Orchestrator {
            engine: self.engine,
            config: self.config,
            scanner,
            normalizer: self.normalizer,
            generators: self.generators,
            state: self.state,
        }
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Replace the generators; they run in the given order
    pub fn with_generators(mut self, generators: Vec<Box<dyn SuggestionGenerator>>) -> Self {
        self.generators = generators;
        self
    }

    pub fn config(&self) -> &AutotuneConfig {
        &self.config
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    /// Search for the fastest configuration of `text` within `search_duration`
    ///
    /// Fails only when `text` does not parse or its baseline sample fails.
    pub fn optimize(
        &mut self,
        text: &str,
        search_duration: Duration,
        sample_duration: Duration,
    ) -> Result<SearchOutcome> {
        let started_at = Utc::now();
        let run_started = Instant::now();
        self.state = SearchState::Baseline;

        let mut sampler = Sampler::new(
            self.engine,
            self.config.sampler.clone(),
            self.config.stages.clone(),
        );

        let submitted = match PipelineDescriptor::parse(text) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                self.state = SearchState::Fatal;
                return Err(e);
            }
        };

        log_parameters_of_interest(&submitted, &self.config.stages);
        let baseline_fps = match sampler.sample(&submitted, sample_duration) {
            Ok(fps) => fps,
            Err(cause) => {
                self.state = SearchState::Fatal;
                tracing::error!("Baseline pipeline failed: {}", cause);
                return Err(AutotuneError::UnsampleablePipeline {
                    pipeline: submitted.to_string(),
                    cause,
                });
            }
        };
        tracing::info!("Baseline fps: {:.2}", baseline_fps);

        let capabilities = self.scanner.scan();

        self.state = SearchState::Normalizing;
        let mut best = self.normalize(&submitted);
        let normalized = best != submitted;
        let mut best_fps = baseline_fps;

        let search = SearchBudget::starting_now(search_duration);
        let mut phases = Vec::with_capacity(self.generators.len());
        let mut skipped = Vec::new();

        for (index, generator) in self.generators.iter().enumerate() {
            let remaining = search.remaining();
            if remaining.is_zero() {
                skipped.push(generator.name().to_string());
                continue;
            }

            self.state = SearchState::Phase(index);
            let report = Self::run_phase(
                generator.as_ref(),
                &mut sampler,
                &capabilities,
                &mut best,
                &mut best_fps,
                SearchBudget::starting_now(remaining),
                sample_duration,
            );
            phases.push(report);
        }

        if !skipped.is_empty() {
            tracing::info!("Search budget spent, skipped: {}", skipped.join(", "));
        }

        self.state = SearchState::Done;
        tracing::info!("Best pipeline ({:.2} fps): {}", best_fps, best);

        Ok(SearchOutcome {
            pipeline: best.to_string(),
            fps: best_fps,
            baseline_fps,
            normalized,
            capabilities: capabilities.names(),
            phases,
            skipped,
            stats: sampler.stats().clone(),
            started_at,
            elapsed_secs: run_started.elapsed().as_secs_f64(),
        })
    }

    /// Normalize and re-parse; a rewrite that no longer parses keeps the original
    fn normalize(&self, pipeline: &PipelineDescriptor) -> PipelineDescriptor {
        let text = pipeline.to_string();
        let rewritten = self.normalizer.normalize(&text);
        if rewritten == text {
            return pipeline.clone();
        }

        match PipelineDescriptor::parse(&rewritten) {
            Ok(normalized) => {
                tracing::info!("Normalized pipeline: {}", normalized);
                normalized
            }
            Err(e) => {
                tracing::warn!("Normalized pipeline does not parse, keeping original: {}", e);
                pipeline.clone()
            }
        }
    }

    fn run_phase(
        generator: &dyn SuggestionGenerator,
        sampler: &mut Sampler<'_, E>,
        capabilities: &SystemCapabilities,
        best: &mut PipelineDescriptor,
        best_fps: &mut f64,
        budget: SearchBudget,
        sample_duration: Duration,
    ) -> PhaseReport {
        let suggestions = generator.propose(best, capabilities);
        let combinations = u64::try_from(suggestions.combination_count()).unwrap_or(u64::MAX);
        tracing::info!(
            generator = generator.name(),
            combinations,
            budget_secs = budget.limit().as_secs_f64(),
            "Starting phase"
        );

        let fps_before = *best_fps;
        let result =
            Explorer::new(sampler, sample_duration).explore(&suggestions, best, fps_before, budget);

        tracing::info!(
            generator = generator.name(),
            sampled = result.sampled,
            "Phase finished at {:.2} fps (was {:.2})",
            result.fps,
            fps_before
        );

        *best = result.pipeline;
        *best_fps = result.fps;

        PhaseReport {
            generator: generator.name().to_string(),
            combinations,
            sampled: result.sampled,
            fps_before,
            fps_after: result.fps,
            budget_exhausted: result.budget_exhausted,
            elapsed_secs: result.elapsed.as_secs_f64(),
        }
    }
}
