//! Time-boxed exploration of one generator's suggestions
//!
//! The explorer walks the cartesian product of a [`SuggestionSet`] in its
//! deterministic order (position 0 slowest, last position fastest). The first
//! combination is the current pipeline, already measured, so it becomes the
//! running best without another sample. Every later combination is sampled
//! and adopted only if it is strictly faster.
//!
//! The budget is checked between samples, never preemptively: a sample in
//! flight always completes, but no new one starts once the budget is spent.

use crate::config::StageCatalog;
use crate::engine::PipelineEngine;
use crate::sampler::Sampler;
use crate::types::{PipelineDescriptor, SuggestionSet};
use std::time::{Duration, Instant};

/// Wall-clock allowance for one phase, fixed at creation
#[derive(Debug, Clone, Copy)]
pub struct SearchBudget {
    started: Instant,
    limit: Duration,
}

impl SearchBudget {
    pub fn starting_now(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.elapsed())
    }

    pub fn is_exhausted(&self) -> bool {
        self.elapsed() >= self.limit
    }
}

/// Best configuration found by one exploration
#[derive(Debug, Clone, PartialEq)]
pub struct Exploration {
    pub pipeline: PipelineDescriptor,
    pub fps: f64,
    /// Combinations actually sampled (the identity is never sampled)
    pub sampled: usize,
    pub improvements: usize,
    /// Whether combinations were left unexplored because time ran out
    pub budget_exhausted: bool,
    pub elapsed: Duration,
}

/// Samples combinations one at a time through a borrowed [`Sampler`]
pub struct Explorer<'s, 'e, E: PipelineEngine> {
    sampler: &'s mut Sampler<'e, E>,
    sample_duration: Duration,
}

impl<'s, 'e, E: PipelineEngine> Explorer<'s, 'e, E> {
    pub fn new(sampler: &'s mut Sampler<'e, E>, sample_duration: Duration) -> Self {
        Self {
            sampler,
            sample_duration,
        }
    }

    /// Search `suggestions` for a pipeline strictly faster than `baseline_fps`
    pub fn explore(
        &mut self,
        suggestions: &SuggestionSet,
        baseline: &PipelineDescriptor,
        baseline_fps: f64,
        budget: SearchBudget,
    ) -> Exploration {
        let mut combinations = suggestions.combinations();
        let identity = combinations.next();
        debug_assert!(identity.as_ref().map_or(true, |p| p == baseline));

        let mut best = baseline.clone();
        let mut best_fps = baseline_fps;
        let mut sampled = 0;
        let mut improvements = 0;
        let mut budget_exhausted = false;

        for candidate in combinations {
            if budget.is_exhausted() {
                budget_exhausted = true;
                break;
            }

            log_parameters_of_interest(&candidate, self.sampler.catalog());
            sampled += 1;

            match self.sampler.sample(&candidate, self.sample_duration) {
                Ok(fps) if fps > best_fps => {
                    tracing::info!(fps, previous = best_fps, "Found faster pipeline");
                    best = candidate;
                    best_fps = fps;
                    improvements += 1;
                }
                Ok(fps) => tracing::debug!(fps, best = best_fps, "Candidate not faster"),
                Err(failure) => tracing::debug!("Pipeline failed to start: {}", failure),
            }
        }

        Exploration {
            pipeline: best,
            fps: best_fps,
            sampled,
            improvements,
            budget_exhausted,
            elapsed: budget.elapsed(),
        }
    }
}

/// Log the device, batch size and in-flight request count of each inference stage
pub fn log_parameters_of_interest(pipeline: &PipelineDescriptor, catalog: &StageCatalog) {
    for stage in pipeline
        .stages()
        .iter()
        .filter(|s| s.is_any_of(&catalog.inference_kinds))
    {
        tracing::info!(
            "Found {}, device: {}, batch size: {}, nireqs: {}",
            stage.name(),
            stage.get(&catalog.device_key).unwrap_or("not set"),
            stage.get(&catalog.batch_key).unwrap_or("not set"),
            stage.get(&catalog.concurrency_key).unwrap_or("not set"),
        );
    }
}
