//! Integration tests for the end-to-end search
//!
//! These tests drive the orchestrator against the scripted engine and a fake host:
//! - Device, batch and concurrency phases in order
//! - Fatal baseline handling
//! - Budget handling and monotonic results

mod common;

use common::builders::PipelineBuilder;
use common::mock_helpers::{accelerator, bare_host, engine_at, scanner_with};
use common::{fast_config, test_sample_duration};
use pipetune::config::StageCatalog;
use pipetune::{
    AcceleratorClass, AutotuneConfig, AutotuneError, BatchGenerator, DeviceGenerator, Orchestrator,
    SampleFailure, ScriptedBehavior, SearchState, SuggestionGenerator,
};
use proptest::prelude::*;
use std::time::Duration;

fn generic_catalog() -> StageCatalog {
    StageCatalog {
        inference_kinds: vec!["stageA".to_string()],
        ..StageCatalog::default()
    }
}

#[test]
fn test_device_phase_picks_faster_accelerator() {
    let accel = accelerator("ACCEL", "accel-sharing");
    let mut config = fast_config();
    config.stages = generic_catalog();
    config.accelerators = vec![accel.clone()];

    let engine = engine_at(10.0, &[("device=ACCEL", ScriptedBehavior::Throughput(25.0))]);
    let device: Box<dyn SuggestionGenerator> =
        Box::new(DeviceGenerator::new(config.stages.clone()));
    let mut orchestrator = Orchestrator::new(&engine, config)
        .with_scanner(scanner_with(&[accel], &["ACCEL"]))
        .with_generators(vec![device]);

    let outcome = orchestrator
        .optimize(
            "source ! stageA device=CPU ! sink",
            Duration::from_secs(10),
            test_sample_duration(),
        )
        .unwrap();

    assert_eq!(outcome.baseline_fps, 10.0);
    assert_eq!(outcome.fps, 25.0);
    assert_eq!(
        outcome.pipeline,
        "source ! stageA device=ACCEL pre-process-backend=accel-sharing ! sink"
    );
    assert_eq!(outcome.capabilities, vec!["ACCEL"]);

    // Baseline, then ACCEL, then the CPU fallback
    let launched = engine.launched();
    assert_eq!(launched.len(), 3);
    assert!(launched[1].contains("device=ACCEL"));
    assert!(launched[2].contains("device=CPU pre-process-backend=opencv"));
}

#[test]
fn test_unparseable_baseline_is_fatal() {
    let engine = engine_at(
        10.0,
        &[("not a pipeline", ScriptedBehavior::LaunchFailure("no element \"not\"".into()))],
    );
    let mut orchestrator = Orchestrator::new(&engine, fast_config()).with_scanner(bare_host());

    let err = orchestrator
        .optimize("not a pipeline", Duration::from_secs(10), test_sample_duration())
        .unwrap_err();

    match &err {
        AutotuneError::UnsampleablePipeline { pipeline, cause } => {
            assert_eq!(pipeline, "not a pipeline");
            assert!(matches!(cause, SampleFailure::Start(_)));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(err.is_fatal_input());
    assert_eq!(orchestrator.state(), SearchState::Fatal);
    assert_eq!(engine.launch_count(), 1);
}

#[test]
fn test_zero_budget_returns_normalized_baseline() {
    let engine = engine_at(10.0, &[]);
    let mut orchestrator = Orchestrator::new(&engine, fast_config()).with_scanner(bare_host());

    let outcome = orchestrator
        .optimize(
            "filesrc location=a.mp4 ! h264parse ! vaapih264dec ! gvadetect model=m.xml ! fakesink",
            Duration::ZERO,
            test_sample_duration(),
        )
        .unwrap();

    assert_eq!(
        outcome.pipeline,
        "filesrc location=a.mp4 ! decodebin3 ! gvadetect model=m.xml ! fakesink"
    );
    assert!(outcome.normalized);
    assert_eq!(outcome.fps, 10.0);
    assert!(outcome.phases.is_empty());
    assert_eq!(outcome.skipped.len(), 3);
    assert_eq!(engine.launch_count(), 1);
}

#[test]
fn test_all_failing_candidates_keep_baseline() {
    let engine = engine_at(
        10.0,
        &[
            ("pre-process-backend=", ScriptedBehavior::StuckInReady),
            ("batch-size=", ScriptedBehavior::StartFailure("refused".into())),
            ("nireq=", ScriptedBehavior::PropertyFailure("no avg-fps".into())),
        ],
    );
    let known = AcceleratorClass::defaults();
    let mut orchestrator = Orchestrator::new(&engine, fast_config())
        .with_scanner(scanner_with(&known, &["GPU", "NPU"]));

    let text = PipelineBuilder::new().inference("gvadetect", Some("CPU")).text();
    let outcome = orchestrator
        .optimize(&text, Duration::from_secs(30), test_sample_duration())
        .unwrap();

    assert_eq!(outcome.fps, 10.0);
    assert_eq!(outcome.pipeline, text);
    // 3 device + 6 batch + 8 concurrency candidates, plus the baseline
    assert_eq!(outcome.stats.attempts, 18);
    assert_eq!(outcome.stats.successes, 1);
    assert_eq!(outcome.stats.unhealthy_aborts, 3);
    assert_eq!(outcome.stats.start_failures, 6);
    assert_eq!(outcome.stats.crashes, 8);
    assert!(outcome.phases.iter().all(|p| !p.improved()));
}

#[test]
fn test_phases_run_in_fixed_order() {
    let engine = engine_at(10.0, &[("nireq=2", ScriptedBehavior::Throughput(12.0))]);
    let mut orchestrator = Orchestrator::new(&engine, fast_config()).with_scanner(bare_host());

    let text = PipelineBuilder::new()
        .inference("gvadetect", None)
        .inference("gvaclassify", None)
        .text();
    let outcome = orchestrator
        .optimize(&text, Duration::from_secs(30), test_sample_duration())
        .unwrap();

    let names: Vec<&str> = outcome.phases.iter().map(|p| p.generator.as_str()).collect();
    assert_eq!(names, vec!["device", "batch-size", "concurrency"]);
    assert_eq!(orchestrator.state(), SearchState::Done);

    let launched = engine.launched();
    assert!(!launched[0].contains("pre-process-backend"));
    let last_device = launched
        .iter()
        .rposition(|d| d.contains("pre-process-backend"))
        .unwrap();
    let first_batch = launched.iter().position(|d| d.contains("batch-size=")).unwrap();
    let last_batch = launched.iter().rposition(|d| d.contains("batch-size=")).unwrap();
    let first_nireq = launched.iter().position(|d| d.contains("nireq=")).unwrap();
    assert!(last_device < first_batch);
    assert!(last_batch < first_nireq);

    // Two inference stages: the product covers both positions
    assert_eq!(outcome.phases[1].combinations, 49);
    assert_eq!(outcome.phases[2].combinations, 81);
    assert_eq!(outcome.fps, 12.0);
}

#[test]
fn test_search_stays_within_budget() {
    let sample = Duration::from_millis(20);
    let search = Duration::from_millis(100);
    let engine = engine_at(10.0, &[]);
    let mut orchestrator = Orchestrator::new(&engine, fast_config()).with_scanner(bare_host());

    let text = PipelineBuilder::new().inference("gvadetect", None).text();
    let outcome = orchestrator.optimize(&text, search, sample).unwrap();

    let searched: f64 = outcome.phases.iter().map(|p| p.elapsed_secs).sum();
    // One in-flight sample may overrun; allow some scheduling slack on top
    assert!(searched <= (search + sample).as_secs_f64() + 0.1, "searched {}s", searched);
    assert!(outcome.phases.iter().any(|p| p.budget_exhausted) || !outcome.skipped.is_empty());
    assert!(outcome.stats.attempts < 16);
}

fn batch_only(config: &AutotuneConfig, sizes: Vec<u32>) -> Vec<Box<dyn SuggestionGenerator>> {
    vec![Box::new(BatchGenerator::new(config.stages.clone(), sizes))]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_result_never_below_baseline(
        baseline in 0.0f64..100.0,
        rates in prop::collection::vec(prop::option::of(0.0f64..100.0), 6),
    ) {
        let sizes: Vec<u32> = (2..8).collect();
        let mut engine = pipetune::ScriptedEngine::new(baseline);
        for (size, rate) in sizes.iter().zip(&rates) {
            let behavior = match rate {
                Some(fps) => ScriptedBehavior::Throughput(*fps),
                None => ScriptedBehavior::LaunchFailure("rejected".into()),
            };
            engine = engine.with_rule(format!("batch-size={}", size), behavior);
        }

        let config = fast_config();
        let generators = batch_only(&config, sizes);
        let mut orchestrator = Orchestrator::new(&engine, config)
            .with_scanner(bare_host())
            .with_generators(generators);

        let text = PipelineBuilder::new().inference("gvadetect", None).text();
        let outcome = orchestrator
            .optimize(&text, Duration::from_secs(30), Duration::from_millis(2))
            .unwrap();

        let expected = rates
            .iter()
            .flatten()
            .fold(baseline, |best, fps| if *fps > best { *fps } else { best });
        prop_assert!(outcome.fps >= outcome.baseline_fps);
        prop_assert_eq!(outcome.fps, expected);
    }
}
