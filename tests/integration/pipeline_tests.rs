//! Full pipeline runs.
//!
//! Scoring, gating, quorum, fault capture and ordering over scripted
//! detectors, plus end-to-end runs with the built-in detectors.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use docauth::detectors::RecordedOutcome;
use docauth::engine::result::ALL_CHECKS_PASSED;
use docauth::{
    build_catalog, validate_document, ConfigError, DocAuthError, DocumentEvidence, Pipeline,
    PipelineConfig, RecordedOutcomes, RunSettings, StageSpec,
};

use crate::mocks::{
    fails, five_stages, normalized, passes, png, scripted, scripted_stage, Behavior, HangingDetector,
    ScriptedDetector, SyncPanicDetector,
};

fn evidence() -> DocumentEvidence {
    DocumentEvidence::from_bytes(Vec::new())
}

fn pipeline(stages: Vec<StageSpec>) -> Pipeline {
    Pipeline::new(stages, RunSettings::default()).unwrap()
}

#[tokio::test]
async fn test_structure_quorum_miss_scores_83() {
    let structure = [Behavior::Pass, Behavior::Fail("bad MRZ"), Behavior::Fail("no surname")];
    let stages = five_stages(&passes(3), &structure, &passes(3), &passes(3), &passes(2));

    let report = pipeline(stages).run(&evidence()).await;

    assert_eq!(report.score, 83);
    assert!(report.is_valid);
    assert!(!report.stage("structure").unwrap().passed);
    assert_eq!(report.stages.len(), 5);
    assert_eq!(report.recommendations, vec!["structure deficiency"]);
    assert!(report.error.is_none());
}

#[tokio::test]
async fn test_gating_failure_stops_pipeline() {
    let downstream = Arc::new(ScriptedDetector::new("structure_0", Behavior::Pass));
    let calls = downstream.calls();

    let stages = vec![
        scripted_stage("format", 20, 3, &[Behavior::Pass, Behavior::Fail("not an image"), Behavior::Pass]).gating(),
        StageSpec::new("structure", 25, 1).with_detector(downstream),
    ];

    let report = pipeline(stages).run(&evidence()).await;

    assert_eq!(report.stages.len(), 1);
    assert_eq!(report.stages[0].stage_id, "format");
    assert_eq!(report.score, 0);
    assert!(!report.is_valid);
    assert_eq!(report.recommendations, vec!["format deficiency"]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_all_pass_scores_100() {
    let stages = five_stages(&passes(3), &passes(3), &passes(3), &passes(5), &passes(2));
    let report = pipeline(stages).run(&evidence()).await;

    assert_eq!(report.score, 100);
    assert!(report.is_valid);
    assert_eq!(report.recommendations, vec![ALL_CHECKS_PASSED]);
    assert_eq!(report.summary().checks_failed, 0);
}

#[tokio::test]
async fn test_all_fail_without_gating_scores_0() {
    let stages = vec![
        scripted_stage("structure", 25, 1, &fails(3)),
        scripted_stage("design", 20, 1, &fails(2)),
        scripted_stage("security", 25, 1, &fails(5)),
    ];
    let report = pipeline(stages).run(&evidence()).await;

    assert_eq!(report.score, 0);
    assert!(!report.is_valid);
    assert_eq!(report.stages.len(), 3);
    assert_eq!(
        report.recommendations,
        vec!["structure deficiency", "design deficiency", "security deficiency"]
    );
}

#[tokio::test]
async fn test_empty_stage_passes_but_scores_zero() {
    let stages = vec![
        scripted_stage("format", 50, 1, &passes(1)),
        StageSpec::new("design", 50, 0).with_recommendation("design deficiency"),
    ];
    let report = pipeline(stages).run(&evidence()).await;

    let design = report.stage("design").unwrap();
    assert!(design.passed);
    assert!(design.outcomes.is_empty());
    assert_eq!(report.score, 50);
    assert!(!report.is_valid);
    assert_eq!(report.recommendations, vec![ALL_CHECKS_PASSED]);
}

#[tokio::test]
async fn test_detector_faults_are_contained() {
    let security = [
        Behavior::Error("UV lamp offline"),
        Behavior::Panic("hologram model crashed"),
        Behavior::Pass,
        Behavior::Pass,
        Behavior::Pass,
    ];
    let stages = five_stages(&passes(3), &passes(3), &passes(3), &security, &passes(2));
    let report = pipeline(stages).run(&evidence()).await;

    let security = report.stage("security").unwrap();
    assert!(security.passed);
    assert_eq!(
        security.outcomes[0].evidence_summary.as_deref(),
        Some("detector error: UV lamp offline")
    );
    assert_eq!(
        security.outcomes[1].evidence_summary.as_deref(),
        Some("detector error: panicked: hologram model crashed")
    );
    // 3/5 of 25 = 15 lost 10 points
    assert_eq!(report.score, 90);
    assert!(report.error.is_none());
}

#[tokio::test]
async fn test_synchronous_detector_panic_is_contained() {
    let stages = vec![StageSpec::new("security", 25, 1)
        .with_detector(Arc::new(SyncPanicDetector))
        .with_detector(scripted("microtext", Behavior::Pass))];

    let report = pipeline(stages).run(&evidence()).await;

    assert!(report.error.is_none());
    assert_eq!(report.stages.len(), 1);
    let security = &report.stages[0];
    assert!(security.passed);
    assert_eq!(security.outcomes[0].name, "sync_panic");
    assert!(!security.outcomes[0].passed);
    assert_eq!(
        security.outcomes[0].evidence_summary.as_deref(),
        Some("detector error: panicked: bad detector setup")
    );
    assert!(security.outcomes[1].passed);
    assert_eq!(report.score, 50);
}

#[tokio::test]
async fn test_cancelled_run_drops_inflight_detectors() {
    let hanging = HangingDetector::default();
    let started = hanging.started();
    let dropped = hanging.dropped();
    let settings = RunSettings {
        parallel: true,
        ..RunSettings::default()
    };
    let stages = vec![StageSpec::new("security", 25, 1)
        .with_detector(scripted("microtext", Behavior::Pass))
        .with_detector(Arc::new(hanging))];
    let pipeline = Pipeline::new(stages, settings).unwrap();

    let handle = tokio::spawn(async move { pipeline.run(&DocumentEvidence::from_bytes(Vec::new())).await });
    while !started.load(Ordering::SeqCst) {
        tokio::task::yield_now().await;
    }
    assert!(!dropped.load(Ordering::SeqCst));

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_slow_detector_times_out() {
    let settings = RunSettings {
        timeout: Duration::from_millis(100),
        ..RunSettings::default()
    };
    let stages = vec![scripted_stage(
        "security",
        25,
        2,
        &[Behavior::Pass, Behavior::Slow(Duration::from_secs(60)), Behavior::Pass],
    )];

    let report = Pipeline::new(stages, settings).unwrap().run(&evidence()).await;

    let outcome = &report.stages[0].outcomes[1];
    assert!(!outcome.passed);
    assert_eq!(
        outcome.evidence_summary.as_deref(),
        Some("detector error: timed out after 100ms")
    );
    assert!(report.stages[0].passed);
}

#[tokio::test(start_paused = true)]
async fn test_parallel_outcomes_follow_configured_order() {
    let settings = RunSettings {
        parallel: true,
        ..RunSettings::default()
    };
    let stages = vec![scripted_stage(
        "security",
        25,
        3,
        &[
            Behavior::Slow(Duration::from_millis(300)),
            Behavior::Slow(Duration::from_millis(10)),
            Behavior::Slow(Duration::from_millis(150)),
        ],
    )];

    let report = Pipeline::new(stages, settings).unwrap().run(&evidence()).await;

    let names: Vec<&str> = report.stages[0].outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["security_0", "security_1", "security_2"]);
    assert!(report.stages[0].passed);
}

#[tokio::test]
async fn test_identical_runs_are_identical() {
    let structure = [Behavior::Pass, Behavior::Error("ocr timeout"), Behavior::Fail("bad MRZ")];
    let stages = five_stages(&passes(3), &structure, &passes(3), &fails(5), &passes(2));
    let pipeline = pipeline(stages);

    let first = normalized(pipeline.run(&evidence()).await);
    let second = normalized(pipeline.run(&evidence()).await);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_concurrent_runs_share_pipeline() {
    let stages = five_stages(&passes(3), &passes(3), &passes(3), &passes(5), &passes(2));
    let pipeline = pipeline(stages);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.run(&DocumentEvidence::from_bytes(Vec::new())).await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().score, 100);
    }
}

#[test]
fn test_config_fault_rejected_before_run() {
    let mut config = PipelineConfig::default();
    config.stages[1].min_passing_checks = 9;
    let catalog = build_catalog(&config, &RecordedOutcomes::default());

    let err = Pipeline::build(&config, &catalog).unwrap_err();
    assert!(matches!(
        err,
        DocAuthError::Config(ConfigError::QuorumExceedsDetectors { ref stage, .. }) if stage == "structure"
    ));
}

#[tokio::test]
async fn test_skipped_stages_do_not_dilute_score() {
    let structure = [Behavior::Pass, Behavior::Pass, Behavior::Fail("x")];
    let full = five_stages(&passes(3), &structure, &passes(3), &passes(5), &passes(2));
    let without_design: Vec<StageSpec> = full.iter().filter(|s| s.id != "design").cloned().collect();

    let report = pipeline(without_design).run(&evidence()).await;

    // (20*100 + 25*66.67 + 25*100 + 10*100) / 80
    assert_eq!(report.score, 90);
    assert!(report.stage("design").is_none());
}

const SPECIMEN_MRZ: &str = "L898902C36UTO7408122F1204159ZE184226B<<<<<10";

fn specimen(bytes: Vec<u8>) -> DocumentEvidence {
    DocumentEvidence::from_bytes(bytes)
        .with_label("specimen.png")
        .with_as_of(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
        .with_fields([
            ("document_number", "L898902C3"),
            ("surname", "ERIKSSON"),
            ("given_names", "ANNA MARIA"),
            ("date_of_birth", "1974-08-12"),
            ("date_of_issue", "2021-04-16"),
            ("date_of_expiry", "2031-04-15"),
            ("mrz_line2", SPECIMEN_MRZ),
        ])
}

fn recorded_all(passed: bool) -> RecordedOutcomes {
    let mut outcomes = RecordedOutcomes::default();
    for name in [
        "color_profile",
        "template_layout",
        "font_consistency",
        "microtext",
        "uv_ink",
        "hologram",
        "guilloche",
        "ghost_image",
    ] {
        outcomes.insert(
            name,
            RecordedOutcome {
                passed,
                confidence: Some(if passed { 95 } else { 20 }),
                evidence: None,
            },
        );
    }
    outcomes
}

#[tokio::test]
async fn test_builtin_pipeline_valid_card() {
    let report = validate_document(
        &specimen(png(856, 540)),
        &PipelineConfig::default(),
        &recorded_all(true),
    )
    .await
    .unwrap();

    assert_eq!(report.document.as_deref(), Some("specimen.png"));
    assert_eq!(report.score, 100, "{:?}", report.failed_checks().collect::<Vec<_>>());
    assert!(report.is_valid);
    assert_eq!(report.recommendations, vec![ALL_CHECKS_PASSED]);
}

#[tokio::test]
async fn test_builtin_pipeline_without_recorded_outcomes() {
    let report = validate_document(
        &specimen(png(856, 540)),
        &PipelineConfig::default(),
        &RecordedOutcomes::default(),
    )
    .await
    .unwrap();

    // format, structure and validity pass; design and security cannot run
    assert_eq!(report.score, 55);
    assert!(!report.is_valid);
    assert_eq!(report.recommendations.len(), 2);
    let hologram = report
        .stage("security")
        .unwrap()
        .outcomes
        .iter()
        .find(|o| o.name == "hologram")
        .unwrap();
    assert_eq!(
        hologram.evidence_summary.as_deref(),
        Some("detector error: no recorded outcome for 'hologram'")
    );
}

#[tokio::test]
async fn test_builtin_pipeline_rejects_thumbnail() {
    let report = validate_document(
        &specimen(png(120, 76)),
        &PipelineConfig::default(),
        &recorded_all(true),
    )
    .await
    .unwrap();

    // resolution fails, 3 of 4 still meets the format quorum
    let format = report.stage("format").unwrap();
    assert!(format.passed);
    assert!(!format.outcomes.iter().find(|o| o.name == "resolution").unwrap().passed);
    assert_eq!(report.score, 95);
}

#[tokio::test]
async fn test_builtin_pipeline_garbage_bytes_gated() {
    let report = validate_document(
        &specimen(b"%PDF-1.7 not an image".to_vec()),
        &PipelineConfig::default(),
        &recorded_all(true),
    )
    .await
    .unwrap();

    assert_eq!(report.stages.len(), 1);
    assert_eq!(report.score, 0);
    assert!(!report.is_valid);
    assert_eq!(report.recommendations.len(), 1);
}

#[tokio::test]
async fn test_builtin_pipeline_tampered_mrz_and_expired() {
    let evidence = specimen(png(856, 540))
        .with_field("mrz_line2", SPECIMEN_MRZ.replace("740812", "750812"))
        .with_field("date_of_expiry", "2024-12-31")
        .with_field("date_of_issue", "2015-01-01");

    let report = validate_document(&evidence, &PipelineConfig::default(), &recorded_all(true))
        .await
        .unwrap();

    let mrz = report
        .failed_checks()
        .find(|(_, o)| o.name == "mrz_check_digits")
        .map(|(_, o)| o.evidence_summary.clone().unwrap_or_default())
        .unwrap();
    assert_eq!(mrz, "invalid check digits: date of birth, composite");

    // structure 2/3 still passes its quorum, validity 1/2 fails
    assert!(report.stage("structure").unwrap().passed);
    assert!(!report.stage("validity").unwrap().passed);
    assert_eq!(report.recommendations.len(), 1);
    assert!(report.recommendations[0].contains("unexpired"));
}
