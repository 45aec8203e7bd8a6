//! Validation pipeline orchestrator.
//!
//! Runs the configured stages in order, stops at a failed gating stage,
//! then scores the executed stages and synthesizes recommendations.
//!
//! # Graceful Degradation
//!
//! - Detector faults: absorbed by the stage runner as failing outcomes
//! - Gating failure: remaining stages are not run, score is 0
//! - Internal panic: caught, returned as a faulted report
//!
//! `Pipeline::run` always returns a well-formed report. Configuration
//! faults are rejected earlier, when the pipeline is built.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tracing::{debug, error, info, instrument};

use crate::config::{validate_stage_shapes, ConfigError, PipelineConfig, StageShape, DEFAULT_PASS_THRESHOLD, DEFAULT_TIMEOUT_MS};
use crate::detectors::DetectorCatalog;
use crate::engine::recommend;
use crate::engine::result::{StageResult, ValidationReport};
use crate::engine::score;
use crate::engine::stage::{panic_message, run_stage, StageSpec};
use crate::evidence::DocumentEvidence;
use crate::DocAuthError;

/// Run-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub pass_threshold: u8,
    pub timeout: Duration,
    pub parallel: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        RunSettings {
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            parallel: false,
        }
    }
}

/// State owned by a single run. Nothing in it outlives the run.
#[derive(Debug)]
pub struct RunContext<'a> {
    pub evidence: &'a DocumentEvidence,
    pub timeout: Duration,
    pub parallel: bool,
}

impl<'a> RunContext<'a> {
    pub fn new(evidence: &'a DocumentEvidence, timeout: Duration, parallel: bool) -> Self {
        RunContext {
            evidence,
            timeout,
            parallel,
        }
    }
}

/// A built, immutable validation pipeline. Cheap to clone and safe to
/// share across concurrent runs.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Arc<[StageSpec]>,
    settings: RunSettings,
}

impl Pipeline {
    /// Build a pipeline from resolved stage specs.
    pub fn new(stages: Vec<StageSpec>, settings: RunSettings) -> Result<Self, ConfigError> {
        if settings.pass_threshold > 100 {
            return Err(ConfigError::ThresholdOutOfRange(settings.pass_threshold));
        }
        if settings.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        validate_stage_shapes(stages.iter().map(|stage| StageShape {
            id: &stage.id,
            weight: stage.weight,
            min_passing_checks: stage.min_passing_checks,
            detector_count: stage.detectors.len(),
        }))?;

        Ok(Pipeline {
            stages: stages.into(),
            settings,
        })
    }

    /// Build a pipeline from configuration, resolving detector names
    /// against `catalog`.
    pub fn build(config: &PipelineConfig, catalog: &DetectorCatalog) -> Result<Self, DocAuthError> {
        config.validate(catalog)?;

        let mut stages = Vec::with_capacity(config.stages.len());
        for stage in &config.stages {
            let mut detectors = Vec::with_capacity(stage.detectors.len());
            for name in &stage.detectors {
                let detector = catalog.get(name).ok_or_else(|| ConfigError::UnknownDetector {
                    stage: stage.id.clone(),
                    detector: name.clone(),
                })?;
                detectors.push(detector);
            }
            stages.push(StageSpec {
                id: stage.id.clone(),
                weight: stage.weight,
                min_passing_checks: stage.min_passing_checks,
                gating: stage.gating,
                detectors,
                recommendation: stage.recommendation.clone(),
            });
        }

        let settings = RunSettings {
            pass_threshold: config.pass_threshold,
            timeout: Duration::from_millis(config.timeout_ms),
            parallel: config.parallel,
        };
        debug!(stages = stages.len(), "pipeline built");
        Ok(Self::new(stages, settings)?)
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Validate one document.
    #[instrument(skip_all, fields(document = evidence.label().unwrap_or("<bytes>")))]
    pub async fn run(&self, evidence: &DocumentEvidence) -> ValidationReport {
        let start = Instant::now();
        let ctx = RunContext::new(evidence, self.settings.timeout, self.settings.parallel);

        let mut report = match AssertUnwindSafe(self.execute(&ctx)).catch_unwind().await {
            Ok(report) => report,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(panic = %message, "validation run faulted");
                ValidationReport::faulted(format!("internal fault: {}", message))
            }
        };

        report.document = evidence.label().map(str::to_string);
        report.total_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            valid = report.is_valid,
            score = report.score,
            stages = report.stages.len(),
            "validation finished"
        );
        report
    }

    async fn execute(&self, ctx: &RunContext<'_>) -> ValidationReport {
        let mut results: Vec<StageResult> = Vec::with_capacity(self.stages.len());

        for spec in self.stages.iter() {
            let result = run_stage(spec, ctx).await;
            let gated = spec.gating && !result.passed;
            results.push(result);

            if gated {
                info!(stage = %spec.id, "gating stage failed, stopping");
                let recommendations = recommend::synthesize(&results, &self.stages);
                return ValidationReport::new(results, 0, false, recommendations);
            }
        }

        let score = score::aggregate(&results, &self.stages);
        let recommendations = recommend::synthesize(&results, &self.stages);
        ValidationReport::new(results, score, score >= self.settings.pass_threshold, recommendations)
    }
}
