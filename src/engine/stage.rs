//! Stage runner.
//!
//! Invokes every detector of one stage and applies the stage's quorum.
//!
//! # Graceful Degradation
//!
//! - Detector returns `Err`: recorded as a failing outcome
//! - Detector panics: caught, recorded as a failing outcome
//! - Detector exceeds the timeout: future dropped, recorded as a failing outcome
//!
//! Nothing a detector does can abort the stage.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use futures::FutureExt;
use tracing::{debug, instrument, warn};

use crate::detectors::Detector;
use crate::engine::orchestrator::RunContext;
use crate::engine::result::{CheckOutcome, StageResult};

/// A resolved, immutable stage.
#[derive(Debug, Clone)]
pub struct StageSpec {
    pub id: String,
    pub weight: u32,
    pub min_passing_checks: usize,
    pub gating: bool,
    pub detectors: Vec<Arc<dyn Detector>>,
    pub recommendation: String,
}

impl StageSpec {
    pub fn new(id: impl Into<String>, weight: u32, min_passing_checks: usize) -> Self {
        StageSpec {
            id: id.into(),
            weight,
            min_passing_checks,
            gating: false,
            detectors: Vec::new(),
            recommendation: String::new(),
        }
    }

    pub fn gating(mut self) -> Self {
        self.gating = true;
        self
    }

    pub fn with_detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = recommendation.into();
        self
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Invoke one detector with panic capture and a timeout.
async fn invoke(detector: &dyn Detector, ctx: &RunContext<'_>) -> CheckOutcome {
    let name = detector.name();
    let start = Instant::now();

    // The call stays inside the async block so a panic raised before the
    // future is built is caught too.
    let guarded = AssertUnwindSafe(async { detector.detect(ctx.evidence).await }).catch_unwind();
    let result = tokio::time::timeout(ctx.timeout, guarded).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(Ok(detection))) => {
            debug!(detector = name, passed = detection.passed, duration_ms, "detector finished");
            CheckOutcome::from_detection(name, detection, duration_ms)
        }
        Ok(Ok(Err(e))) => {
            warn!(detector = name, error = %e, "detector failed");
            CheckOutcome::detector_error(name, e.to_string(), duration_ms)
        }
        Ok(Err(payload)) => {
            let message = panic_message(payload.as_ref());
            warn!(detector = name, panic = %message, "detector panicked");
            CheckOutcome::detector_error(name, format!("panicked: {}", message), duration_ms)
        }
        Err(_) => {
            let timeout_ms = duration_ms_of(ctx.timeout);
            warn!(detector = name, timeout_ms, "detector timed out");
            CheckOutcome::detector_error(name, format!("timed out after {}ms", timeout_ms), duration_ms)
        }
    }
}

fn duration_ms_of(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

/// Run every detector of `spec` against the run's evidence.
///
/// With `ctx.parallel` the detectors run concurrently behind a join
/// barrier; either way outcomes follow the configured detector order.
#[instrument(skip_all, fields(stage = %spec.id))]
pub async fn run_stage(spec: &StageSpec, ctx: &RunContext<'_>) -> StageResult {
    let outcomes = if ctx.parallel {
        join_all(spec.detectors.iter().map(|d| invoke(d.as_ref(), ctx))).await
    } else {
        let mut outcomes = Vec::with_capacity(spec.detectors.len());
        for detector in &spec.detectors {
            outcomes.push(invoke(detector.as_ref(), ctx).await);
        }
        outcomes
    };

    let result = StageResult::from_outcomes(spec.id.clone(), outcomes, spec.min_passing_checks);
    debug!(
        passed = result.passed,
        passing = result.passed_count(),
        required = spec.min_passing_checks,
        "stage finished"
    );
    result
}
