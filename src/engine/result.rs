//! Check outcomes, stage results and the validation report.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::detectors::Detection;

/// Recommendation used when every executed stage passed.
pub const ALL_CHECKS_PASSED: &str = "All checks passed";

/// Recommendation used when the run itself faulted.
pub const RESUBMIT_AFTER_FAULT: &str =
    "Validation could not be completed: resubmit the document or contact support";

/// Result of one detector invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub name: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_summary: Option<String>,
    pub duration_ms: u64,
}

impl CheckOutcome {
    pub fn from_detection(name: impl Into<String>, detection: Detection, duration_ms: u64) -> Self {
        CheckOutcome {
            name: name.into(),
            passed: detection.passed,
            confidence: detection.confidence.map(|c| c.min(100)),
            evidence_summary: detection.evidence,
            duration_ms,
        }
    }

    /// Failing outcome for a detector that errored, panicked or timed out.
    pub fn detector_error(name: impl Into<String>, reason: impl AsRef<str>, duration_ms: u64) -> Self {
        CheckOutcome {
            name: name.into(),
            passed: false,
            confidence: None,
            evidence_summary: Some(format!("detector error: {}", reason.as_ref())),
            duration_ms,
        }
    }
}

/// Outcomes collected by one stage and the quorum verdict over them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageResult {
    pub stage_id: String,
    pub passed: bool,
    pub outcomes: Vec<CheckOutcome>,
}

impl StageResult {
    /// Apply the quorum rule: the stage passes when at least
    /// `min_passing_checks` outcomes passed.
    pub fn from_outcomes(
        stage_id: impl Into<String>,
        outcomes: Vec<CheckOutcome>,
        min_passing_checks: usize,
    ) -> Self {
        let passing = outcomes.iter().filter(|o| o.passed).count();
        StageResult {
            stage_id: stage_id.into(),
            passed: passing >= min_passing_checks,
            outcomes,
        }
    }

    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }
}

/// Counts over a report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub stages_passed: u32,
    pub stages_failed: u32,
    pub checks_passed: u32,
    pub checks_failed: u32,
}

impl ReportSummary {
    pub fn stages_total(&self) -> u32 {
        self.stages_passed + self.stages_failed
    }

    pub fn checks_total(&self) -> u32 {
        self.checks_passed + self.checks_failed
    }
}

/// Outcome of one validation run. Stages appear in execution order;
/// stages that never ran are absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    pub is_valid: bool,
    pub score: u8,
    #[serde(serialize_with = "serialize_stages")]
    pub stages: Vec<StageResult>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub total_duration_ms: u64,
}

fn serialize_stages<S: Serializer>(stages: &[StageResult], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(stages.len()))?;
    for stage in stages {
        map.serialize_entry(&stage.stage_id, stage)?;
    }
    map.end()
}

impl ValidationReport {
    pub(crate) fn new(
        stages: Vec<StageResult>,
        score: u8,
        is_valid: bool,
        recommendations: Vec<String>,
    ) -> Self {
        ValidationReport {
            document: None,
            is_valid,
            score,
            stages,
            recommendations,
            error: None,
            timestamp: Utc::now(),
            total_duration_ms: 0,
        }
    }

    /// Report for a run that hit an unexpected internal fault.
    pub(crate) fn faulted(error: impl Into<String>) -> Self {
        let mut report = Self::new(
            Vec::new(),
            0,
            false,
            vec![RESUBMIT_AFTER_FAULT.to_string()],
        );
        report.error = Some(error.into());
        report
    }

    pub fn stage(&self, stage_id: &str) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage_id == stage_id)
    }

    /// Every failing check across all executed stages, in order.
    pub fn failed_checks(&self) -> impl Iterator<Item = (&str, &CheckOutcome)> {
        self.stages.iter().flat_map(|stage| {
            stage
                .failed_checks()
                .map(move |outcome| (stage.stage_id.as_str(), outcome))
        })
    }

    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();

        for stage in &self.stages {
            if stage.passed {
                summary.stages_passed += 1;
            } else {
                summary.stages_failed += 1;
            }

            for outcome in &stage.outcomes {
                if outcome.passed {
                    summary.checks_passed += 1;
                } else {
                    summary.checks_failed += 1;
                }
            }
        }

        summary
    }
}
