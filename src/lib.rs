//! docauth library
//!
//! Identity document authenticity validation.
//!
//! A document image is run through an ordered set of weighted stages
//! (format, structure, design, security, validity). Each stage invokes its
//! detectors, applies a quorum, and contributes to a 0-100 score. A failed
//! gating stage stops the run early. The result is a [`ValidationReport`]
//! with a verdict, the per-stage outcomes and remediation guidance.
//!
//! # Example
//!
//! ```no_run
//! use docauth::{validate_document, DocumentEvidence, PipelineConfig, RecordedOutcomes};
//!
//! # async fn run() -> Result<(), docauth::DocAuthError> {
//! let evidence = DocumentEvidence::load("passport.jpg")
//!     .await?
//!     .with_field("date_of_expiry", "2031-04-15");
//! let report = validate_document(&evidence, &PipelineConfig::default(), &RecordedOutcomes::default()).await?;
//! println!("valid: {}, score: {}", report.is_valid, report.score);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod detectors;
pub mod engine;
pub mod evidence;
pub mod version;

use std::path::Path;

use thiserror::Error;

pub use config::{ConfigError, PipelineConfig, StageConfig};
pub use detectors::{detector_fn, Detection, Detector, DetectorCatalog, DetectorError, RecordedOutcomes};
pub use engine::orchestrator::{Pipeline, RunSettings};
pub use engine::result::{CheckOutcome, ReportSummary, StageResult, ValidationReport};
pub use engine::stage::StageSpec;
pub use evidence::{DocumentEvidence, EvidenceError, ImageInfo};

/// Error types for docauth operations.
#[derive(Debug, Error)]
pub enum DocAuthError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("evidence error: {0}")]
    Evidence(#[from] EvidenceError),

    #[error("cannot load outcomes from {path}: {message}")]
    Outcomes { path: String, message: String },

    #[error("cannot load fields from {path}: {message}")]
    Fields { path: String, message: String },
}

/// Load configuration from `path`, or the built-in defaults when absent.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    match path {
        Some(path) => PipelineConfig::load_from(path),
        None => Ok(PipelineConfig::default()),
    }
}

/// Build a detector catalog for `config`: every built-in detector, plus a
/// replaying detector for each remaining configured name.
pub fn build_catalog(config: &PipelineConfig, outcomes: &RecordedOutcomes) -> DetectorCatalog {
    let mut catalog = DetectorCatalog::builtin(&config.detectors);
    catalog.fill_from_recorded(config.detector_names(), outcomes);
    catalog
}

/// Validate one document against `config`.
///
/// Builds a pipeline for the call. Callers validating many documents
/// should build a [`Pipeline`] once and reuse it.
pub async fn validate_document(
    evidence: &DocumentEvidence,
    config: &PipelineConfig,
    outcomes: &RecordedOutcomes,
) -> Result<ValidationReport, DocAuthError> {
    let catalog = build_catalog(config, outcomes);
    let pipeline = Pipeline::build(config, &catalog)?;
    Ok(pipeline.run(evidence).await)
}

/// Read a flat JSON object of extracted text fields.
pub fn load_fields(path: &Path) -> Result<std::collections::BTreeMap<String, String>, DocAuthError> {
    let fields_error = |message: String| DocAuthError::Fields {
        path: path.display().to_string(),
        message,
    };
    let json = std::fs::read_to_string(path).map_err(|e| fields_error(e.to_string()))?;
    serde_json::from_str(&json).map_err(|e| fields_error(e.to_string()))
}
