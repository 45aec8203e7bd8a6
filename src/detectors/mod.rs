//! Detector capabilities.
//!
//! A detector is one named check over [`DocumentEvidence`]. The pipeline only
//! ever sees the [`Detector`] trait; which concrete detectors a stage uses is
//! decided when the pipeline is built, through the [`DetectorCatalog`].
//!
//! Built-in detectors cover what can be decided without pixel analysis:
//! - Format: file signature, header decoding, resolution, aspect ratio
//! - Structure: required fields, MRZ check digits, date field syntax
//! - Validity: expiry and issue dates against the reference date
//!
//! Visual and security features (microtext, UV ink, holograms) come from
//! external systems, either replayed through [`RecordedDetector`] or plugged
//! in by the embedding application via [`detector_fn`].
//!
//! # Graceful Degradation
//!
//! Detectors report an unmet condition as a failing [`Detection`]. Returning
//! `Err` is reserved for "could not check at all"; the stage runner turns
//! both errors and panics into failing outcomes.

pub mod format;
pub mod recorded;
pub mod structure;
pub mod validity;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::DetectorSettings;
use crate::evidence::DocumentEvidence;

pub use format::{AspectRatioDetector, DecodableDetector, FileSignatureDetector, ResolutionDetector};
pub use recorded::{RecordedDetector, RecordedOutcome, RecordedOutcomes};
pub use structure::{DateFieldsDetector, MrzCheckDigitDetector, RequiredFieldsDetector};
pub use validity::{IssueDateDetector, NotExpiredDetector};

/// Why a detector could not produce a detection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectorError {
    /// The backing capability is not available for this run
    #[error("{0}")]
    Unavailable(String),
    /// The detector ran but failed internally
    #[error("{0}")]
    Failed(String),
}

/// What a detector concluded about the evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub passed: bool,
    /// 0..=100
    pub confidence: Option<u8>,
    pub evidence: Option<String>,
}

impl Detection {
    pub fn pass() -> Self {
        Detection {
            passed: true,
            confidence: None,
            evidence: None,
        }
    }

    pub fn fail(evidence: impl Into<String>) -> Self {
        Detection {
            passed: false,
            confidence: None,
            evidence: Some(evidence.into()),
        }
    }

    /// Confidence is clamped to 100.
    pub fn with_confidence(mut self, confidence: u8) -> Self {
        self.confidence = Some(confidence.min(100));
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }
}

/// A named authenticity check.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Stable name used in configuration and reports.
    fn name(&self) -> &str;

    /// Examine the evidence.
    async fn detect(&self, evidence: &DocumentEvidence) -> Result<Detection, DetectorError>;
}

impl fmt::Debug for dyn Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Detector({})", self.name())
    }
}

/// Detector backed by an async closure.
pub struct FnDetector<F> {
    name: String,
    detect_fn: F,
}

/// Wrap an async closure as a detector. The closure receives a cheap clone
/// of the evidence.
pub fn detector_fn<F, Fut>(name: impl Into<String>, detect_fn: F) -> FnDetector<F>
where
    F: Fn(DocumentEvidence) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Detection, DetectorError>> + Send + 'static,
{
    FnDetector {
        name: name.into(),
        detect_fn,
    }
}

#[async_trait]
impl<F, Fut> Detector for FnDetector<F>
where
    F: Fn(DocumentEvidence) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Detection, DetectorError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn detect(&self, evidence: &DocumentEvidence) -> Result<Detection, DetectorError> {
        (self.detect_fn)(evidence.clone()).await
    }
}

/// Name to detector map consulted while building a pipeline.
#[derive(Clone, Default)]
pub struct DetectorCatalog {
    detectors: BTreeMap<String, Arc<dyn Detector>>,
}

impl DetectorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with every built-in detector, tuned by `settings`.
    pub fn builtin(settings: &DetectorSettings) -> Self {
        let mut catalog = Self::new();
        catalog.register(FileSignatureDetector);
        catalog.register(DecodableDetector);
        catalog.register(ResolutionDetector::new(settings.min_width, settings.min_height));
        catalog.register(AspectRatioDetector::new(settings.aspect_tolerance));
        catalog.register(RequiredFieldsDetector::new(settings.required_fields.clone()));
        catalog.register(MrzCheckDigitDetector);
        catalog.register(DateFieldsDetector);
        catalog.register(NotExpiredDetector);
        catalog.register(IssueDateDetector);
        catalog
    }

    /// Register a detector, replacing any previous one with the same name.
    pub fn register(&mut self, detector: impl Detector + 'static) {
        self.register_arc(Arc::new(detector));
    }

    pub fn register_arc(&mut self, detector: Arc<dyn Detector>) {
        self.detectors.insert(detector.name().to_string(), detector);
    }

    /// Register a replaying detector for every name in `names` that has no
    /// detector yet. Names without a recording become detectors that report
    /// themselves unavailable.
    pub fn fill_from_recorded<'a>(
        &mut self,
        names: impl IntoIterator<Item = &'a str>,
        outcomes: &RecordedOutcomes,
    ) {
        for name in names {
            if !self.detectors.contains_key(name) {
                let detector = RecordedDetector::new(name, outcomes.get(name).cloned());
                self.register(detector);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Detector>> {
        self.detectors.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.detectors.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.detectors.keys().map(String::as_str)
    }
}
