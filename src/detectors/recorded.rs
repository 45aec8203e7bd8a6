//! Replay of outcomes produced by external detection systems.
//!
//! Visual and security feature analysis runs outside this crate. Its
//! results arrive as a JSON object keyed by detector name:
//!
//! ```json
//! { "hologram": { "passed": true, "confidence": 91, "evidence": "2 of 2 patches" } }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Detection, Detector, DetectorError};
use crate::evidence::DocumentEvidence;
use crate::DocAuthError;

/// One externally produced outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedOutcome {
    pub passed: bool,
    #[serde(default)]
    pub confidence: Option<u8>,
    #[serde(default)]
    pub evidence: Option<String>,
}

/// Recorded outcomes keyed by detector name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordedOutcomes(BTreeMap<String, RecordedOutcome>);

impl RecordedOutcomes {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn load_from(path: &Path) -> Result<Self, DocAuthError> {
        let outcomes_error = |message: String| DocAuthError::Outcomes {
            path: path.display().to_string(),
            message,
        };
        let json = std::fs::read_to_string(path).map_err(|e| outcomes_error(e.to_string()))?;
        Self::from_json(&json).map_err(|e| outcomes_error(e.to_string()))
    }

    pub fn insert(&mut self, name: impl Into<String>, outcome: RecordedOutcome) {
        self.0.insert(name.into(), outcome);
    }

    pub fn get(&self, name: &str) -> Option<&RecordedOutcome> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Detector that reports a recorded outcome, or unavailability when none
/// was recorded for its name.
pub struct RecordedDetector {
    name: String,
    outcome: Option<RecordedOutcome>,
}

impl RecordedDetector {
    pub fn new(name: impl Into<String>, outcome: Option<RecordedOutcome>) -> Self {
        RecordedDetector {
            name: name.into(),
            outcome,
        }
    }
}

#[async_trait]
impl Detector for RecordedDetector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn detect(&self, _evidence: &DocumentEvidence) -> Result<Detection, DetectorError> {
        let outcome = self.outcome.as_ref().ok_or_else(|| {
            DetectorError::Unavailable(format!("no recorded outcome for '{}'", self.name))
        })?;

        Ok(Detection {
            passed: outcome.passed,
            confidence: outcome.confidence.map(|c| c.min(100)),
            evidence: outcome.evidence.clone(),
        })
    }
}
