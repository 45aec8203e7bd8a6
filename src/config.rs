//! Pipeline configuration.
//!
//! The stage registry, pass threshold and detector timeout are loaded once
//! at startup, either from the built-in defaults or from a TOML file, and
//! never change during a run:
//!
//! ```toml
//! pass_threshold = 70
//! timeout_ms = 30000
//! parallel = true
//!
//! [[stages]]
//! id = "format"
//! weight = 20
//! min_passing_checks = 3
//! gating = true
//! detectors = ["file_signature", "decodable", "resolution", "aspect_ratio"]
//! recommendation = "Upload a clear, uncropped photo of the document"
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detectors::DetectorCatalog;

pub const DEFAULT_PASS_THRESHOLD: u8 = 70;
pub const DEFAULT_TIMEOUT_MS: u64 = 30000;

/// Configuration faults. All of them are detected before any run starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("no stages configured")]
    NoStages,

    #[error("stage '{0}' is configured more than once")]
    DuplicateStage(String),

    #[error("stage '{0}' must have a weight greater than zero")]
    ZeroWeight(String),

    #[error("stage '{stage}' requires {min_passing_checks} passing checks but has only {available} detectors")]
    QuorumExceedsDetectors {
        stage: String,
        min_passing_checks: usize,
        available: usize,
    },

    #[error("stage '{stage}' references unknown detector '{detector}'")]
    UnknownDetector { stage: String, detector: String },

    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    #[error("pass threshold {0} is outside 0..=100")]
    ThresholdOutOfRange(u8),

    #[error("detector timeout must be greater than zero")]
    ZeroTimeout,
}

/// Tunables for the built-in detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    pub min_width: u32,
    pub min_height: u32,
    /// Relative tolerance for the aspect ratio match
    pub aspect_tolerance: f64,
    pub required_fields: Vec<String>,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        DetectorSettings {
            min_width: 600,
            min_height: 400,
            aspect_tolerance: 0.08,
            required_fields: ["document_number", "surname", "given_names", "date_of_birth"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// One stage as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    pub id: String,
    pub weight: u32,
    #[serde(default)]
    pub min_passing_checks: usize,
    #[serde(default)]
    pub gating: bool,
    #[serde(default)]
    pub detectors: Vec<String>,
    /// Remediation shown when this stage fails
    pub recommendation: String,
}

impl StageConfig {
    fn new(
        id: &str,
        weight: u32,
        min_passing_checks: usize,
        gating: bool,
        detectors: &[&str],
        recommendation: &str,
    ) -> Self {
        StageConfig {
            id: id.to_string(),
            weight,
            min_passing_checks,
            gating,
            detectors: detectors.iter().map(|d| d.to_string()).collect(),
            recommendation: recommendation.to_string(),
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pass_threshold: u8,
    /// Per-detector timeout
    pub timeout_ms: u64,
    /// Run the detectors of a stage concurrently
    pub parallel: bool,
    pub detectors: DetectorSettings,
    pub stages: Vec<StageConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            parallel: false,
            detectors: DetectorSettings::default(),
            stages: default_stages(),
        }
    }
}

/// Format, structure, design, security, validity.
pub fn default_stages() -> Vec<StageConfig> {
    vec![
        StageConfig::new(
            "format",
            20,
            3,
            true,
            &["file_signature", "decodable", "resolution", "aspect_ratio"],
            "Document image is not a readable photo of an identity document: upload a clear, uncropped JPEG or PNG of the whole document",
        ),
        StageConfig::new(
            "structure",
            25,
            2,
            false,
            &["required_fields", "mrz_check_digits", "date_fields"],
            "Document data structure is inconsistent: make sure all printed fields and the machine readable zone are fully visible",
        ),
        StageConfig::new(
            "design",
            20,
            2,
            false,
            &["color_profile", "template_layout", "font_consistency"],
            "Document design does not match the issuer template: photograph the original document, not a copy or screen",
        ),
        StageConfig::new(
            "security",
            25,
            3,
            false,
            &["microtext", "uv_ink", "hologram", "guilloche", "ghost_image"],
            "Security features could not be verified: retake the photo without glare so holograms and fine print are visible",
        ),
        StageConfig::new(
            "validity",
            10,
            2,
            false,
            &["not_expired", "issue_date_consistent"],
            "Document is not currently valid: submit an unexpired document",
        ),
    ]
}

impl PipelineConfig {
    /// Load configuration from a TOML file. Omitted keys keep their defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Every detector name referenced by any stage, in stage order.
    pub fn detector_names(&self) -> impl Iterator<Item = &str> {
        self.stages
            .iter()
            .flat_map(|stage| stage.detectors.iter().map(String::as_str))
    }

    /// Restrict the run to a subset of stages. `only` keeps the listed
    /// stages (all when empty), `skip` then removes stages. Relative order
    /// is preserved.
    pub fn select_stages(&mut self, only: &[String], skip: &[String]) -> Result<(), ConfigError> {
        for id in only.iter().chain(skip) {
            if !self.stages.iter().any(|stage| &stage.id == id) {
                return Err(ConfigError::UnknownStage(id.clone()));
            }
        }

        self.stages.retain(|stage| {
            (only.is_empty() || only.contains(&stage.id)) && !skip.contains(&stage.id)
        });

        if self.stages.is_empty() {
            return Err(ConfigError::NoStages);
        }
        Ok(())
    }

    /// Check the configuration against a detector catalog.
    pub fn validate(&self, catalog: &DetectorCatalog) -> Result<(), ConfigError> {
        if self.pass_threshold > 100 {
            return Err(ConfigError::ThresholdOutOfRange(self.pass_threshold));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        validate_stage_shapes(self.stages.iter().map(|stage| StageShape {
            id: &stage.id,
            weight: stage.weight,
            min_passing_checks: stage.min_passing_checks,
            detector_count: stage.detectors.len(),
        }))?;

        for stage in &self.stages {
            if let Some(unknown) = stage.detectors.iter().find(|d| !catalog.contains(d)) {
                return Err(ConfigError::UnknownDetector {
                    stage: stage.id.clone(),
                    detector: unknown.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Shape of a stage, independent of how its detectors are referenced.
pub(crate) struct StageShape<'a> {
    pub id: &'a str,
    pub weight: u32,
    pub min_passing_checks: usize,
    pub detector_count: usize,
}

/// Structural checks shared by configuration and resolved stage specs.
pub(crate) fn validate_stage_shapes<'a>(
    shapes: impl IntoIterator<Item = StageShape<'a>>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for shape in shapes {
        if !seen.insert(shape.id) {
            return Err(ConfigError::DuplicateStage(shape.id.to_string()));
        }
        if shape.weight == 0 {
            return Err(ConfigError::ZeroWeight(shape.id.to_string()));
        }
        if shape.min_passing_checks > shape.detector_count {
            return Err(ConfigError::QuorumExceedsDetectors {
                stage: shape.id.to_string(),
                min_passing_checks: shape.min_passing_checks,
                available: shape.detector_count,
            });
        }
    }

    if seen.is_empty() {
        return Err(ConfigError::NoStages);
    }
    Ok(())
}
