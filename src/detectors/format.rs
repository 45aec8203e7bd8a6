//! Format pre-checks (file signature, decodable header, resolution, aspect ratio).
//!
//! These run first and gate the pipeline: evidence that is not even an
//! image of plausible size and shape is not worth checking further.
//! Evidence faults are reported as failing detections whose summary starts
//! with `evidence fault:`.

use async_trait::async_trait;
use image::ImageFormat;

use super::{Detection, Detector, DetectorError};
use crate::evidence::{DocumentEvidence, EvidenceError, ImageInfo};

/// ID-1 card (85.60 x 53.98 mm).
const ID1_RATIO: f64 = 85.60 / 53.98;
/// TD3 passport data page (125 x 88 mm).
const TD3_RATIO: f64 = 125.0 / 88.0;

fn evidence_fault(error: &EvidenceError) -> Detection {
    Detection::fail(format!("evidence fault: {}", error))
}

fn probe(evidence: &DocumentEvidence) -> Result<ImageInfo, Detection> {
    evidence.probe().map_err(|e| evidence_fault(&e))
}

/// The byte stream starts with a JPEG, PNG, TIFF or WebP signature.
pub struct FileSignatureDetector;

#[async_trait]
impl Detector for FileSignatureDetector {
    fn name(&self) -> &str {
        "file_signature"
    }

    async fn detect(&self, evidence: &DocumentEvidence) -> Result<Detection, DetectorError> {
        if evidence.bytes().is_empty() {
            return Ok(evidence_fault(&EvidenceError::Empty));
        }

        let detection = match image::guess_format(evidence.bytes()) {
            Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Tiff | ImageFormat::WebP)) => {
                Detection::pass()
                    .with_confidence(100)
                    .with_evidence(format!("{:?} signature", format))
            }
            Ok(format) => Detection::fail(format!("unsupported image format {:?}", format)),
            Err(_) => evidence_fault(&EvidenceError::UnrecognizedFormat),
        };

        Ok(detection)
    }
}

/// The image header decodes to non-zero dimensions.
pub struct DecodableDetector;

#[async_trait]
impl Detector for DecodableDetector {
    fn name(&self) -> &str {
        "decodable"
    }

    async fn detect(&self, evidence: &DocumentEvidence) -> Result<Detection, DetectorError> {
        let info = match probe(evidence) {
            Ok(info) => info,
            Err(detection) => return Ok(detection),
        };

        if info.width == 0 || info.height == 0 {
            return Ok(Detection::fail(format!("degenerate image {}", info)));
        }

        Ok(Detection::pass()
            .with_confidence(100)
            .with_evidence(info.to_string()))
    }
}

/// Width and height are both at least the configured minimum, in either
/// orientation.
pub struct ResolutionDetector {
    min_width: u32,
    min_height: u32,
}

impl ResolutionDetector {
    pub fn new(min_width: u32, min_height: u32) -> Self {
        ResolutionDetector {
            min_width,
            min_height,
        }
    }
}

#[async_trait]
impl Detector for ResolutionDetector {
    fn name(&self) -> &str {
        "resolution"
    }

    async fn detect(&self, evidence: &DocumentEvidence) -> Result<Detection, DetectorError> {
        let info = match probe(evidence) {
            Ok(info) => info,
            Err(detection) => return Ok(detection),
        };

        let long_side = info.width.max(info.height);
        let short_side = info.width.min(info.height);
        let required_long = self.min_width.max(self.min_height);
        let required_short = self.min_width.min(self.min_height);

        if long_side >= required_long && short_side >= required_short {
            Ok(Detection::pass()
                .with_confidence(100)
                .with_evidence(format!("{}x{}", info.width, info.height)))
        } else {
            Ok(Detection::fail(format!(
                "{}x{} is below the minimum {}x{}",
                info.width, info.height, self.min_width, self.min_height
            )))
        }
    }
}

/// Aspect ratio matches an ID-1 card or a TD3 passport page within a
/// relative tolerance.
pub struct AspectRatioDetector {
    tolerance: f64,
}

impl AspectRatioDetector {
    pub fn new(tolerance: f64) -> Self {
        AspectRatioDetector {
            tolerance: tolerance.abs(),
        }
    }

    fn classify(&self, ratio: f64) -> Option<&'static str> {
        [("ID-1", ID1_RATIO), ("TD3", TD3_RATIO)]
            .into_iter()
            .find(|(_, target)| ((ratio - target) / target).abs() <= self.tolerance)
            .map(|(layout, _)| layout)
    }
}

#[async_trait]
impl Detector for AspectRatioDetector {
    fn name(&self) -> &str {
        "aspect_ratio"
    }

    async fn detect(&self, evidence: &DocumentEvidence) -> Result<Detection, DetectorError> {
        let info = match probe(evidence) {
            Ok(info) => info,
            Err(detection) => return Ok(detection),
        };

        if info.width == 0 || info.height == 0 {
            return Ok(Detection::fail(format!("degenerate image {}", info)));
        }

        let long_side = f64::from(info.width.max(info.height));
        let short_side = f64::from(info.width.min(info.height));
        let ratio = long_side / short_side;

        match self.classify(ratio) {
            Some(layout) => Ok(Detection::pass()
                .with_confidence(100)
                .with_evidence(format!("ratio {:.3} matches {}", ratio, layout))),
            None => Ok(Detection::fail(format!(
                "ratio {:.3} matches no known document layout",
                ratio
            ))),
        }
    }
}
