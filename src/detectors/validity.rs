//! Validity checks: is the document current as of the reference date.

use async_trait::async_trait;

use super::structure::parse_date;
use super::{Detection, Detector, DetectorError};
use crate::evidence::DocumentEvidence;

/// Expiry date is on or after the reference date.
pub struct NotExpiredDetector;

#[async_trait]
impl Detector for NotExpiredDetector {
    fn name(&self) -> &str {
        "not_expired"
    }

    async fn detect(&self, evidence: &DocumentEvidence) -> Result<Detection, DetectorError> {
        let Some(raw) = evidence.field("date_of_expiry") else {
            return Ok(Detection::fail("expiry date not extracted"));
        };
        let Some(expiry) = parse_date(raw) else {
            return Ok(Detection::fail(format!("unreadable expiry date '{}'", raw)));
        };

        if expiry >= evidence.as_of() {
            Ok(Detection::pass()
                .with_confidence(100)
                .with_evidence(format!("valid until {}", expiry)))
        } else {
            Ok(Detection::fail(format!("expired on {}", expiry)))
        }
    }
}

/// Issue date is not in the future and precedes the expiry date.
pub struct IssueDateDetector;

#[async_trait]
impl Detector for IssueDateDetector {
    fn name(&self) -> &str {
        "issue_date_consistent"
    }

    async fn detect(&self, evidence: &DocumentEvidence) -> Result<Detection, DetectorError> {
        let Some(raw) = evidence.field("date_of_issue") else {
            return Ok(Detection::fail("issue date not extracted"));
        };
        let Some(issued) = parse_date(raw) else {
            return Ok(Detection::fail(format!("unreadable issue date '{}'", raw)));
        };

        if issued > evidence.as_of() {
            return Ok(Detection::fail(format!("issued in the future ({})", issued)));
        }

        if let Some(expiry) = evidence.field("date_of_expiry").and_then(parse_date) {
            if issued >= expiry {
                return Ok(Detection::fail(format!(
                    "issued {} on or after expiry {}",
                    issued, expiry
                )));
            }
        }

        Ok(Detection::pass()
            .with_confidence(100)
            .with_evidence(format!("issued {}", issued)))
    }
}
