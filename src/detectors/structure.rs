//! Data-structure checks over extracted fields.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{Detection, Detector, DetectorError};
use crate::evidence::DocumentEvidence;

/// Field holding the second line of a TD3 machine readable zone.
pub const MRZ_LINE2_FIELD: &str = "mrz_line2";

/// Date fields checked for ISO 8601 (`YYYY-MM-DD`) syntax.
pub const DATE_FIELDS: [&str; 3] = ["date_of_birth", "date_of_issue", "date_of_expiry"];

pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// All configured fields are present and non-blank.
pub struct RequiredFieldsDetector {
    fields: Vec<String>,
}

impl RequiredFieldsDetector {
    pub fn new(fields: Vec<String>) -> Self {
        RequiredFieldsDetector { fields }
    }
}

#[async_trait]
impl Detector for RequiredFieldsDetector {
    fn name(&self) -> &str {
        "required_fields"
    }

    async fn detect(&self, evidence: &DocumentEvidence) -> Result<Detection, DetectorError> {
        let missing: Vec<&str> = self
            .fields
            .iter()
            .map(String::as_str)
            .filter(|field| evidence.field(field).is_none())
            .collect();

        if missing.is_empty() {
            Ok(Detection::pass()
                .with_confidence(100)
                .with_evidence(format!("{} fields present", self.fields.len())))
        } else {
            Ok(Detection::fail(format!("missing fields: {}", missing.join(", "))))
        }
    }
}

/// ICAO 9303 character value: digits as-is, letters A-Z as 10-35, filler as 0.
fn mrz_char_value(c: char) -> Option<u32> {
    match c {
        '0'..='9' => c.to_digit(10),
        'A'..='Z' => Some(c as u32 - 'A' as u32 + 10),
        '<' => Some(0),
        _ => None,
    }
}

/// 7-3-1 weighted check digit.
pub fn mrz_check_digit(data: &str) -> Option<u32> {
    const WEIGHTS: [u32; 3] = [7, 3, 1];
    data.chars()
        .enumerate()
        .try_fold(0u32, |sum, (i, c)| {
            mrz_char_value(c).map(|v| sum + v * WEIGHTS[i % 3])
        })
        .map(|sum| sum % 10)
}

fn digit_matches(data: &str, check: char) -> bool {
    // An all-filler optional data field may carry a filler check digit.
    if check == '<' {
        return data.chars().all(|c| c == '<');
    }
    match (mrz_check_digit(data), check.to_digit(10)) {
        (Some(expected), Some(actual)) => expected == actual,
        _ => false,
    }
}

/// Verify the five check digits of TD3 line 2.
///
/// Layout (0-based): document number 0..9 / 9, birth date 13..19 / 19,
/// expiry 21..27 / 27, optional data 28..42 / 42, composite over
/// 0..10 + 13..20 + 21..43 / 43.
pub fn verify_td3_line2(line: &str) -> Result<Vec<&'static str>, String> {
    if !line.is_ascii() {
        return Err("MRZ contains non-ASCII characters".to_string());
    }
    if line.len() != 44 {
        return Err(format!("unexpected MRZ line length {}", line.len()));
    }

    let at = |i: usize| line.as_bytes()[i] as char;
    let composite = format!("{}{}{}", &line[0..10], &line[13..20], &line[21..43]);

    let checks: [(&'static str, &str, char); 5] = [
        ("document number", &line[0..9], at(9)),
        ("date of birth", &line[13..19], at(19)),
        ("date of expiry", &line[21..27], at(27)),
        ("optional data", &line[28..42], at(42)),
        ("composite", composite.as_str(), at(43)),
    ];

    Ok(checks
        .iter()
        .filter(|(_, data, check)| !digit_matches(data, *check))
        .map(|(label, _, _)| *label)
        .collect())
}

/// Check digits on the machine readable zone are internally consistent.
pub struct MrzCheckDigitDetector;

#[async_trait]
impl Detector for MrzCheckDigitDetector {
    fn name(&self) -> &str {
        "mrz_check_digits"
    }

    async fn detect(&self, evidence: &DocumentEvidence) -> Result<Detection, DetectorError> {
        let Some(line) = evidence.field(MRZ_LINE2_FIELD) else {
            return Ok(Detection::fail("no machine readable zone extracted"));
        };

        match verify_td3_line2(line) {
            Ok(failed) if failed.is_empty() => Ok(Detection::pass()
                .with_confidence(100)
                .with_evidence("all 5 check digits valid")),
            Ok(failed) => Ok(Detection::fail(format!(
                "invalid check digits: {}",
                failed.join(", ")
            ))),
            Err(reason) => Ok(Detection::fail(reason)),
        }
    }
}

/// Date fields that are present parse as ISO dates; at least one is present.
pub struct DateFieldsDetector;

#[async_trait]
impl Detector for DateFieldsDetector {
    fn name(&self) -> &str {
        "date_fields"
    }

    async fn detect(&self, evidence: &DocumentEvidence) -> Result<Detection, DetectorError> {
        let present: Vec<(&str, &str)> = DATE_FIELDS
            .iter()
            .filter_map(|key| evidence.field(key).map(|value| (*key, value)))
            .collect();

        if present.is_empty() {
            return Ok(Detection::fail("no date fields extracted"));
        }

        let malformed: Vec<&str> = present
            .iter()
            .filter(|(_, value)| parse_date(value).is_none())
            .map(|(key, _)| *key)
            .collect();

        if malformed.is_empty() {
            Ok(Detection::pass()
                .with_confidence(100)
                .with_evidence(format!("{} date fields well-formed", present.len())))
        } else {
            Ok(Detection::fail(format!("malformed dates: {}", malformed.join(", "))))
        }
    }
}
