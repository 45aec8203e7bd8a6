//! Document evidence handed to detectors.
//!
//! Evidence is the raw encoded image plus whatever text fields an upstream
//! OCR step extracted from it. Pixel dimensions are probed lazily from the
//! image header; full decoding is left to detectors that need it.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use chrono::{NaiveDate, Utc};
use image::{ImageFormat, ImageReader};
use thiserror::Error;

/// Reasons the evidence itself cannot be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvidenceError {
    /// No bytes were supplied
    #[error("document is empty")]
    Empty,
    /// The byte stream does not start with a known image signature
    #[error("unrecognized image signature")]
    UnrecognizedFormat,
    /// The header could not be decoded
    #[error("cannot decode image header: {0}")]
    Decode(String),
    /// The file could not be read
    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },
}

/// Header-level facts about the encoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for ImageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}x{}", self.format, self.width, self.height)
    }
}

/// A submitted document: encoded bytes, extracted fields and the reference
/// date used by validity checks.
#[derive(Debug, Clone)]
pub struct DocumentEvidence {
    label: Option<String>,
    bytes: Arc<[u8]>,
    fields: BTreeMap<String, String>,
    as_of: NaiveDate,
    info: OnceLock<Result<ImageInfo, EvidenceError>>,
}

impl DocumentEvidence {
    /// Wrap raw encoded bytes. The reference date defaults to today (UTC).
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        DocumentEvidence {
            label: None,
            bytes: bytes.into(),
            fields: BTreeMap::new(),
            as_of: Utc::now().date_naive(),
            info: OnceLock::new(),
        }
    }

    /// Read an image file from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, EvidenceError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| EvidenceError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());

        let mut evidence = Self::from_bytes(bytes);
        evidence.label = label;
        Ok(evidence)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attach one extracted text field (e.g. `date_of_expiry`, `mrz_line2`).
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_fields<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Pin the date validity checks compare against.
    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = as_of;
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Raw encoded size in bytes.
    pub fn encoded_size(&self) -> usize {
        self.bytes.len()
    }

    /// Extracted field value, `None` when absent or blank.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// Probe format and pixel dimensions from the header. The result is
    /// computed once and shared by every detector in the run.
    pub fn probe(&self) -> Result<ImageInfo, EvidenceError> {
        self.info.get_or_init(|| probe_header(&self.bytes)).clone()
    }
}

fn probe_header(bytes: &[u8]) -> Result<ImageInfo, EvidenceError> {
    if bytes.is_empty() {
        return Err(EvidenceError::Empty);
    }

    let format = image::guess_format(bytes).map_err(|_| EvidenceError::UnrecognizedFormat)?;

    let (width, height) = ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(|e| EvidenceError::Decode(e.to_string()))?;

    Ok(ImageInfo {
        format,
        width,
        height,
    })
}
