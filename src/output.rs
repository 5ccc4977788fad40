//! Extraction results and the downloadable JSON payload.

use crate::document::{DocumentInfo, DocumentKind};
use crate::error::{OcrError, StructuringError};
use crate::pipeline::structure::StructuredOutput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Per-page recognition result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number (1 for an image document).
    pub page_number: usize,
    /// Rendered size; None for image documents, which are not re-rendered.
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Characters recognised after trimming. Zero means the page was skipped.
    pub chars: usize,
    pub ocr_duration_ms: u64,
}

/// Aggregate statistics for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub page_count: usize,
    pub pages_with_text: usize,
    pub empty_pages: usize,
    pub raw_chars: usize,
    pub text_chars: usize,
    pub render_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub structuring_duration_ms: Option<u64>,
    pub total_duration_ms: u64,
}

/// Everything a successful run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub document: DocumentInfo,
    /// Non-empty page texts joined by `"\n\n"`.
    pub raw_text: String,
    /// Normalised single-line text.
    pub text: String,
    pub pages: Vec<PageResult>,
    pub structured: Option<StructuredOutput>,
    /// Why structuring fell back, when it did.
    pub structuring_error: Option<StructuringError>,
    pub stats: ExtractionStats,
    pub processed_at: DateTime<Utc>,
}

/// `pageCount` in the payload: a number, or the literal `"multiple"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCount {
    Count(usize),
    Multiple,
}

impl Serialize for PageCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageCount::Count(n) => serializer.serialize_u64(*n as u64),
            PageCount::Multiple => serializer.serialize_str("multiple"),
        }
    }
}

impl<'de> Deserialize<'de> for PageCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Count(usize),
            Label(String),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Count(n) => Ok(PageCount::Count(n)),
            Repr::Label(s) if s == "multiple" => Ok(PageCount::Multiple),
            Repr::Label(s) => Err(serde::de::Error::custom(format!(
                "pageCount must be a number or \"multiple\", got \"{s}\""
            ))),
        }
    }
}

/// The pre-structuring download payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputPayload {
    pub filename: String,
    pub file_type: String,
    pub processed_at: DateTime<Utc>,
    pub page_count: PageCount,
    pub extracted_text: String,
}

impl ExtractionOutput {
    /// Payload built from the normalised text alone.
    pub fn baseline_payload(&self) -> OutputPayload {
        let page_count = match self.document.kind {
            DocumentKind::Image => 1,
            DocumentKind::Pdf => self.stats.page_count,
        };
        OutputPayload {
            filename: self.document.name.clone(),
            file_type: self.document.media_type.clone(),
            processed_at: self.processed_at,
            page_count: PageCount::Count(page_count),
            extracted_text: self.text.clone(),
        }
    }

    /// The primary download: the structured value when structuring produced
    /// one (raw replies as a JSON string), otherwise [`Self::baseline_payload`].
    pub fn payload(&self) -> serde_json::Value {
        match &self.structured {
            Some(structured) => structured.to_json(),
            None => serde_json::to_value(self.baseline_payload()).unwrap_or_default(),
        }
    }

    /// `ocr-output-<unix-ms>.json`, stamped with the processing time.
    pub fn download_file_name(&self) -> String {
        format!("ocr-output-{}.json", self.processed_at.timestamp_millis())
    }

    /// Write [`Self::payload`] into `dir` under [`Self::download_file_name`].
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf, OcrError> {
        let path = dir.join(self.download_file_name());
        self.write_to_file(&path)?;
        Ok(path)
    }

    /// Write [`Self::payload`] as pretty JSON to `path`.
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// a reader never sees a half-written payload.
    pub fn write_to_file(&self, path: &Path) -> Result<(), OcrError> {
        let write_err = |source: std::io::Error| OcrError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(write_err)?;

        let json = serde_json::to_string_pretty(&self.payload())
            .map_err(|e| OcrError::Internal(format!("payload serialisation failed: {e}")))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.write_all(b"\n").map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;

        info!("Wrote {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn output(kind: DocumentKind, structured: Option<StructuredOutput>) -> ExtractionOutput {
        let (name, media_type) = match kind {
            DocumentKind::Image => ("receipt.jpg", "image/jpeg"),
            DocumentKind::Pdf => ("invoice.pdf", "application/pdf"),
        };
        ExtractionOutput {
            document: DocumentInfo {
                name: name.into(),
                media_type: media_type.into(),
                kind,
                size: 1234,
            },
            raw_text: "Total\n\n42".into(),
            text: "Total 42".into(),
            pages: Vec::new(),
            structured,
            structuring_error: None,
            stats: ExtractionStats {
                page_count: 3,
                ..Default::default()
            },
            processed_at: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
        }
    }

    #[test]
    fn baseline_payload_shape() {
        let out = output(DocumentKind::Pdf, None);
        let v = out.payload();
        assert_eq!(v["filename"], "invoice.pdf");
        assert_eq!(v["fileType"], "application/pdf");
        assert_eq!(v["pageCount"], 3);
        assert_eq!(v["extractedText"], "Total 42");
        assert!(v["processedAt"].as_str().unwrap().starts_with("2023-11-14T22:13:20.123"));
    }

    #[test]
    fn image_counts_as_one_page() {
        let out = output(DocumentKind::Image, None);
        assert_eq!(out.baseline_payload().page_count, PageCount::Count(1));
    }

    #[test]
    fn structured_value_is_primary() {
        let out = output(
            DocumentKind::Pdf,
            Some(StructuredOutput::Parsed { value: json!({"total": 42}) }),
        );
        assert_eq!(out.payload(), json!({"total": 42}));

        let raw = StructuredOutput::Raw {
            text: "total is 42".into(),
        };
        let out = output(DocumentKind::Pdf, Some(raw));
        assert_eq!(out.payload(), json!("total is 42"));
    }

    #[test]
    fn page_count_accepts_multiple_label() {
        let p: PageCount = serde_json::from_value(json!("multiple")).unwrap();
        assert_eq!(p, PageCount::Multiple);
        assert_eq!(serde_json::to_value(PageCount::Multiple).unwrap(), json!("multiple"));
        assert!(serde_json::from_value::<PageCount>(json!("several")).is_err());
    }

    #[test]
    fn download_name_uses_unix_millis() {
        let out = output(DocumentKind::Pdf, None);
        assert_eq!(out.download_file_name(), "ocr-output-1700000000123.json");
    }

    #[test]
    fn write_to_dir_persists_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let out = output(DocumentKind::Pdf, None);
        let path = out.write_to_dir(dir.path()).unwrap();

        assert_eq!(path.file_name().unwrap(), "ocr-output-1700000000123.json");
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\n  \"extractedText\": \"Total 42\""));
        let parsed: OutputPayload = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, out.baseline_payload());
    }
}
