//! Error types for the edgequake-ocr library.
//!
//! Three error types mark three boundaries:
//!
//! * [`OcrError`] — **Fatal**: the run cannot produce a trustworthy result
//!   (unsupported file, engine missing, a page failed to render or be
//!   recognised). A document is never reported as a success with pages
//!   missing, so any rasteriser or recogniser failure ends the run.
//!
//! * [`StructuringError`] — **Non-fatal**: the optional LLM structuring step
//!   failed or returned something that is not JSON. The pipeline keeps the
//!   normalised text (or the raw model reply) and records the error in
//!   [`crate::output::ExtractionOutput`].
//!
//! * [`EngineError`] — what engine implementations report. The pipeline
//!   stages translate it into an [`OcrError`] carrying page context.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-ocr library.
#[derive(Debug, Error)]
pub enum OcrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The document is neither an image nor a PDF.
    #[error("Unsupported file '{name}' ({media_type}): only images and PDF documents are accepted")]
    UnsupportedMediaType { name: String, media_type: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{name}' is corrupt: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The PDF or OCR engine could not be loaded or initialised.
    #[error("{engine} engine is unavailable: {detail}")]
    EngineUnavailable { engine: String, detail: String },

    /// The PDF engine failed while rendering a page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The OCR engine failed on a page (PDF) or on the whole image.
    #[error("Text recognition failed{}: {detail}", page_suffix(.page))]
    RecognitionFailed { page: Option<usize>, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn page_suffix(page: &Option<usize>) -> String {
    page.map(|p| format!(" on page {p}")).unwrap_or_default()
}

impl OcrError {
    /// True for failures of the PDF/OCR engines themselves, as opposed to
    /// problems with the input document.
    pub fn is_engine_failure(&self) -> bool {
        matches!(
            self,
            OcrError::EngineUnavailable { .. }
                | OcrError::RasterisationFailed { .. }
                | OcrError::RecognitionFailed { .. }
        )
    }
}

/// A non-fatal failure of the optional structuring step.
///
/// Stored in [`crate::output::ExtractionOutput::structuring_error`]; the run
/// still completes.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuringError {
    /// The model replied, but the reply is not JSON. The reply text is kept
    /// as [`crate::pipeline::structure::StructuredOutput::Raw`].
    #[error("structuring reply is not valid JSON: {detail}")]
    ParseFailure { detail: String },

    /// The provider call itself failed (network, HTTP status, auth).
    #[error("structuring request failed: {detail}")]
    Network { detail: String },

    /// The provider did not answer within the configured timeout.
    #[error("structuring request timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Errors reported by [`crate::engine::PdfEngine`] and
/// [`crate::engine::OcrEngine`] implementations.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine library or model could not be loaded.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// The input is not something the engine can open.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The PDF is encrypted; `supplied` tells whether a password was tried.
    #[error("document is password protected")]
    PasswordRequired { supplied: bool },

    /// The engine was working and then failed on this input.
    #[error("{0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognition_failure_mentions_page_when_known() {
        let e = OcrError::RecognitionFailed {
            page: Some(3),
            detail: "tesseract aborted".into(),
        };
        assert_eq!(
            e.to_string(),
            "Text recognition failed on page 3: tesseract aborted"
        );
    }

    #[test]
    fn recognition_failure_without_page() {
        let e = OcrError::RecognitionFailed {
            page: None,
            detail: "bad image".into(),
        };
        assert_eq!(e.to_string(), "Text recognition failed: bad image");
    }

    #[test]
    fn unsupported_media_type_display() {
        let e = OcrError::UnsupportedMediaType {
            name: "notes.txt".into(),
            media_type: "text/plain".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("notes.txt"), "got: {msg}");
        assert!(msg.contains("text/plain"), "got: {msg}");
    }

    #[test]
    fn engine_failures_are_classified() {
        assert!(OcrError::EngineUnavailable {
            engine: "PDF".into(),
            detail: "missing".into()
        }
        .is_engine_failure());
        assert!(!OcrError::InvalidConfig("x".into()).is_engine_failure());
    }

    #[test]
    fn structuring_error_serialises_with_kind_tag() {
        let e = StructuringError::Timeout { secs: 60 };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"], "timeout");
        assert_eq!(json["secs"], 60);
    }
}
