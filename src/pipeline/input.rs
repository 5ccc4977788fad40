//! Input resolution: turn a user-supplied path or URL into a [`Document`].
//!
//! Both engines work from memory (pdfium opens byte slices, Tesseract reads
//! encoded images from a buffer), so downloads are never spooled to disk.
//! The media type comes from the content itself where possible; a server's
//! `Content-Type` is trusted only when the bytes give no answer.

use crate::document::{sniff_media_type, Document, DocumentKind};
use crate::error::OcrError;
use std::path::Path;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a [`Document`].
///
/// URLs are downloaded with `timeout_secs` as the whole-request timeout;
/// anything else is treated as a local path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<Document, OcrError> {
    if input.trim().is_empty() {
        return Err(OcrError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

async fn read_local(path: &Path) -> Result<Document, OcrError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => OcrError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => OcrError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!("Read local document {} ({} bytes)", path.display(), bytes.len());
    Document::sniff(name, bytes)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Document, OcrError> {
    info!("Downloading document from: {}", url);

    let failed = |reason: String| OcrError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            OcrError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let declared = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    let name = filename_from_url(url);

    let sniffed = sniff_media_type(&name, &bytes);
    let media_type = match declared {
        Some(d) if DocumentKind::from_media_type(&sniffed).is_none() => d,
        _ => sniffed,
    };

    info!("Downloaded {} ({} bytes, {})", name, bytes.len(), media_type);
    Document::new(name, media_type, bytes.to_vec())
}

/// Last non-empty path segment of the URL, or `"download"`.
pub fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()).map(str::to_string))
        })
        .unwrap_or_else(|| "download".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/scan.pdf"));
        assert!(is_url("http://example.com/scan.png"));
        assert!(!is_url("/tmp/scan.pdf"));
        assert!(!is_url("scan.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_from_url_uses_last_segment() {
        assert_eq!(filename_from_url("https://a.example/x/invoice.pdf"), "invoice.pdf");
        assert_eq!(filename_from_url("https://a.example/x/receipt/"), "receipt");
        assert_eq!(filename_from_url("https://a.example"), "download");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.png", 5).await.unwrap_err();
        assert!(matches!(err, OcrError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn empty_input_is_invalid() {
        let err = resolve_input("  ", 5).await.unwrap_err();
        assert!(matches!(err, OcrError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn local_pdf_is_sniffed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statement");
        std::fs::write(&path, b"%PDF-1.4\n%%EOF").unwrap();

        let doc = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(doc.kind(), DocumentKind::Pdf);
        assert_eq!(doc.name(), "statement");
        assert_eq!(doc.size(), 14);
    }

    #[tokio::test]
    async fn local_text_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"just words").unwrap();

        let err = resolve_input(path.to_str().unwrap(), 5).await.unwrap_err();
        assert!(matches!(err, OcrError::UnsupportedMediaType { .. }));
    }
}
