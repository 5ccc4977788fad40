//! The input document: bytes plus what kind of thing they are.
//!
//! A [`Document`] is immutable. Choosing another file means building another
//! `Document`; nothing is patched in place. Construction is the only gate on
//! media type, so anything that holds a `Document` can rely on it being an
//! image or a PDF.

use crate::error::OcrError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Media kinds the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Image,
    Pdf,
}

impl DocumentKind {
    /// Classify a declared media type. Parameters (`; charset=…`) and case
    /// are ignored. Returns None for anything that is not `image/*` or
    /// `application/pdf`.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence == "application/pdf" {
            Some(DocumentKind::Pdf)
        } else if essence.starts_with("image/") && essence.len() > "image/".len() {
            Some(DocumentKind::Image)
        } else {
            None
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Image => f.write_str("image"),
            DocumentKind::Pdf => f.write_str("pdf"),
        }
    }
}

/// An image or PDF selected for extraction.
#[derive(Clone)]
pub struct Document {
    name: String,
    media_type: String,
    kind: DocumentKind,
    bytes: Arc<[u8]>,
}

impl Document {
    /// Build a document from bytes and a declared media type.
    ///
    /// # Errors
    /// [`OcrError::UnsupportedMediaType`] unless the type is `image/*` or
    /// `application/pdf`.
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<Self, OcrError> {
        let name = name.into();
        let media_type = media_type.into();
        let kind = DocumentKind::from_media_type(&media_type).ok_or_else(|| {
            OcrError::UnsupportedMediaType {
                name: name.clone(),
                media_type: media_type.clone(),
            }
        })?;
        Ok(Self {
            name,
            media_type,
            kind,
            bytes: bytes.into(),
        })
    }

    /// Build a document, working out the media type from the content's
    /// magic bytes and falling back to the file extension.
    pub fn sniff(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Result<Self, OcrError> {
        let name = name.into();
        let bytes = bytes.into();
        let media_type = sniff_media_type(&name, &bytes);
        Self::new(name, media_type, bytes)
    }

    /// Display name (file name or last URL segment).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared or detected media type, e.g. `image/png`.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Size of the document in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap handle to the bytes for moving into blocking tasks.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// Serialisable summary without the content.
    pub fn info(&self) -> DocumentInfo {
        DocumentInfo {
            name: self.name.clone(),
            media_type: self.media_type.clone(),
            kind: self.kind,
            size: self.size(),
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("kind", &self.kind)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Document metadata carried into the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub name: String,
    pub media_type: String,
    pub kind: DocumentKind,
    pub size: u64,
}

/// Best guess at a media type: `%PDF` header, then image magic numbers, then
/// the file extension.
pub fn sniff_media_type(name: &str, bytes: &[u8]) -> String {
    if bytes.starts_with(b"%PDF") {
        return "application/pdf".to_string();
    }
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type().to_string();
    }
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
