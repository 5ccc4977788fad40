//! Text recognition over a single image.

use crate::engine::{EncodedImage, OcrEngine};
use crate::error::{EngineError, OcrError};
use std::sync::Arc;
use tracing::debug;

/// Runs an [`OcrEngine`] and trims what it returns.
///
/// An image with no text gives `""`, which is not an error.
#[derive(Clone)]
pub struct Recognizer {
    engine: Arc<dyn OcrEngine>,
}

impl Recognizer {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self { engine }
    }

    /// Recognise `image`. `page` is the 1-indexed PDF page, or None for an
    /// image document; it only feeds error messages.
    pub async fn recognize(
        &self,
        image: EncodedImage,
        page: Option<usize>,
    ) -> Result<String, OcrError> {
        let text = self.engine.recognize(image).await.map_err(|e| match e {
            EngineError::Unavailable(detail) => OcrError::EngineUnavailable {
                engine: "OCR".into(),
                detail,
            },
            other => OcrError::RecognitionFailed {
                page,
                detail: other.to_string(),
            },
        })?;
        let trimmed = text.trim().to_string();
        debug!(
            "{} recognised {} chars{}",
            self.engine.name(),
            trimmed.len(),
            page.map(|p| format!(" on page {p}")).unwrap_or_default()
        );
        Ok(trimmed)
    }
}
