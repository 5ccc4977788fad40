//! Tesseract-backed [`OcrEngine`] (crate feature `tesseract`).
//!
//! A `LepTess` handle owns raw Tesseract state and cannot cross threads, so
//! each recognition builds its own handle inside `spawn_blocking`. The
//! constructor does one trial initialisation so a missing `eng.traineddata`
//! surfaces at engine construction rather than on the first page.

use super::{EncodedImage, OcrEngine};
use crate::config::OCR_LANGUAGE;
use crate::error::EngineError;
use async_trait::async_trait;
use leptess::LepTess;
use std::path::PathBuf;
use tracing::debug;

/// Local OCR through libtesseract, English only.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    tessdata_dir: Option<String>,
}

impl TesseractEngine {
    /// Verify Tesseract can load the English model. Blocking.
    pub fn new(tessdata_dir: Option<PathBuf>) -> Result<Self, EngineError> {
        let tessdata_dir = tessdata_dir.map(|p| p.to_string_lossy().into_owned());
        LepTess::new(tessdata_dir.as_deref(), OCR_LANGUAGE).map_err(|e| {
            EngineError::Unavailable(format!(
                "Tesseract could not load language '{OCR_LANGUAGE}': {e}. \
                 Install the English language data (e.g. 'apt install tesseract-ocr-eng')"
            ))
        })?;
        Ok(Self { tessdata_dir })
    }

    fn recognize_blocking(tessdata_dir: Option<&str>, image: &[u8]) -> Result<String, EngineError> {
        let mut lt = LepTess::new(tessdata_dir, OCR_LANGUAGE)
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;
        lt.set_image_from_mem(image)
            .map_err(|e| EngineError::Failed(format!("image could not be decoded: {e}")))?;
        lt.get_utf8_text()
            .map_err(|e| EngineError::Failed(format!("Tesseract returned invalid text: {e}")))
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(&self, image: EncodedImage) -> Result<String, EngineError> {
        let dir = self.tessdata_dir.clone();
        let text = tokio::task::spawn_blocking(move || {
            Self::recognize_blocking(dir.as_deref(), &image.bytes)
        })
        .await
        .map_err(|e| EngineError::Failed(format!("OCR task panicked: {e}")))??;
        debug!("Tesseract recognised {} chars", text.len());
        Ok(text)
    }
}
