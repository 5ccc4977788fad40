//! Engine seams: the PDF rasteriser backend and the OCR backend.
//!
//! The pipeline never loads an engine on its own. Engines are built once by
//! [`initialize_pdf_engine`] / [`initialize_ocr_engine`] (or supplied by the
//! caller, e.g. test doubles) and injected into
//! [`crate::extract::Extractor`]. If construction succeeded the engine is
//! available; there is no lazily-populated global to race on.
//!
//! ```text
//! PdfEngine  (blocking)  ──▶ DynamicImage per page
//! OcrEngine  (async)     ──▶ String per image
//! ```

pub mod pdfium;
#[cfg(feature = "tesseract")]
pub mod tesseract;
pub mod vision;

use crate::config::{ExtractionConfig, OcrBackend};
use crate::error::{EngineError, OcrError};
use async_trait::async_trait;
use image::DynamicImage;
use std::sync::Arc;

/// Rendering parameters handed to [`PdfEngine::render_page`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Scale relative to the page's native size.
    pub scale: f32,
    /// Cap on either edge, in pixels.
    pub max_pixels: u32,
}

impl RenderOptions {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            scale: config.render_scale,
            max_pixels: config.max_rendered_pixels,
        }
    }
}

/// A paginated-document renderer.
///
/// Calls block (PDF engines are CPU-bound C libraries); the pipeline invokes
/// them through `spawn_blocking`, one page at a time.
pub trait PdfEngine: Send + Sync {
    /// Number of pages in `pdf`.
    fn page_count(&self, pdf: &[u8], password: Option<&str>) -> Result<usize, EngineError>;

    /// Render the 0-based page `index` of `pdf`.
    fn render_page(
        &self,
        pdf: &[u8],
        password: Option<&str>,
        index: usize,
        options: RenderOptions,
    ) -> Result<DynamicImage, EngineError>;

    /// Open `pdf` once and render every page in order, reporting each step
    /// to `sink`. Rendering stops early, without error, when `sink` returns
    /// false.
    ///
    /// The provided implementation goes through [`Self::page_count`] and
    /// [`Self::render_page`]; engines with a real open-document handle
    /// override it to parse the file a single time.
    fn render_document(
        &self,
        pdf: &[u8],
        password: Option<&str>,
        options: RenderOptions,
        sink: &mut dyn FnMut(RenderEvent) -> bool,
    ) -> Result<(), EngineError> {
        let pages = self.page_count(pdf, password)?;
        if !sink(RenderEvent::Opened { pages }) {
            return Ok(());
        }
        for index in 0..pages {
            if !sink(RenderEvent::Rendering { index }) {
                return Ok(());
            }
            let image = self.render_page(pdf, password, index, options)?;
            if !sink(RenderEvent::Rendered { index, image }) {
                return Ok(());
            }
        }
        Ok(())
    }
}

/// One step of [`PdfEngine::render_document`].
#[derive(Debug)]
pub enum RenderEvent {
    /// The document opened with `pages` pages.
    Opened { pages: usize },
    /// The 0-based page `index` is about to be rendered.
    Rendering { index: usize },
    Rendered { index: usize, image: DynamicImage },
}

/// An encoded raster image (PNG, JPEG, …) ready for OCR.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Arc<[u8]>,
    pub media_type: String,
}

impl EncodedImage {
    pub fn png(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: "image/png".to_string(),
        }
    }
}

/// A text recogniser.
///
/// Implementations return whatever the engine produced; trimming and page
/// bookkeeping happen in [`crate::pipeline::recognize::Recognizer`].
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short human-readable engine name for logs and errors.
    fn name(&self) -> &str;

    async fn recognize(&self, image: EncodedImage) -> Result<String, EngineError>;
}

/// Locate PDFium (downloading the pinned build if the config allows) and
/// verify it binds.
pub async fn initialize_pdf_engine(
    config: &ExtractionConfig,
    on_download: Option<pdfium_fetch::DownloadProgress<'_>>,
) -> Result<Arc<dyn PdfEngine>, OcrError> {
    let engine = pdfium::PdfiumEngine::initialize(config.allow_engine_download, on_download).await?;
    Ok(Arc::new(engine))
}

/// Build the OCR engine selected by `config.ocr_backend`.
pub async fn initialize_ocr_engine(
    config: &ExtractionConfig,
) -> Result<Arc<dyn OcrEngine>, OcrError> {
    match &config.ocr_backend {
        #[cfg(feature = "tesseract")]
        OcrBackend::Tesseract { tessdata_dir } => {
            let dir = tessdata_dir.clone();
            let engine = tokio::task::spawn_blocking(move || tesseract::TesseractEngine::new(dir))
                .await
                .map_err(|e| OcrError::Internal(format!("Tesseract init task panicked: {e}")))?
                .map_err(|e| unavailable("OCR", e))?;
            Ok(Arc::new(engine))
        }
        #[cfg(not(feature = "tesseract"))]
        OcrBackend::Tesseract { .. } => Err(OcrError::EngineUnavailable {
            engine: "OCR".into(),
            detail: "this build has no Tesseract support; rebuild with --features tesseract \
                     or choose the vision backend"
                .into(),
        }),
        OcrBackend::Vision {
            provider_name,
            model,
        } => {
            let engine = vision::VisionEngine::from_config(
                provider_name.as_deref(),
                model.as_deref(),
                config,
            )?;
            Ok(Arc::new(engine))
        }
    }
}

/// Map an engine construction failure to [`OcrError::EngineUnavailable`].
pub(crate) fn unavailable(engine: &str, e: EngineError) -> OcrError {
    OcrError::EngineUnavailable {
        engine: engine.to_string(),
        detail: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_options_follow_config() {
        let config = ExtractionConfig::builder()
            .render_scale(3.0)
            .max_rendered_pixels(2000)
            .build()
            .unwrap();
        let opts = RenderOptions::from_config(&config);
        assert_eq!(opts.scale, 3.0);
        assert_eq!(opts.max_pixels, 2000);
    }

    #[cfg(not(feature = "tesseract"))]
    #[tokio::test]
    async fn tesseract_backend_without_feature_is_unavailable() {
        let err = match initialize_ocr_engine(&ExtractionConfig::default()).await {
            Ok(_) => panic!("expected EngineUnavailable"),
            Err(e) => e,
        };
        assert!(matches!(err, OcrError::EngineUnavailable { .. }));
    }
}
