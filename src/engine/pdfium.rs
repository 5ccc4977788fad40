//! PDFium-backed [`PdfEngine`].
//!
//! `Pdfium` is not `Send`, so the engine keeps only the resolved library
//! location and binds a fresh instance inside each blocking call.

use super::{PdfEngine, RenderEvent, RenderOptions};
use crate::error::{EngineError, OcrError};
use image::DynamicImage;
use pdfium_fetch::{DownloadProgress, FetchOptions, LibrarySource};
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Renders PDF pages through a located PDFium library.
#[derive(Debug, Clone)]
pub struct PdfiumEngine {
    source: LibrarySource,
}

impl PdfiumEngine {
    /// Locate PDFium (env override, cache, system, then download when
    /// `allow_download`) and check that it binds.
    pub async fn initialize(
        allow_download: bool,
        on_download: Option<DownloadProgress<'_>>,
    ) -> Result<Self, OcrError> {
        let options = FetchOptions {
            allow_download,
            ..FetchOptions::default()
        };
        let source = pdfium_fetch::locate_or_fetch(&options, on_download)
            .await
            .map_err(|e| pdf_unavailable(e.to_string()))?;

        let check = source.clone();
        tokio::task::spawn_blocking(move || check.bind().map(|_| ()))
            .await
            .map_err(|e| OcrError::Internal(format!("PDFium bind task panicked: {e}")))?
            .map_err(|e| pdf_unavailable(e.to_string()))?;

        info!("PDF engine ready ({:?})", source);
        Ok(Self { source })
    }

    fn bind(&self) -> Result<Pdfium, EngineError> {
        self.source
            .bind()
            .map_err(|e| EngineError::Unavailable(e.to_string()))
    }
}

fn pdf_unavailable(detail: String) -> OcrError {
    OcrError::EngineUnavailable {
        engine: "PDF".into(),
        detail,
    }
}

fn load_error(e: PdfiumError, password: Option<&str>) -> EngineError {
    let text = format!("{e:?}");
    if text.contains("Password") || text.contains("password") {
        EngineError::PasswordRequired {
            supplied: password.is_some(),
        }
    } else {
        EngineError::InvalidDocument(text)
    }
}

/// Render one page of an open document.
fn render_loaded(
    document: &PdfDocument<'_>,
    index: usize,
    options: RenderOptions,
) -> Result<DynamicImage, EngineError> {
    let page = document
        .pages()
        .get(index as u16)
        .map_err(|e| EngineError::Failed(format!("{e:?}")))?;

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(options.scale)
        .set_maximum_width(options.max_pixels as i32)
        .set_maximum_height(options.max_pixels as i32);

    let image = page
        .render_with_config(&render_config)
        .map_err(|e| EngineError::Failed(format!("{e:?}")))?
        .as_image();

    debug!(
        "Rendered page {} → {}x{} px",
        index + 1,
        image.width(),
        image.height()
    );
    Ok(image)
}

impl PdfEngine for PdfiumEngine {
    fn page_count(&self, pdf: &[u8], password: Option<&str>) -> Result<usize, EngineError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, password)
            .map_err(|e| load_error(e, password))?;
        let count = document.pages().len() as usize;
        debug!("PDF loaded: {} pages", count);
        Ok(count)
    }

    fn render_page(
        &self,
        pdf: &[u8],
        password: Option<&str>,
        index: usize,
        options: RenderOptions,
    ) -> Result<DynamicImage, EngineError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, password)
            .map_err(|e| load_error(e, password))?;
        render_loaded(&document, index, options)
    }

    fn render_document(
        &self,
        pdf: &[u8],
        password: Option<&str>,
        options: RenderOptions,
        sink: &mut dyn FnMut(RenderEvent) -> bool,
    ) -> Result<(), EngineError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, password)
            .map_err(|e| load_error(e, password))?;
        let pages = document.pages().len() as usize;
        debug!("PDF loaded: {} pages", pages);

        if !sink(RenderEvent::Opened { pages }) {
            return Ok(());
        }
        for index in 0..pages {
            if !sink(RenderEvent::Rendering { index }) {
                return Ok(());
            }
            let image = render_loaded(&document, index, options)?;
            if !sink(RenderEvent::Rendered { index, image }) {
                return Ok(());
            }
        }
        Ok(())
    }
}
