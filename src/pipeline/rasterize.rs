//! PDF rasterisation: render every page to a PNG for OCR.
//!
//! PDF engines are CPU-bound C libraries, so the whole document is rendered
//! inside one `tokio::task::spawn_blocking` call that opens the file once.
//! Pages are rendered strictly one after another, in page order, and each
//! step is passed back to the async side over a channel for progress
//! reporting.
//!
//! ## All or nothing
//!
//! A document is never handed on with pages missing: if the engine cannot
//! open the file or any single page fails to render or encode, the whole
//! call fails and the pages rendered so far are dropped.

use crate::document::Document;
use crate::engine::{EncodedImage, PdfEngine, RenderEvent, RenderOptions};
use crate::error::{EngineError, OcrError};
use crate::pipeline::encode::encode_png;
use crate::progress::ExtractionProgressCallback;
use crate::run::RunStatus;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// One rendered PDF page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-indexed source page number.
    pub page_number: usize,
    pub width: u32,
    pub height: u32,
    pub image: EncodedImage,
}

/// Renders the pages of a PDF [`Document`] through a [`PdfEngine`].
#[derive(Clone)]
pub struct Rasterizer {
    engine: Arc<dyn PdfEngine>,
    options: RenderOptions,
}

/// Messages from the blocking render task.
enum Step {
    Opened(usize),
    Rendering(usize),
    Page(PageImage),
    EncodeFailed { page: usize, detail: String },
}

impl Rasterizer {
    pub fn new(engine: Arc<dyn PdfEngine>, options: RenderOptions) -> Self {
        Self { engine, options }
    }

    /// Render every page of `doc`, reporting
    /// `"Converting PDF page {i} of {N}..."` before each one.
    ///
    /// A PDF with zero pages yields an empty list.
    pub async fn rasterize(
        &self,
        doc: &Document,
        password: Option<&str>,
        progress: &dyn ExtractionProgressCallback,
    ) -> Result<Vec<PageImage>, OcrError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = {
            let engine = Arc::clone(&self.engine);
            let bytes = doc.shared_bytes();
            let pwd = password.map(str::to_string);
            let options = self.options;
            tokio::task::spawn_blocking(move || {
                let mut sink = |event: RenderEvent| {
                    let step = match event {
                        RenderEvent::Opened { pages } => Step::Opened(pages),
                        RenderEvent::Rendering { index } => Step::Rendering(index + 1),
                        RenderEvent::Rendered { index, image } => {
                            match encode_page(index, &image) {
                                Ok(page) => Step::Page(page),
                                Err(detail) => {
                                    let page = index + 1;
                                    let _ = tx.send(Step::EncodeFailed { page, detail });
                                    return false;
                                }
                            }
                        }
                    };
                    tx.send(step).is_ok()
                };
                engine.render_document(&bytes, pwd.as_deref(), options, &mut sink)
            })
        };

        let mut total = 0;
        let mut current = None;
        let mut pages = Vec::new();
        let mut encode_failure = None;
        while let Some(step) = rx.recv().await {
            match step {
                Step::Opened(n) => {
                    info!("PDF '{}' has {} pages", doc.name(), n);
                    total = n;
                    pages.reserve(n);
                }
                Step::Rendering(page_number) => {
                    current = Some(page_number);
                    progress.on_status(
                        RunStatus::Converting,
                        &format!("Converting PDF page {page_number} of {total}..."),
                    );
                }
                Step::Page(page) => {
                    debug!(
                        "Rendered page {}/{} → {}x{} px",
                        page.page_number, total, page.width, page.height
                    );
                    pages.push(page);
                }
                Step::EncodeFailed { page, detail } => {
                    encode_failure = Some(OcrError::RasterisationFailed {
                        page,
                        detail: format!("PNG encoding failed: {detail}"),
                    });
                }
            }
        }

        task.await
            .map_err(|e| OcrError::Internal(format!("Render task panicked: {e}")))?
            .map_err(|e| match current {
                None => document_error(doc, e),
                Some(page) => page_error(doc, page, e),
            })?;

        match encode_failure {
            Some(e) => Err(e),
            None => Ok(pages),
        }
    }
}

fn encode_page(index: usize, img: &image::DynamicImage) -> Result<PageImage, String> {
    let image = encode_png(img).map_err(|e| e.to_string())?;
    Ok(PageImage {
        page_number: index + 1,
        width: img.width(),
        height: img.height(),
        image,
    })
}

/// Map an error raised while opening the document.
fn document_error(doc: &Document, e: EngineError) -> OcrError {
    let name = doc.name().to_string();
    match e {
        EngineError::Unavailable(detail) => OcrError::EngineUnavailable {
            engine: "PDF".into(),
            detail,
        },
        EngineError::PasswordRequired { supplied: false } => OcrError::PasswordRequired { name },
        EngineError::PasswordRequired { supplied: true } => OcrError::WrongPassword { name },
        EngineError::InvalidDocument(detail) | EngineError::Failed(detail) => {
            OcrError::CorruptPdf { name, detail }
        }
    }
}

/// Map an error raised while rendering `page`.
fn page_error(doc: &Document, page: usize, e: EngineError) -> OcrError {
    match e {
        EngineError::Failed(detail) => OcrError::RasterisationFailed { page, detail },
        other => document_error(doc, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgressCallback;
    use image::{DynamicImage, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FixedPages {
        pages: usize,
        fail_on: Option<usize>,
    }

    impl PdfEngine for FixedPages {
        fn page_count(&self, _pdf: &[u8], _password: Option<&str>) -> Result<usize, EngineError> {
            Ok(self.pages)
        }

        fn render_page(
            &self,
            _pdf: &[u8],
            _password: Option<&str>,
            index: usize,
            _options: RenderOptions,
        ) -> Result<DynamicImage, EngineError> {
            if self.fail_on == Some(index) {
                return Err(EngineError::Failed("bitmap allocation failed".into()));
            }
            Ok(DynamicImage::ImageRgb8(RgbImage::new(4 + index as u32, 3)))
        }
    }

    struct Locked;

    impl PdfEngine for Locked {
        fn page_count(&self, _pdf: &[u8], password: Option<&str>) -> Result<usize, EngineError> {
            Err(EngineError::PasswordRequired {
                supplied: password.is_some(),
            })
        }

        fn render_page(
            &self,
            _pdf: &[u8],
            _password: Option<&str>,
            _index: usize,
            _options: RenderOptions,
        ) -> Result<DynamicImage, EngineError> {
            unreachable!("page_count fails first")
        }
    }

    /// Engine with a real open-document step; per-page entry points are
    /// never used.
    struct OpenOnce {
        opens: AtomicUsize,
    }

    impl PdfEngine for OpenOnce {
        fn page_count(&self, _pdf: &[u8], _password: Option<&str>) -> Result<usize, EngineError> {
            unreachable!("rasterize renders through render_document")
        }

        fn render_page(
            &self,
            _pdf: &[u8],
            _password: Option<&str>,
            _index: usize,
            _options: RenderOptions,
        ) -> Result<DynamicImage, EngineError> {
            unreachable!("rasterize renders through render_document")
        }

        fn render_document(
            &self,
            _pdf: &[u8],
            _password: Option<&str>,
            _options: RenderOptions,
            sink: &mut dyn FnMut(RenderEvent) -> bool,
        ) -> Result<(), EngineError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            sink(RenderEvent::Opened { pages: 3 });
            for index in 0..3 {
                sink(RenderEvent::Rendering { index });
                let image = DynamicImage::ImageRgb8(RgbImage::new(2, 2));
                sink(RenderEvent::Rendered { index, image });
            }
            Ok(())
        }
    }

    struct Gone;

    impl PdfEngine for Gone {
        fn page_count(&self, _pdf: &[u8], _password: Option<&str>) -> Result<usize, EngineError> {
            Err(EngineError::Unavailable(
                "libpdfium.so: cannot open shared object".into(),
            ))
        }

        fn render_page(
            &self,
            _pdf: &[u8],
            _password: Option<&str>,
            _index: usize,
            _options: RenderOptions,
        ) -> Result<DynamicImage, EngineError> {
            unreachable!("page_count fails first")
        }
    }

    #[derive(Default)]
    struct Messages(Mutex<Vec<String>>);

    impl ExtractionProgressCallback for Messages {
        fn on_status(&self, _status: RunStatus, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    fn pdf() -> Document {
        Document::new("scan.pdf", "application/pdf", b"%PDF-1.7".to_vec()).unwrap()
    }

    fn options() -> RenderOptions {
        RenderOptions {
            scale: 2.0,
            max_pixels: 4096,
        }
    }

    #[tokio::test]
    async fn pages_come_back_in_order_with_progress() {
        let r = Rasterizer::new(Arc::new(FixedPages { pages: 3, fail_on: None }), options());
        let progress = Messages::default();
        let pages = r.rasterize(&pdf(), None, &progress).await.unwrap();

        let numbers: Vec<_> = pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(pages[2].width, 6);
        assert!(pages[0].image.bytes.starts_with(b"\x89PNG"));
        assert_eq!(
            *progress.0.lock().unwrap(),
            vec![
                "Converting PDF page 1 of 3...",
                "Converting PDF page 2 of 3...",
                "Converting PDF page 3 of 3...",
            ]
        );
    }

    #[tokio::test]
    async fn one_bad_page_fails_the_document() {
        let r = Rasterizer::new(Arc::new(FixedPages { pages: 3, fail_on: Some(1) }), options());
        let err = r.rasterize(&pdf(), None, &NoopProgressCallback).await.unwrap_err();
        assert!(matches!(err, OcrError::RasterisationFailed { page: 2, .. }));
    }

    #[tokio::test]
    async fn empty_pdf_yields_no_pages() {
        let r = Rasterizer::new(Arc::new(FixedPages { pages: 0, fail_on: None }), options());
        let pages = r.rasterize(&pdf(), None, &NoopProgressCallback).await.unwrap();
        assert!(pages.is_empty());
    }

    #[tokio::test]
    async fn password_errors_are_distinguished() {
        let r = Rasterizer::new(Arc::new(Locked), options());
        let err = r.rasterize(&pdf(), None, &NoopProgressCallback).await.unwrap_err();
        assert!(matches!(err, OcrError::PasswordRequired { .. }));
        let err = r.rasterize(&pdf(), Some("guess"), &NoopProgressCallback).await.unwrap_err();
        assert!(matches!(err, OcrError::WrongPassword { .. }));
    }

    #[tokio::test]
    async fn document_is_opened_once_for_all_pages() {
        let engine = Arc::new(OpenOnce {
            opens: AtomicUsize::new(0),
        });
        let r = Rasterizer::new(engine.clone(), options());
        let progress = Messages::default();

        let pages = r.rasterize(&pdf(), None, &progress).await.unwrap();

        assert_eq!(engine.opens.load(Ordering::SeqCst), 1);
        assert_eq!(pages.len(), 3);
        assert_eq!(progress.0.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn engine_lost_before_opening_is_unavailable() {
        let r = Rasterizer::new(Arc::new(Gone), options());
        let progress = Messages::default();
        let err = r.rasterize(&pdf(), None, &progress).await.unwrap_err();
        assert!(matches!(err, OcrError::EngineUnavailable { .. }));
        assert!(progress.0.lock().unwrap().is_empty());
    }
}
