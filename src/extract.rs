//! The extraction orchestrator.
//!
//! ```text
//! Document ──(pdf)──▶ Rasterizer ──▶ PageImage × N ──┐
//!          └─(image)──────────────────────────────────┴─▶ Recognizer (one at a time)
//!                                                           │
//!                         join non-empty pages with "\n\n" ◀┘
//!                                   │
//!                                   ▼
//!                              normalize_text ──▶ Structurer (optional) ──▶ ExtractionOutput
//! ```
//!
//! Any rasteriser or recogniser error ends the run with an `Err`. Structuring
//! failures never do: the normalised text stands and the failure is recorded
//! in [`ExtractionOutput::structuring_error`].

use crate::config::ExtractionConfig;
use crate::document::{Document, DocumentKind};
use crate::engine::{self, EncodedImage, OcrEngine, PdfEngine, RenderOptions};
use crate::error::OcrError;
use crate::output::{ExtractionOutput, ExtractionStats, PageResult};
use crate::pipeline::input;
use crate::pipeline::normalize::normalize_text;
use crate::pipeline::rasterize::Rasterizer;
use crate::pipeline::recognize::Recognizer;
use crate::pipeline::structure::{structure_text, RemoteStructurer, Structurer};
use crate::progress::{ExtractionProgressCallback, NoopProgressCallback};
use crate::run::RunStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Separator placed between the texts of consecutive non-empty pages.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Runs documents through rasterisation, recognition, normalisation and
/// optional structuring, with engines injected at construction.
///
/// # Example
///
/// ```rust,no_run
/// use edgequake_ocr::{Document, ExtractionConfig, Extractor, NoopProgressCallback};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExtractionConfig::default();
/// let extractor = Extractor::initialize(&config).await?;
/// let doc = Document::sniff("scan.png", std::fs::read("scan.png")?)?;
/// let output = extractor.extract(&doc, &NoopProgressCallback).await?;
/// println!("{}", output.text);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Extractor {
    rasterizer: Option<Rasterizer>,
    recognizer: Recognizer,
    structurer: Option<Arc<dyn Structurer>>,
    config: ExtractionConfig,
}

impl Extractor {
    /// Build an extractor from ready engines. No structurer is attached;
    /// see [`Self::with_structurer`].
    pub fn new(
        pdf_engine: Arc<dyn PdfEngine>,
        ocr_engine: Arc<dyn OcrEngine>,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            rasterizer: Some(Rasterizer::new(pdf_engine, RenderOptions::from_config(&config))),
            recognizer: Recognizer::new(ocr_engine),
            structurer: None,
            config,
        }
    }

    /// An extractor without a PDF engine. PDF documents fail with
    /// [`OcrError::EngineUnavailable`].
    pub fn image_only(ocr_engine: Arc<dyn OcrEngine>, config: ExtractionConfig) -> Self {
        Self {
            rasterizer: None,
            recognizer: Recognizer::new(ocr_engine),
            structurer: None,
            config,
        }
    }

    pub fn with_structurer(mut self, structurer: Arc<dyn Structurer>) -> Self {
        self.structurer = Some(structurer);
        self
    }

    /// Build the real engines described by `config`, and the remote
    /// structurer when `config.structure` is set.
    pub async fn initialize(config: &ExtractionConfig) -> Result<Self, OcrError> {
        Self::initialize_for(config, None).await
    }

    /// Like [`Self::initialize`], but skips the PDF engine when `kind` is
    /// [`DocumentKind::Image`].
    pub async fn initialize_for(
        config: &ExtractionConfig,
        kind: Option<DocumentKind>,
    ) -> Result<Self, OcrError> {
        let ocr = engine::initialize_ocr_engine(config).await?;
        let mut extractor = if kind == Some(DocumentKind::Image) {
            Self::image_only(ocr, config.clone())
        } else {
            let pdf = engine::initialize_pdf_engine(config, None).await?;
            Self::new(pdf, ocr, config.clone())
        };
        if config.structure {
            extractor.structurer = Some(Arc::new(RemoteStructurer::from_config(config)?));
        }
        Ok(extractor)
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn has_structurer(&self) -> bool {
        self.structurer.is_some()
    }

    /// Run `doc` through the pipeline, reporting to `progress`.
    ///
    /// # Errors
    /// Fatal errors only: engine unavailable, an unreadable or locked PDF,
    /// or a page that failed to render or be recognised. A PDF with zero
    /// pages succeeds with empty text.
    pub async fn extract(
        &self,
        doc: &Document,
        progress: &dyn ExtractionProgressCallback,
    ) -> Result<ExtractionOutput, OcrError> {
        let result = self.run(doc, progress).await;
        match &result {
            Ok(_) => {
                progress.on_status(RunStatus::Done, "");
                progress.on_run_finished(RunStatus::Done);
            }
            Err(e) => {
                warn!("Extraction of '{}' failed: {}", doc.name(), e);
                progress.on_run_finished(RunStatus::Failed);
            }
        }
        result
    }

    async fn run(
        &self,
        doc: &Document,
        progress: &dyn ExtractionProgressCallback,
    ) -> Result<ExtractionOutput, OcrError> {
        let total_start = Instant::now();
        info!(
            "Starting extraction: {} ({}, {} bytes)",
            doc.name(),
            doc.media_type(),
            doc.size()
        );

        let mut texts: Vec<String> = Vec::new();
        let mut pages: Vec<PageResult> = Vec::new();
        let mut render_duration_ms = 0;

        match doc.kind() {
            DocumentKind::Pdf => {
                progress.on_status(RunStatus::Converting, "Converting PDF to images...");
                let rasterizer = self.rasterizer.as_ref().ok_or_else(|| {
                    OcrError::EngineUnavailable {
                        engine: "PDF".into(),
                        detail: "this extractor was built without a PDF engine".into(),
                    }
                })?;

                let render_start = Instant::now();
                let images = rasterizer
                    .rasterize(doc, self.config.password.as_deref(), progress)
                    .await?;
                render_duration_ms = render_start.elapsed().as_millis() as u64;

                let total = images.len();
                for page in images {
                    let n = page.page_number;
                    progress.on_status(
                        RunStatus::Recognizing,
                        &format!("Processing page {n} of {total}..."),
                    );
                    let ocr_start = Instant::now();
                    let text = self.recognizer.recognize(page.image, Some(n)).await?;
                    let chars = text.chars().count();
                    progress.on_page_recognized(n, total, chars);
                    pages.push(PageResult {
                        page_number: n,
                        width: Some(page.width),
                        height: Some(page.height),
                        chars,
                        ocr_duration_ms: ocr_start.elapsed().as_millis() as u64,
                    });
                    if text.is_empty() {
                        debug!("Page {} has no text; skipped", n);
                    } else {
                        texts.push(text);
                    }
                }
            }
            DocumentKind::Image => {
                progress.on_status(RunStatus::Recognizing, "Processing image...");
                let image = EncodedImage {
                    bytes: doc.shared_bytes(),
                    media_type: doc.media_type().to_string(),
                };
                let ocr_start = Instant::now();
                let text = self.recognizer.recognize(image, None).await?;
                let chars = text.chars().count();
                progress.on_page_recognized(1, 1, chars);
                pages.push(PageResult {
                    page_number: 1,
                    width: None,
                    height: None,
                    chars,
                    ocr_duration_ms: ocr_start.elapsed().as_millis() as u64,
                });
                if !text.is_empty() {
                    texts.push(text);
                }
            }
        }

        let raw_text = texts.join(PAGE_SEPARATOR);

        progress.on_status(RunStatus::Normalizing, "Normalizing text...");
        let text = normalize_text(&raw_text);

        let mut structured = None;
        let mut structuring_error = None;
        let mut structuring_duration_ms = None;
        if let Some(structurer) = &self.structurer {
            progress.on_status(RunStatus::Structuring, "Structuring text...");
            let start = Instant::now();
            match structure_text(
                structurer.as_ref(),
                &text,
                self.config.structuring_prompt.as_deref(),
                Duration::from_secs(self.config.llm_timeout_secs),
            )
            .await
            {
                Ok((output, parse_error)) => {
                    structured = Some(output);
                    structuring_error = parse_error;
                }
                Err(e) => {
                    warn!("Structuring failed, keeping normalised text: {}", e);
                    structuring_error = Some(e);
                }
            }
            structuring_duration_ms = Some(start.elapsed().as_millis() as u64);
        }

        let pages_with_text = texts.len();
        let stats = ExtractionStats {
            page_count: pages.len(),
            pages_with_text,
            empty_pages: pages.len() - pages_with_text,
            raw_chars: raw_text.chars().count(),
            text_chars: text.chars().count(),
            render_duration_ms,
            ocr_duration_ms: pages.iter().map(|p| p.ocr_duration_ms).sum(),
            structuring_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Extraction complete: {}/{} pages with text, {} chars, {}ms total",
            stats.pages_with_text, stats.page_count, stats.text_chars, stats.total_duration_ms
        );

        Ok(ExtractionOutput {
            document: doc.info(),
            raw_text,
            text,
            pages,
            structured,
            structuring_error,
            stats,
            processed_at: chrono::Utc::now(),
        })
    }
}

/// Resolve `input` (path or URL), initialise engines and extract.
///
/// The PDF engine is only initialised for PDF inputs.
pub async fn extract_input(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, OcrError> {
    let doc = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let extractor = Extractor::initialize_for(config, Some(doc.kind())).await?;
    extractor.extract(&doc, &NoopProgressCallback).await
}

/// Synchronous wrapper around [`extract_input`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, OcrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OcrError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(extract_input(input_str, config))
}
