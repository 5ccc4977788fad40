//! # edgequake-ocr
//!
//! Extract text from images and PDF documents with OCR, fold it into clean
//! single-line text, and optionally have an LLM restructure it as key-value
//! JSON.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image / PDF
//!  │
//!  ├─ 1. Input      resolve a local file or download from a URL
//!  ├─ 2. Rasterise  PDF pages → PNG via pdfium at 2× scale (spawn_blocking)
//!  ├─ 3. Recognise  Tesseract (eng) or a vision LLM, one page at a time
//!  ├─ 4. Normalise  collapse line breaks and runs of spaces
//!  ├─ 5. Structure  optional LLM call → parsed JSON or raw reply
//!  └─ 6. Output     text, per-page stats, downloadable JSON payload
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_ocr::{extract_input, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Structuring reads GEMINI_API_KEY (or another provider key) from the environment
//!     let config = ExtractionConfig::builder().structure(true).build()?;
//!     let output = extract_input("receipt.pdf", &config).await?;
//!     println!("{}", output.text);
//!     println!("{}", serde_json::to_string_pretty(&output.payload())?);
//!     Ok(())
//! }
//! ```
//!
//! Engines can also be supplied directly, which is how the pipeline is
//! tested without native libraries:
//!
//! ```rust,ignore
//! let extractor = Extractor::new(my_pdf_engine, my_ocr_engine, config)
//!     .with_structurer(my_structurer);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature     | Default | Description |
//! |-------------|---------|-------------|
//! | `cli`       | on      | Enables the `ocr2json` binary (clap + anyhow + indicatif + tracing-subscriber) |
//! | `tesseract` | on      | Local English OCR through libtesseract (`leptess`); needs the system libraries |
//!
//! The vision backend is always opt-in, since it sends page images to an LLM
//! provider: `OcrBackend::Vision { provider_name: None, model: None }`.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod run;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, OcrBackend};
pub use document::{Document, DocumentInfo, DocumentKind};
pub use engine::{EncodedImage, OcrEngine, PdfEngine, RenderEvent, RenderOptions};
pub use error::{EngineError, OcrError, StructuringError};
pub use extract::{extract_input, extract_sync, Extractor};
pub use output::{ExtractionOutput, ExtractionStats, OutputPayload, PageCount, PageResult};
pub use pipeline::normalize::normalize_text;
pub use pipeline::structure::{RemoteStructurer, StructuredOutput, Structurer};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use run::{PipelineRun, RunStatus, FAILURE_MESSAGE};
pub use session::ExtractionSession;
