//! Pipeline stages for image/PDF text extraction.
//!
//! Each submodule implements one transformation step and is tested on its
//! own; [`crate::extract::Extractor`] strings them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ rasterize ──▶ recognize ──▶ normalize ──▶ structure
//! (path/URL)  (pdf only)    (per page)    (regex)      (optional LLM)
//! ```
//!
//! 1. [`input`]     — resolve the user-supplied path or URL to a `Document`
//! 2. [`rasterize`] — render PDF pages to PNG on the blocking pool
//! 3. [`encode`]    — PNG encoding and base64 wrapping for vision requests
//! 4. [`recognize`] — run the OCR engine and trim its output
//! 5. [`normalize`] — fold layout whitespace into a single line
//! 6. [`structure`] — LLM key-value extraction with raw-text fallback

pub mod encode;
pub mod input;
pub mod normalize;
pub mod rasterize;
pub mod recognize;
pub mod structure;
