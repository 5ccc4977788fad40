//! Configuration types for OCR extraction.
//!
//! Every knob of a run lives in [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. The OCR language is deliberately not a knob:
//! recognition is English-only (see [`OCR_LANGUAGE`]).

use crate::error::OcrError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Tesseract language code used for every recognition call.
pub const OCR_LANGUAGE: &str = "eng";

/// Upscaling factor applied when rasterising PDF pages.
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

/// Provider used for structuring when none is configured.
pub const DEFAULT_STRUCTURING_PROVIDER: &str = "gemini";

/// Model used for structuring when none is configured.
pub const DEFAULT_STRUCTURING_MODEL: &str = "gemini-1.5-flash";

/// Configuration for an extraction run.
///
/// # Example
/// ```rust
/// use edgequake_ocr::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .structure(true)
///     .model("gemini-1.5-flash")
///     .build()
///     .unwrap();
/// assert_eq!(config.render_scale, 2.0);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Page rasterisation scale relative to the PDF's native size. Default: 2.0.
    ///
    /// OCR accuracy drops sharply on small glyphs; rendering at twice the
    /// native resolution keeps body text legible for Tesseract.
    pub render_scale: f32,

    /// Cap on either edge of a rendered page, in pixels. Default: 4096.
    ///
    /// Applied after scaling so oversized pages (posters, drawings) cannot
    /// exhaust memory.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// OCR engine selection. Default: Tesseract with the system tessdata.
    pub ocr_backend: OcrBackend,

    /// Send the normalised text to an LLM for key-value structuring. Default: false.
    pub structure: bool,

    /// Structuring model. If None, uses [`DEFAULT_STRUCTURING_MODEL`].
    pub model: Option<String>,

    /// Structuring provider name (e.g. "gemini", "openai").
    /// If None, uses [`DEFAULT_STRUCTURING_PROVIDER`].
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Replacement for the built-in structuring instruction.
    /// Must contain `{text}` where the document text goes.
    pub structuring_prompt: Option<String>,

    /// Sampling temperature for structuring. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 4096.
    pub max_tokens: usize,

    /// Per-call timeout for structuring and vision OCR, in seconds. Default: 60.
    pub llm_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Let engine initialisation download PDFium when it is not installed. Default: true.
    pub allow_engine_download: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            render_scale: DEFAULT_RENDER_SCALE,
            max_rendered_pixels: 4096,
            password: None,
            ocr_backend: OcrBackend::default(),
            structure: false,
            model: None,
            provider_name: None,
            provider: None,
            structuring_prompt: None,
            temperature: 0.1,
            max_tokens: 4096,
            llm_timeout_secs: 60,
            download_timeout_secs: 120,
            allow_engine_download: true,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("render_scale", &self.render_scale)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("ocr_backend", &self.ocr_backend)
            .field("structure", &self.structure)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Structuring provider name after defaults.
    pub fn structuring_provider(&self) -> &str {
        self.provider_name
            .as_deref()
            .unwrap_or(DEFAULT_STRUCTURING_PROVIDER)
    }

    /// Structuring model after defaults.
    pub fn structuring_model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_STRUCTURING_MODEL)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.5, 4.0);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn ocr_backend(mut self, backend: OcrBackend) -> Self {
        self.config.ocr_backend = backend;
        self
    }

    pub fn structure(mut self, v: bool) -> Self {
        self.config.structure = v;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn structuring_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.structuring_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn llm_timeout_secs(mut self, secs: u64) -> Self {
        self.config.llm_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn allow_engine_download(mut self, v: bool) -> Self {
        self.config.allow_engine_download = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, OcrError> {
        let c = &self.config;
        if !(0.5..=4.0).contains(&c.render_scale) {
            return Err(OcrError::InvalidConfig(format!(
                "render scale must be 0.5–4.0, got {}",
                c.render_scale
            )));
        }
        if let Some(ref prompt) = c.structuring_prompt {
            if !prompt.contains("{text}") {
                return Err(OcrError::InvalidConfig(
                    "structuring prompt must contain a {text} placeholder".into(),
                ));
            }
        }
        if c.llm_timeout_secs == 0 {
            return Err(OcrError::InvalidConfig("LLM timeout must be ≥ 1s".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which engine turns page images into text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "engine", rename_all = "snake_case")]
pub enum OcrBackend {
    /// Local Tesseract (crate feature `tesseract`).
    Tesseract {
        /// Directory containing `eng.traineddata`; None uses Tesseract's default.
        tessdata_dir: Option<PathBuf>,
    },
    /// Vision LLM transcription through an edgequake-llm provider.
    Vision {
        provider_name: Option<String>,
        model: Option<String>,
    },
}

impl Default for OcrBackend {
    fn default() -> Self {
        OcrBackend::Tesseract { tessdata_dir: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ExtractionConfig::default();
        assert_eq!(c.render_scale, 2.0);
        assert_eq!(c.max_rendered_pixels, 4096);
        assert!(!c.structure);
        assert_eq!(c.structuring_provider(), "gemini");
        assert_eq!(c.structuring_model(), "gemini-1.5-flash");
        assert_eq!(c.ocr_backend, OcrBackend::Tesseract { tessdata_dir: None });
    }

    #[test]
    fn builder_clamps_scale() {
        let c = ExtractionConfig::builder().render_scale(9.0).build().unwrap();
        assert_eq!(c.render_scale, 4.0);
    }

    #[test]
    fn prompt_without_placeholder_is_rejected() {
        let err = ExtractionConfig::builder()
            .structuring_prompt("Return JSON.")
            .build()
            .unwrap_err();
        assert!(matches!(err, OcrError::InvalidConfig(_)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(ExtractionConfig::builder().llm_timeout_secs(0).build().is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let c = ExtractionConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn backend_serialises_with_engine_tag() {
        let b = OcrBackend::Vision {
            provider_name: Some("openai".into()),
            model: None,
        };
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["engine"], "vision");
    }
}
