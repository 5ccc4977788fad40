//! Vision-LLM [`OcrEngine`]: transcription by a multimodal model.
//!
//! Useful where libtesseract is not installed. One request per image, one
//! attempt: a transport failure is a recognition failure, which fails the
//! run like any other engine error.

use super::{EncodedImage, OcrEngine};
use crate::config::ExtractionConfig;
use crate::error::{EngineError, OcrError};
use crate::pipeline::encode::to_image_data;
use crate::prompts::VISION_OCR_PROMPT;
use crate::provider::resolve_provider;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Model used for vision OCR when none is configured.
pub const DEFAULT_VISION_MODEL: &str = "gpt-4.1-nano";

/// Transcribes images through an `edgequake-llm` provider.
pub struct VisionEngine {
    provider: Arc<dyn LLMProvider>,
    max_tokens: usize,
    timeout: Duration,
}

impl VisionEngine {
    pub fn new(provider: Arc<dyn LLMProvider>, max_tokens: usize, timeout: Duration) -> Self {
        Self {
            provider,
            max_tokens,
            timeout,
        }
    }

    /// Resolve the provider from the backend selection and environment.
    pub fn from_config(
        provider_name: Option<&str>,
        model: Option<&str>,
        config: &ExtractionConfig,
    ) -> Result<Self, OcrError> {
        let model = model.unwrap_or(DEFAULT_VISION_MODEL);
        let provider = resolve_provider(None, provider_name, model, ("openai", "OPENAI_API_KEY"))?;
        Ok(Self::new(
            provider,
            config.max_tokens,
            Duration::from_secs(config.llm_timeout_secs),
        ))
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl OcrEngine for VisionEngine {
    fn name(&self) -> &str {
        "vision"
    }

    async fn recognize(&self, image: EncodedImage) -> Result<String, EngineError> {
        let messages = vec![
            ChatMessage::system(VISION_OCR_PROMPT),
            ChatMessage::user_with_images("", vec![to_image_data(&image)]),
        ];
        let options = self.options();

        let start = Instant::now();
        let call = self.provider.chat(&messages, Some(&options));
        let response = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                EngineError::Failed(format!(
                    "vision model did not answer within {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| EngineError::Failed(format!("{e}")))?;

        debug!(
            "Vision OCR: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}
