//! Remote structuring: ask an LLM to turn normalised text into key-value JSON.
//!
//! The call is a single best-effort attempt with a timeout. Nothing here is
//! fatal: a reply that is not JSON is kept verbatim as
//! [`StructuredOutput::Raw`], and a failed or timed-out call is reported as a
//! [`StructuringError`] for the orchestrator to absorb.
//!
//! The normalised document text leaves the machine at this point. Callers
//! opt in through [`crate::config::ExtractionConfig::structure`].

use crate::config::ExtractionConfig;
use crate::error::{OcrError, StructuringError};
use crate::prompts::build_structuring_prompt;
use crate::provider::resolve_provider;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of the structuring step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StructuredOutput {
    /// The reply parsed as JSON.
    Parsed { value: serde_json::Value },
    /// The reply did not parse; fence-stripped text, otherwise unchanged.
    Raw { text: String },
}

impl StructuredOutput {
    /// The value as JSON: the parsed value, or the raw text as a string.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            StructuredOutput::Parsed { value } => value.clone(),
            StructuredOutput::Raw { text } => serde_json::Value::String(text.clone()),
        }
    }
}

/// A completion endpoint for structuring prompts.
///
/// [`RemoteStructurer`] is the production implementation; tests substitute
/// scripted replies.
#[async_trait]
pub trait Structurer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, StructuringError>;
}

/// [`Structurer`] backed by an `edgequake-llm` provider.
pub struct RemoteStructurer {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl RemoteStructurer {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            options: CompletionOptions {
                temperature: Some(temperature),
                max_tokens: Some(max_tokens),
                ..Default::default()
            },
        }
    }

    /// Resolve the provider from `config`, defaulting to Gemini when
    /// `GEMINI_API_KEY` is set.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, OcrError> {
        let provider = resolve_provider(
            config.provider.as_ref(),
            config.provider_name.as_deref(),
            config.structuring_model(),
            (config.structuring_provider(), "GEMINI_API_KEY"),
        )?;
        Ok(Self::new(provider, config.temperature, config.max_tokens))
    }
}

#[async_trait]
impl Structurer for RemoteStructurer {
    async fn complete(&self, prompt: &str) -> Result<String, StructuringError> {
        let messages = vec![ChatMessage::user(prompt)];
        let start = Instant::now();
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| StructuringError::Network {
                detail: format!("{e}"),
            })?;
        debug!(
            "Structuring: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

/// Remove every ```` ```json ```` and ```` ``` ```` marker. Everything else,
/// surrounding whitespace included, is kept as-is.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "")
}

/// Interpret a model reply.
///
/// Returns `Parsed` when the fence-stripped reply is JSON; otherwise `Raw`
/// with the fence-stripped text and a [`StructuringError::ParseFailure`].
pub fn parse_structured_reply(raw: &str) -> (StructuredOutput, Option<StructuringError>) {
    let cleaned = strip_code_fences(raw);
    match serde_json::from_str::<serde_json::Value>(&cleaned) {
        Ok(value) => (StructuredOutput::Parsed { value }, None),
        Err(e) => {
            warn!("Structuring reply is not JSON, keeping raw text: {}", e);
            (
                StructuredOutput::Raw { text: cleaned },
                Some(StructuringError::ParseFailure {
                    detail: e.to_string(),
                }),
            )
        }
    }
}

/// Send `text` through `structurer` using `template` (or the default prompt).
///
/// `Err` means no reply arrived (transport failure or `timeout`); a reply that
/// is not JSON is still `Ok`, with the parse failure alongside.
pub async fn structure_text(
    structurer: &dyn Structurer,
    text: &str,
    template: Option<&str>,
    timeout: Duration,
) -> Result<(StructuredOutput, Option<StructuringError>), StructuringError> {
    let prompt = build_structuring_prompt(template, text);
    let reply = tokio::time::timeout(timeout, structurer.complete(&prompt))
        .await
        .map_err(|_| StructuringError::Timeout {
            secs: timeout.as_secs(),
        })??;
    Ok(parse_structured_reply(&reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct Scripted {
        reply: Result<String, StructuringError>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(reply: Result<String, StructuringError>) -> Self {
            Self {
                reply,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Structurer for Scripted {
        async fn complete(&self, prompt: &str) -> Result<String, StructuringError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone()
        }
    }

    struct Silent;

    #[async_trait]
    impl Structurer for Silent {
        async fn complete(&self, _prompt: &str) -> Result<String, StructuringError> {
            std::future::pending().await
        }
    }

    #[test]
    fn fenced_json_is_parsed() {
        let (out, err) = parse_structured_reply("```json\n{\"a\":1}\n```");
        assert_eq!(out, StructuredOutput::Parsed { value: json!({"a": 1}) });
        assert!(err.is_none());
    }

    #[test]
    fn plain_text_is_kept_raw() {
        let (out, err) = parse_structured_reply("hello");
        assert_eq!(out, StructuredOutput::Raw { text: "hello".into() });
        assert!(matches!(err, Some(StructuringError::ParseFailure { .. })));
    }

    #[test]
    fn bare_fences_are_stripped() {
        assert_eq!(strip_code_fences("```\n[1, 2]\n```"), "\n[1, 2]\n");
        assert_eq!(strip_code_fences("no fences"), "no fences");
    }

    #[test]
    fn padded_non_json_is_kept_unchanged() {
        let (out, err) = parse_structured_reply("  hello\n");
        assert_eq!(out, StructuredOutput::Raw { text: "  hello\n".into() });
        assert!(err.is_some());

        let (out, _) = parse_structured_reply("```\nName: Ada\n```");
        assert_eq!(out, StructuredOutput::Raw { text: "\nName: Ada\n".into() });
    }

    #[test]
    fn padded_json_still_parses() {
        let (out, err) = parse_structured_reply("\n\n```json\n{\"a\": 1}\n```\n");
        assert_eq!(out, StructuredOutput::Parsed { value: json!({"a": 1}) });
        assert!(err.is_none());
    }

    #[test]
    fn output_serialises_with_kind_tag() {
        let v = serde_json::to_value(StructuredOutput::Raw { text: "x".into() }).unwrap();
        assert_eq!(v, json!({"kind": "raw", "text": "x"}));
        let parsed = StructuredOutput::Parsed {
            value: json!({"k": "v"}),
        };
        let v = serde_json::to_value(parsed).unwrap();
        assert_eq!(v, json!({"kind": "parsed", "value": {"k": "v"}}));
    }

    #[test]
    fn to_json_wraps_raw_text_as_string() {
        let raw = StructuredOutput::Raw { text: "plain".into() };
        assert_eq!(raw.to_json(), json!("plain"));
    }

    #[tokio::test]
    async fn prompt_carries_the_text() {
        let s = Scripted::new(Ok("{\"name\":\"Ada\"}".into()));
        let (out, err) = structure_text(&s, "Name: Ada", None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out, StructuredOutput::Parsed { value: json!({"name": "Ada"}) });
        assert!(err.is_none());
        let prompts = s.prompts.lock().unwrap();
        assert!(prompts[0].ends_with("Name: Ada"));
    }

    #[tokio::test]
    async fn transport_failure_is_returned() {
        let s = Scripted::new(Err(StructuringError::Network { detail: "503".into() }));
        let err = structure_text(&s, "x", None, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, StructuringError::Network { .. }));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let err = structure_text(&Silent, "x", None, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, StructuringError::Timeout { .. }));
    }
}
