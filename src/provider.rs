//! LLM provider resolution shared by structuring and the vision OCR backend.
//!
//! API keys are read by `edgequake-llm`'s provider factory from the process
//! environment (`GEMINI_API_KEY`, `OPENAI_API_KEY`, …). Nothing here stores
//! or logs a credential.

use crate::error::OcrError;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// Instantiate a named provider with the given model.
pub fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, OcrError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        OcrError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve a provider, from most-specific to least-specific:
///
/// 1. `explicit`, a caller-built provider, used as-is.
/// 2. `name` with `model`.
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
/// 4. `preferred = (provider, key_var)` with `model`, when `key_var` is set.
/// 5. [`ProviderFactory::from_env`] auto-detection.
pub fn resolve_provider(
    explicit: Option<&Arc<dyn LLMProvider>>,
    name: Option<&str>,
    model: &str,
    preferred: (&str, &str),
) -> Result<Arc<dyn LLMProvider>, OcrError> {
    if let Some(provider) = explicit {
        return Ok(Arc::clone(provider));
    }

    if let Some(name) = name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    let (preferred_name, preferred_key_var) = preferred;
    if std::env::var(preferred_key_var).is_ok_and(|k| !k.is_empty()) {
        debug!("{preferred_key_var} present; using provider {preferred_name}");
        return create_provider(preferred_name, model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| OcrError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set {preferred_key_var}, OPENAI_API_KEY, or pass --provider.\n\
                Error: {e}"
            ),
        })?;

    Ok(llm_provider)
}
