//! Prompt text sent to LLM providers.
//!
//! All prompt wording lives here so it can be inspected in tests and changed
//! in one place. Callers can replace the structuring instruction through
//! [`crate::config::ExtractionConfig::structuring_prompt`].

/// Placeholder replaced by the normalised document text.
pub const TEXT_PLACEHOLDER: &str = "{text}";

/// Default structuring instruction.
///
/// The model is asked for bare JSON; replies that still arrive wrapped in a
/// ```` ```json ```` fence are unwrapped by
/// [`crate::pipeline::structure::strip_code_fences`].
pub const DEFAULT_STRUCTURING_PROMPT: &str = "Give me a cleaned version of the following text \
and return in proper JSON format only. Do not include any extra text or symbols. \
Extract key-value pairs from the content:\n\n{text}";

/// Instruction for the vision OCR backend: transcribe, do not interpret.
pub const VISION_OCR_PROMPT: &str = r#"You are an OCR engine. Transcribe every piece of text visible in the image exactly as written.

Rules:
- Preserve the reading order a human would use
- Keep line breaks between separate lines of text
- Do not translate, summarise, correct or explain anything
- Do not add Markdown, code fences or commentary
- If the image contains no text, reply with nothing"#;

/// Fill `template` with `text`.
///
/// Only the first placeholder is substituted so document text that happens
/// to contain `{text}` is left alone.
pub fn build_structuring_prompt(template: Option<&str>, text: &str) -> String {
    template
        .unwrap_or(DEFAULT_STRUCTURING_PROMPT)
        .replacen(TEXT_PLACEHOLDER, text, 1)
}
