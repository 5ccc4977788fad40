//! The observable state of one extraction run.
//!
//! ```text
//! idle ─┬─(pdf)──▶ converting ─┬─▶ recognizing ─▶ normalizing ─┬─▶ structuring ─▶ done
//!       │                      └──(0 pages)──────▶│            └────────────────▶ done
//!       └─(image)─────────────────▶ recognizing
//!
//! any non-idle, non-terminal state ──▶ failed
//! ```

use crate::error::StructuringError;
use crate::pipeline::structure::StructuredOutput;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final text shown when the rasteriser or recogniser fails.
pub const FAILURE_MESSAGE: &str = "Error during OCR processing.";

/// Where a run is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Converting,
    Recognizing,
    Normalizing,
    Structuring,
    Done,
    Failed,
}

impl RunStatus {
    /// True for `Done` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Done | RunStatus::Failed)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    ///
    /// Staying in `Recognizing` is allowed: it repeats once per page.
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        use RunStatus::*;
        match (self, next) {
            (Idle, Converting) | (Idle, Recognizing) => true,
            (Converting, Recognizing) | (Converting, Normalizing) => true,
            (Recognizing, Recognizing) | (Recognizing, Normalizing) => true,
            (Normalizing, Structuring) | (Normalizing, Done) => true,
            (Structuring, Done) => true,
            (from, Failed) => !matches!(from, Idle | Done | Failed),
            _ => false,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Idle => "idle",
            RunStatus::Converting => "converting",
            RunStatus::Recognizing => "recognizing",
            RunStatus::Normalizing => "normalizing",
            RunStatus::Structuring => "structuring",
            RunStatus::Done => "done",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Snapshot of a run as held by [`crate::session::ExtractionSession`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub status: RunStatus,
    /// Human-readable progress line; empty once the run has finished.
    pub status_message: String,
    /// Pages in the document (1 for an image) once known.
    pub page_count: Option<usize>,
    /// Page texts joined by `"\n\n"`, set once every page is recognised.
    pub raw_text: Option<String>,
    /// Final text: normalised output, or [`FAILURE_MESSAGE`].
    pub text: Option<String>,
    pub structured_output: Option<StructuredOutput>,
    pub structuring_error: Option<StructuringError>,
    /// Error message of a failed run.
    pub error: Option<String>,
}

impl PipelineRun {
    /// A run that has been asked to start but has done nothing yet.
    pub fn starting() -> Self {
        Self {
            status_message: "Starting...".to_string(),
            ..Self::default()
        }
    }

    /// Enter `next` if the state machine allows it. Returns false otherwise
    /// and leaves the run untouched.
    pub fn advance(&mut self, next: RunStatus, message: &str) -> bool {
        if self.status != next && !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.status_message = message.to_string();
        true
    }

    /// Terminal failure: generic text, structured output cleared.
    ///
    /// Unconditional, unlike [`Self::advance`]: the orchestrator reports a
    /// working status before any step that can fail, so a failing run is
    /// never idle here.
    pub fn fail(&mut self, error: impl fmt::Display) {
        self.status = RunStatus::Failed;
        self.status_message.clear();
        self.text = Some(FAILURE_MESSAGE.to_string());
        self.structured_output = None;
        self.error = Some(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_path_is_allowed() {
        use RunStatus::*;
        let path = [Idle, Converting, Recognizing, Recognizing, Normalizing, Structuring, Done];
        for w in path.windows(2) {
            assert!(w[0].can_transition_to(w[1]), "{} → {}", w[0], w[1]);
        }
    }

    #[test]
    fn image_skips_converting() {
        assert!(RunStatus::Idle.can_transition_to(RunStatus::Recognizing));
        assert!(!RunStatus::Recognizing.can_transition_to(RunStatus::Converting));
    }

    #[test]
    fn zero_pages_go_straight_to_normalizing() {
        assert!(RunStatus::Converting.can_transition_to(RunStatus::Normalizing));
    }

    #[test]
    fn terminal_states_are_final() {
        for next in [RunStatus::Idle, RunStatus::Recognizing, RunStatus::Failed] {
            assert!(!RunStatus::Done.can_transition_to(next));
            assert!(!RunStatus::Failed.can_transition_to(next));
        }
        assert!(!RunStatus::Idle.can_transition_to(RunStatus::Failed));
    }

    #[test]
    fn advance_rejects_illegal_moves() {
        let mut run = PipelineRun::starting();
        assert!(!run.advance(RunStatus::Done, ""));
        assert_eq!(run.status, RunStatus::Idle);
        assert!(run.advance(RunStatus::Recognizing, "Processing image..."));
        assert_eq!(run.status_message, "Processing image...");
    }

    #[test]
    fn fail_sets_generic_text_and_clears_structured() {
        let mut run = PipelineRun::starting();
        run.advance(RunStatus::Recognizing, "Processing image...");
        run.structured_output = Some(StructuredOutput::Raw { text: "x".into() });
        run.fail("engine crashed");
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.text.as_deref(), Some(FAILURE_MESSAGE));
        assert!(run.structured_output.is_none());
        assert!(run.status_message.is_empty());
        assert_eq!(run.error.as_deref(), Some("engine crashed"));
    }

    #[test]
    fn status_serialises_lowercase() {
        assert_eq!(serde_json::to_value(RunStatus::Recognizing).unwrap(), "recognizing");
    }
}
