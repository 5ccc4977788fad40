//! Stateful front end for interactive hosts.
//!
//! An [`ExtractionSession`] holds the selected [`Document`] and the single
//! [`PipelineRun`] a UI would render. Every selection, clear and extract
//! bumps a generation counter; a run only writes to the session while its
//! generation is still current, so a superseded run finishing late cannot
//! overwrite newer state.
//!
//! The session lock is a `std::sync::Mutex` held only for short, synchronous
//! updates, never across an `.await`.

use crate::document::{Document, DocumentInfo};
use crate::error::OcrError;
use crate::extract::Extractor;
use crate::progress::{ExtractionProgressCallback, ProgressCallback};
use crate::run::{PipelineRun, RunStatus};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct SessionState {
    document: Option<Document>,
    generation: u64,
    run: PipelineRun,
}

/// One user's document selection and its latest run.
#[derive(Clone)]
pub struct ExtractionSession {
    extractor: Arc<Extractor>,
    state: Arc<Mutex<SessionState>>,
}

impl ExtractionSession {
    pub fn new(extractor: Extractor) -> Self {
        Self {
            extractor: Arc::new(extractor),
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the selected document and reset the run. Any run still in
    /// flight becomes stale.
    pub fn select(&self, document: Document) {
        let mut state = self.lock();
        state.generation += 1;
        debug!("Selected '{}' (generation {})", document.name(), state.generation);
        state.document = Some(document);
        state.run = PipelineRun::default();
    }

    /// Select a document from raw parts.
    ///
    /// # Errors
    /// [`OcrError::UnsupportedMediaType`] for anything but images and PDFs;
    /// the session is left exactly as it was.
    pub fn select_file(
        &self,
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<(), OcrError> {
        let document = Document::new(name, media_type, bytes)?;
        self.select(document);
        Ok(())
    }

    /// Drop the document and reset the run.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.document = None;
        state.run = PipelineRun::default();
    }

    /// Metadata of the selected document.
    pub fn document(&self) -> Option<DocumentInfo> {
        self.lock().document.as_ref().map(Document::info)
    }

    /// Current run state.
    pub fn snapshot(&self) -> PipelineRun {
        self.lock().run.clone()
    }

    /// Run the selected document through the pipeline.
    ///
    /// Returns this run's final state: `Done` with the normalised text, or
    /// `Failed` with the generic failure text. Errors never escape. With no
    /// document selected, the current (idle) snapshot is returned.
    ///
    /// If the session moves on while this run is in flight (new selection,
    /// clear, or another extract), the returned value still describes this
    /// run but none of it is written to the session.
    pub async fn extract(&self, progress: Option<ProgressCallback>) -> PipelineRun {
        let (document, generation) = {
            let mut state = self.lock();
            let Some(document) = state.document.clone() else {
                warn!("Extract requested with no document selected");
                return state.run.clone();
            };
            state.generation += 1;
            state.run = PipelineRun::starting();
            (document, state.generation)
        };

        let tracker = RunTracker {
            state: Arc::clone(&self.state),
            generation,
            local: Mutex::new(PipelineRun::starting()),
            forward: progress,
        };

        match self.extractor.extract(&document, &tracker).await {
            Ok(output) => tracker.apply(|run| {
                run.advance(RunStatus::Done, "");
                run.page_count = Some(output.stats.page_count);
                run.raw_text = Some(output.raw_text.clone());
                run.text = Some(output.text.clone());
                run.structured_output = output.structured.clone();
                run.structuring_error = output.structuring_error.clone();
            }),
            Err(e) => tracker.apply(|run| run.fail(&e)),
        }

        tracker.finish()
    }
}

/// Mirrors one run's progress into its own copy and, while the run is
/// current, into the session.
struct RunTracker {
    state: Arc<Mutex<SessionState>>,
    generation: u64,
    local: Mutex<PipelineRun>,
    forward: Option<ProgressCallback>,
}

impl RunTracker {
    fn apply(&self, update: impl Fn(&mut PipelineRun)) {
        update(&mut self.local.lock().unwrap_or_else(PoisonError::into_inner));

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.generation == self.generation {
            update(&mut state.run);
        } else {
            debug!(
                "Discarding update from stale run (generation {} < {})",
                self.generation, state.generation
            );
        }
    }

    fn finish(self) -> PipelineRun {
        self.local.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ExtractionProgressCallback for RunTracker {
    fn on_status(&self, status: RunStatus, message: &str) {
        // Terminal states are written together with the results.
        if !status.is_terminal() {
            self.apply(|run| {
                run.advance(status, message);
            });
        }
        if let Some(cb) = &self.forward {
            cb.on_status(status, message);
        }
    }

    fn on_page_recognized(&self, page_num: usize, total_pages: usize, chars: usize) {
        self.apply(|run| run.page_count = Some(total_pages));
        if let Some(cb) = &self.forward {
            cb.on_page_recognized(page_num, total_pages, chars);
        }
    }

    fn on_run_finished(&self, status: RunStatus) {
        if let Some(cb) = &self.forward {
            cb.on_run_finished(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionConfig;
    use crate::engine::{EncodedImage, OcrEngine};
    use crate::error::EngineError;
    use async_trait::async_trait;

    struct Echo(&'static str);

    #[async_trait]
    impl OcrEngine for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn recognize(&self, _image: EncodedImage) -> Result<String, EngineError> {
            Ok(self.0.to_string())
        }
    }

    fn session(text: &'static str) -> ExtractionSession {
        let extractor = Extractor::image_only(Arc::new(Echo(text)), ExtractionConfig::default());
        ExtractionSession::new(extractor)
    }

    #[test]
    fn unsupported_file_leaves_state_alone() {
        let s = session("x");
        s.select_file("a.png", "image/png", vec![1u8]).unwrap();
        let err = s.select_file("notes.txt", "text/plain", b"hi".to_vec()).unwrap_err();
        assert!(matches!(err, OcrError::UnsupportedMediaType { .. }));
        assert_eq!(s.document().unwrap().name, "a.png");
    }

    #[tokio::test]
    async fn extract_without_document_is_idle() {
        let s = session("x");
        let run = s.extract(None).await;
        assert_eq!(run.status, RunStatus::Idle);
    }

    #[tokio::test]
    async fn image_run_reaches_done() {
        let s = session("Hello   World\n\n\nFoo");
        s.select_file("scan.jpg", "image/jpeg", vec![0xFFu8, 0xD8]).unwrap();
        let run = s.extract(None).await;
        assert_eq!(run.status, RunStatus::Done);
        assert_eq!(run.text.as_deref(), Some("Hello World Foo"));
        assert_eq!(run.page_count, Some(1));
        assert!(run.status_message.is_empty());
        assert_eq!(s.snapshot(), run);
    }

    #[tokio::test]
    async fn pdf_without_engine_fails_with_generic_text() {
        let s = session("x");
        s.select_file("doc.pdf", "application/pdf", b"%PDF-1.7".to_vec()).unwrap();
        let run = s.extract(None).await;
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.text.as_deref(), Some(crate::run::FAILURE_MESSAGE));
    }

    #[tokio::test]
    async fn clear_resets_everything() {
        let s = session("x");
        s.select_file("scan.png", "image/png", vec![1u8]).unwrap();
        s.extract(None).await;
        s.clear();
        assert!(s.document().is_none());
        assert_eq!(s.snapshot(), PipelineRun::default());
    }
}
