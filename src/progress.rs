//! Progress-callback trait for extraction events.
//!
//! Pass a `&dyn ExtractionProgressCallback` to
//! [`crate::extract::Extractor::extract`] (or an [`Arc`] to
//! [`crate::session::ExtractionSession::extract`]) to follow a run: every
//! status change and status message goes through [`on_status`], the same
//! strings a UI would show.
//!
//! Pages are processed sequentially, so callbacks are never invoked
//! concurrently for a single run.
//!
//! # Example
//!
//! ```rust
//! use edgequake_ocr::{ExtractionProgressCallback, RunStatus};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct Log(Mutex<Vec<String>>);
//!
//! impl ExtractionProgressCallback for Log {
//!     fn on_status(&self, _status: RunStatus, message: &str) {
//!         self.0.lock().unwrap().push(message.to_string());
//!     }
//! }
//!
//! let log = Log::default();
//! log.on_status(RunStatus::Converting, "Converting PDF to images...");
//! assert_eq!(log.0.lock().unwrap().len(), 1);
//! ```
//!
//! [`on_status`]: ExtractionProgressCallback::on_status

use crate::run::RunStatus;
use std::sync::Arc;

/// Observer of a single extraction run. All methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// The run entered `status`, or reported a new message within it
    /// (e.g. `"Processing page 2 of 5..."`).
    fn on_status(&self, status: RunStatus, message: &str) {
        let _ = (status, message);
    }

    /// Text recognition finished for a page.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number (1 for single images)
    /// * `total_pages` — pages in the document
    /// * `chars`       — characters recognised after trimming
    fn on_page_recognized(&self, page_num: usize, total_pages: usize, chars: usize) {
        let _ = (page_num, total_pages, chars);
    }

    /// Called once when the run reaches `Done` or `Failed`.
    fn on_run_finished(&self, status: RunStatus) {
        let _ = status;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Shared handle used by the session.
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        statuses: AtomicUsize,
        pages: AtomicUsize,
    }

    impl ExtractionProgressCallback for Counting {
        fn on_status(&self, _status: RunStatus, _message: &str) {
            self.statuses.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_recognized(&self, _page_num: usize, _total_pages: usize, _chars: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_status(RunStatus::Converting, "Starting...");
        cb.on_page_recognized(1, 1, 10);
        cb.on_run_finished(RunStatus::Done);
    }

    #[test]
    fn overridden_methods_receive_events() {
        let cb = Counting::default();
        cb.on_status(RunStatus::Recognizing, "Processing page 1 of 2...");
        cb.on_page_recognized(1, 2, 5);
        cb.on_page_recognized(2, 2, 0);
        cb.on_run_finished(RunStatus::Done);
        assert_eq!(cb.statuses.load(Ordering::SeqCst), 1);
        assert_eq!(cb.pages.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_status(RunStatus::Normalizing, "");
    }
}
