//! Progress-callback trait for per-page search events.
//!
//! Inject an [`Arc<dyn SearchProgressCallback>`] via
//! [`crate::config::SearchConfigBuilder::progress_callback`] to receive
//! events as the engine works through the document.
//!
//! Callbacks keep the library ignorant of how the host presents progress:
//! a terminal bar, a log line, or a message to a UI thread all fit behind
//! the same trait.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docqa::{SearchConfig, SearchProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl SearchProgressCallback for CountingCallback {
//!     fn on_page_done(&self, pages_done: usize, pages_total: usize) {
//!         self.done.store(pages_done, Ordering::SeqCst);
//!         eprintln!("Processing page {}/{}...", pages_done, pages_total);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { done: AtomicUsize::new(0) });
//!
//! let config = SearchConfig::builder()
//!     .progress_callback(counter as Arc<dyn SearchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the search engine as it processes each page.
///
/// Pages are searched one at a time, so events arrive strictly in page
/// order. All methods have default no-op implementations so callers only
/// override what they care about.
pub trait SearchProgressCallback: Send + Sync {
    /// Called once before the first page is searched.
    fn on_search_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before the inference call for a page.
    ///
    /// # Arguments
    /// * `page_num`: 1-indexed page number
    /// * `total_pages`: pages in the document
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called after every page, whatever its outcome.
    ///
    /// # Arguments
    /// * `pages_done`: pages finished so far, including this one
    /// * `pages_total`: pages in the document
    fn on_page_done(&self, pages_done: usize, pages_total: usize) {
        let _ = (pages_done, pages_total);
    }

    /// Called when the inference call for a page fails.
    ///
    /// The scan continues with the next page.
    fn on_page_error(&self, page_num: usize, error: &str) {
        let _ = (page_num, error);
    }

    /// Called once after the scan ends, early or not.
    ///
    /// # Arguments
    /// * `pages_scanned`: pages actually visited
    /// * `total_pages`: pages in the document
    /// * `answers`: candidates that survived filtering
    fn on_search_complete(&self, pages_scanned: usize, total_pages: usize, answers: usize) {
        let _ = (pages_scanned, total_pages, answers);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SearchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::SearchConfig`].
pub type ProgressCallback = Arc<dyn SearchProgressCallback>;
