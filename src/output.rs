//! Result types returned by document loading and search.

use crate::config::SearchMode;
use crate::error::PageError;
use serde::{Deserialize, Serialize};

/// One answer found on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerCandidate {
    /// 1-indexed page the answer was found on.
    pub page: usize,
    /// Trimmed, non-empty answer text.
    pub text: String,
    /// Model confidence in `[0, 1]`.
    pub score: f64,
}

impl AnswerCandidate {
    /// Confidence as a percentage with two decimals, e.g. `"87.50%"`.
    ///
    /// For display only; comparisons always use [`Self::score`].
    pub fn confidence_percent(&self) -> String {
        format!("{:.2}%", self.score * 100.0)
    }
}

/// Outcome of one search over a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    /// The question that was asked, trimmed.
    pub question: String,
    /// Surviving candidates, best first. Equal scores keep discovery order.
    pub answers: Vec<AnswerCandidate>,
    /// Pages whose inference call failed.
    pub failures: Vec<PageError>,
    /// Scan statistics.
    pub stats: SearchStats,
}

impl SearchResult {
    /// True when no candidate passed the inclusion threshold.
    ///
    /// An empty result is a normal outcome, not an error.
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// The highest-scoring answer, if any.
    pub fn best(&self) -> Option<&AnswerCandidate> {
        self.answers.first()
    }
}

/// Counters and timings for one search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchStats {
    pub mode: SearchMode,
    pub total_pages: usize,
    /// Pages visited, failed ones included.
    pub pages_scanned: usize,
    pub failed_pages: usize,
    /// Raw candidates returned by the model before filtering.
    pub raw_candidates: usize,
    /// True when a Quick-mode scan ended before the last page.
    pub stopped_early: bool,
    /// Summed per-page time: preparation plus the inference call. Excludes
    /// setup and ranking.
    pub inference_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Summary of the loaded document, for inspection and debugging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub name: String,
    pub page_count: usize,
    /// `(width, height)` of the first rendered page in pixels.
    pub first_page_size: (u32, u32),
}
