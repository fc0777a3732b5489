//! The answer search engine.
//!
//! Walks the pages of a loaded document in order, asks the inference client
//! about each one, keeps the candidates that clear the inclusion threshold
//! and returns them ranked by confidence.
//!
//! ```text
//! for each page, in order:
//!     prepare (RGB, cap longest edge) ──▶ client.answer ──▶ filter ──▶ accumulate
//!     Quick mode and last kept score > stop threshold?  ──▶ stop
//! stable sort by score, descending
//! ```
//!
//! Pages are processed strictly one at a time. A failed page contributes
//! nothing, is reported through [`crate::progress::SearchProgressCallback`]
//! and [`SearchResult::failures`], and the scan moves on.

use crate::config::{SearchConfig, SearchMode, SearchPolicy};
use crate::error::{DocQaError, PageError};
use crate::output::{AnswerCandidate, SearchResult, SearchStats};
use crate::pipeline::inference::{resolve_client, InferenceClient, InferenceParams, RawAnswer};
use crate::pipeline::preprocess::prepare_page;
use crate::pipeline::render::PageImage;
use crate::progress::ProgressCallback;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What one page contributed.
#[derive(Debug, Clone, Default)]
pub struct PageAnswers {
    /// Candidates that passed the inclusion filter, in model order.
    pub kept: Vec<AnswerCandidate>,
    /// How many raw answers the model returned.
    pub raw_count: usize,
}

/// Drives an [`InferenceClient`] across a document.
pub struct AnswerSearchEngine {
    client: Arc<dyn InferenceClient>,
    params: InferenceParams,
    policy: SearchPolicy,
    progress: Option<ProgressCallback>,
}

impl AnswerSearchEngine {
    /// Engine over an explicit client; parameters and policy come from `config`.
    pub fn new(client: Arc<dyn InferenceClient>, config: &SearchConfig) -> Self {
        Self {
            client,
            params: config.inference_params(),
            policy: config.policy(),
            progress: config.progress_callback.clone(),
        }
    }

    /// Engine over the client described by `config`.
    pub async fn from_config(config: &SearchConfig) -> Result<Self, DocQaError> {
        config.validate()?;
        let client = resolve_client(config).await?;
        Ok(Self::new(client, config))
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    pub fn policy(&self) -> &SearchPolicy {
        &self.policy
    }

    /// Search `pages` for answers to `question`.
    ///
    /// # Errors
    /// - [`DocQaError::EmptyQuestion`] if `question` is blank; no page is
    ///   searched and no callback fires.
    /// - [`DocQaError::EmptyDocument`] if `pages` is empty.
    ///
    /// Page failures are not errors: see [`SearchResult::failures`].
    pub async fn search(
        &self,
        pages: &[PageImage],
        question: &str,
        mode: SearchMode,
    ) -> Result<SearchResult, DocQaError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(DocQaError::EmptyQuestion);
        }
        if pages.is_empty() {
            return Err(DocQaError::EmptyDocument);
        }

        let start = Instant::now();
        let total = pages.len();
        info!(
            "Searching {} pages ({} mode) with {}: {:?}",
            total,
            mode,
            self.client.name(),
            question
        );

        if let Some(ref cb) = self.progress {
            cb.on_search_start(total);
        }

        let mut answers: Vec<AnswerCandidate> = Vec::new();
        let mut failures: Vec<PageError> = Vec::new();
        let mut raw_candidates = 0usize;
        let mut scanned = 0usize;
        let mut stopped_early = false;
        let mut inference_duration_ms = 0u64;

        for (idx, page) in pages.iter().enumerate() {
            let page_num = idx + 1;
            if let Some(ref cb) = self.progress {
                cb.on_page_start(page_num, total);
            }

            let page_start = Instant::now();
            let outcome = self.search_page(page_num, page, question).await;
            inference_duration_ms += page_start.elapsed().as_millis() as u64;
            scanned += 1;

            let mut stop = false;
            match outcome {
                Ok(page_answers) => {
                    raw_candidates += page_answers.raw_count;
                    answers.extend(page_answers.kept);
                    stop = mode == SearchMode::Quick
                        && answers.last().is_some_and(|c| self.policy.stops(c.score));
                }
                Err(e) => {
                    warn!("{}", e);
                    if let Some(ref cb) = self.progress {
                        cb.on_page_error(page_num, &e.to_string());
                    }
                    failures.push(e);
                }
            }

            if let Some(ref cb) = self.progress {
                cb.on_page_done(scanned, total);
            }

            if stop {
                stopped_early = scanned < total;
                debug!(
                    "Confident answer on page {} (> {}), stopping",
                    page_num, self.policy.stop_threshold
                );
                break;
            }
        }
        rank(&mut answers);

        if let Some(ref cb) = self.progress {
            cb.on_search_complete(scanned, total, answers.len());
        }

        let stats = SearchStats {
            mode,
            total_pages: total,
            pages_scanned: scanned,
            failed_pages: failures.len(),
            raw_candidates,
            stopped_early,
            inference_duration_ms,
            total_duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Search complete: {} answers from {}/{} pages ({} failed), {}ms",
            answers.len(),
            scanned,
            total,
            stats.failed_pages,
            stats.total_duration_ms
        );

        Ok(SearchResult {
            question: question.to_string(),
            answers,
            failures,
            stats,
        })
    }

    /// Ask the client about a single page and filter what comes back.
    ///
    /// Always returns a value: a client error becomes
    /// [`PageError::InferenceFailed`] for this page only.
    pub async fn search_page(
        &self,
        page_num: usize,
        page: &PageImage,
        question: &str,
    ) -> Result<PageAnswers, PageError> {
        let prepared = prepare_page(page.image(), self.policy.max_image_dimension);
        let page_start = Instant::now();

        let raw = self
            .client
            .answer(question, &prepared, &self.params)
            .await
            .map_err(|e| PageError::InferenceFailed {
                page: page_num,
                detail: e.to_string(),
            })?;

        let raw_count = raw.len();
        let kept = filter_answers(page_num, raw, &self.policy);
        debug!(
            "Page {}: {} raw, {} kept, {:?}",
            page_num,
            raw_count,
            kept.len(),
            page_start.elapsed()
        );

        Ok(PageAnswers { kept, raw_count })
    }

    /// Run one unfiltered call against the first page.
    ///
    /// The page is converted to RGB but not downscaled and nothing is
    /// filtered, so the raw model output can be inspected.
    pub async fn probe(
        &self,
        pages: &[PageImage],
        question: &str,
    ) -> Result<Vec<RawAnswer>, DocQaError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(DocQaError::EmptyQuestion);
        }
        let first = pages.first().ok_or(DocQaError::EmptyDocument)?;
        let prepared = prepare_page(first.image(), u32::MAX);

        let raw = self
            .client
            .answer(question, &prepared, &self.params)
            .await?;
        Ok(raw)
    }
}

/// Trim, drop empty or low-confidence answers, and attribute the rest.
pub fn filter_answers(
    page_num: usize,
    raw: Vec<RawAnswer>,
    policy: &SearchPolicy,
) -> Vec<AnswerCandidate> {
    raw.into_iter()
        .filter_map(|r| {
            let text = r.answer.trim();
            if text.is_empty() || !policy.includes(r.score) {
                return None;
            }
            Some(AnswerCandidate {
                page: page_num,
                text: text.to_string(),
                score: r.score,
            })
        })
        .collect()
}

/// Sort by score, highest first. Stable: ties keep discovery order.
pub fn rank(answers: &mut [AnswerCandidate]) {
    answers.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}
