//! The inference-client seam and what flows across it.
//!
//! The search engine only knows [`InferenceClient`]: hand it a question and
//! a page image, get back zero or more raw `(answer, score)` pairs. Two
//! implementations ship with the crate ([`crate::pipeline::docqa`] and
//! [`crate::pipeline::llm`]); tests plug in scripted fakes.

use crate::config::{InferenceBackend, SearchConfig};
use crate::error::{DocQaError, InferenceError};
use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Pass-through model parameters for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceParams {
    /// Candidate answers requested.
    pub top_k: usize,
    /// Maximum model input length in tokens.
    pub max_length: usize,
    /// Maximum answer length in tokens.
    pub max_answer_length: usize,
}

impl Default for InferenceParams {
    fn default() -> Self {
        SearchConfig::default().inference_params()
    }
}

/// One unfiltered answer as returned by a model.
///
/// Missing fields deserialise to an empty answer and a zero score, which the
/// engine then discards.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawAnswer {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub score: f64,
}

impl RawAnswer {
    pub fn new(answer: impl Into<String>, score: f64) -> Self {
        Self {
            answer: answer.into(),
            score,
        }
    }
}

/// A model reply: a single answer object or a list of them.
///
/// List entries are kept as raw JSON so one malformed entry (a `null`, a
/// number, a non-numeric score) does not discard the rest of the page.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawResponse {
    Many(Vec<serde_json::Value>),
    One(RawAnswer),
}

impl RawResponse {
    /// Normalise to a sequence, skipping list entries that are not answer
    /// objects.
    pub fn into_answers(self) -> Vec<RawAnswer> {
        match self {
            RawResponse::Many(v) => answers_from_values(v),
            RawResponse::One(a) => vec![a],
        }
    }
}

/// Decode the object entries of a JSON list; anything else is dropped.
pub fn answers_from_values(values: Vec<serde_json::Value>) -> Vec<RawAnswer> {
    values
        .into_iter()
        .filter(|v| v.is_object())
        .filter_map(|v| match serde_json::from_value::<RawAnswer>(v) {
            Ok(a) => Some(a),
            Err(e) => {
                warn!("Skipping malformed answer entry: {}", e);
                None
            }
        })
        .collect()
}

/// Answers a question about one page image.
///
/// Implementations may be slow and may fail; the engine calls them strictly
/// one page at a time and treats any error as local to that page.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Short name for logs, e.g. `"docqa:impira/layoutlm-document-qa"`.
    fn name(&self) -> &str;

    /// Return up to `params.top_k` candidate answers for `question`.
    async fn answer(
        &self,
        question: &str,
        image: &DynamicImage,
        params: &InferenceParams,
    ) -> Result<Vec<RawAnswer>, InferenceError>;
}

/// Build the client described by `config`.
///
/// A pre-built [`SearchConfig::client`] wins; otherwise the configured
/// [`InferenceBackend`] is constructed.
pub async fn resolve_client(config: &SearchConfig) -> Result<Arc<dyn InferenceClient>, DocQaError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }

    match config.backend {
        InferenceBackend::DocQa => {
            let client = crate::pipeline::docqa::DocQaHttpClient::from_config(config)?;
            Ok(Arc::new(client))
        }
        InferenceBackend::Vlm => {
            let client = crate::pipeline::llm::VlmClient::from_config(config).await?;
            Ok(Arc::new(client))
        }
    }
}

/// Retry policy shared by the bundled clients.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out.
    ///
    /// Backoff doubles after each attempt: `backoff_ms`, `2×`, `4×`, …
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, InferenceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, InferenceError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = self.backoff_ms.saturating_mul(1u64 << (attempt - 1).min(16));
                    warn!(
                        "{}: attempt {} failed: {}; retry {}/{} after {}ms",
                        label, attempt, e, attempt, self.max_retries, backoff
                    );
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
