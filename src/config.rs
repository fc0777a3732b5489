//! Configuration types for document question answering.
//!
//! All search behaviour is controlled through [`SearchConfig`], built via its
//! [`SearchConfigBuilder`]. One struct holds the loader settings, the
//! pass-through model parameters and the answer-selection policy, so two
//! runs can be compared by diffing their configs.

use crate::error::DocQaError;
use crate::pipeline::inference::{InferenceClient, InferenceParams};
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Candidates scoring at or below this are discarded.
pub const DEFAULT_INCLUSION_THRESHOLD: f64 = 0.01;

/// In [`SearchMode::Quick`], a candidate scoring above this ends the scan.
pub const DEFAULT_STOP_THRESHOLD: f64 = 0.05;

/// Longest edge, in pixels, of the image handed to the model.
pub const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 1000;

/// Default document-QA model served by the HTTP backend.
pub const DEFAULT_DOCQA_MODEL: &str = "impira/layoutlm-document-qa";

/// Default vision LLM for the VLM backend.
pub const DEFAULT_VLM_MODEL: &str = "gpt-4.1-nano";

/// Configuration for loading a PDF and searching it for answers.
///
/// Built via [`SearchConfig::builder()`] or using [`SearchConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docqa::{SearchConfig, SearchMode};
///
/// let config = SearchConfig::builder()
///     .mode(SearchMode::Thorough)
///     .top_k(5)
///     .stop_threshold(0.2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SearchConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–400. Default: 300.
    pub dpi: u32,

    /// Safety cap on the rendered bitmap's longest edge in pixels. Default: 4000.
    ///
    /// Independent of [`Self::max_image_dimension`]: this bounds memory while
    /// the whole document is held, the other bounds what the model sees.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Longest edge of the image sent to the model. Default: 1000.
    ///
    /// Larger pages are downscaled with a Lanczos filter, preserving aspect
    /// ratio, before each inference call.
    pub max_image_dimension: u32,

    /// Candidate answers requested per page. Default: 3.
    pub top_k: usize,

    /// Maximum model input length in tokens. Default: 512.
    pub max_length: usize,

    /// Maximum answer length in tokens. Default: 200.
    pub max_answer_length: usize,

    /// Minimum score (exclusive) for a candidate to be kept. Default: 0.01.
    pub inclusion_threshold: f64,

    /// Score (exclusive) that ends a Quick-mode scan. Default: 0.05.
    pub stop_threshold: f64,

    /// Scan policy. Default: [`SearchMode::Quick`].
    pub mode: SearchMode,

    /// Which inference client to build when [`Self::client`] is unset.
    pub backend: InferenceBackend,

    /// Document-QA endpoint URL. If None, the hosted inference URL for
    /// [`Self::model`] is used.
    pub endpoint: Option<String>,

    /// Bearer token for the document-QA endpoint. Falls back to `HF_TOKEN`.
    pub api_token: Option<String>,

    /// Model identifier. Its meaning depends on [`Self::backend`].
    pub model: Option<String>,

    /// LLM provider name for the VLM backend (e.g. "openai", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider for the VLM backend. Takes precedence
    /// over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed inference client. Takes precedence over everything
    /// backend-related.
    pub client: Option<Arc<dyn InferenceClient>>,

    /// Sampling temperature for the VLM backend. Default: 0.0.
    pub temperature: f32,

    /// Retry attempts per inference call on a transient failure. Default: 2.
    ///
    /// Retries happen inside the client; the engine sees one call per page.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-inference-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: 4000,
            password: None,
            max_image_dimension: DEFAULT_MAX_IMAGE_DIMENSION,
            top_k: 3,
            max_length: 512,
            max_answer_length: 200,
            inclusion_threshold: DEFAULT_INCLUSION_THRESHOLD,
            stop_threshold: DEFAULT_STOP_THRESHOLD,
            mode: SearchMode::default(),
            backend: InferenceBackend::default(),
            endpoint: None,
            api_token: None,
            model: None,
            provider_name: None,
            provider: None,
            client: None,
            temperature: 0.0,
            max_retries: 2,
            retry_backoff_ms: 500,
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("max_image_dimension", &self.max_image_dimension)
            .field("top_k", &self.top_k)
            .field("max_length", &self.max_length)
            .field("max_answer_length", &self.max_answer_length)
            .field("inclusion_threshold", &self.inclusion_threshold)
            .field("stop_threshold", &self.stop_threshold)
            .field("mode", &self.mode)
            .field("backend", &self.backend)
            .field("endpoint", &self.endpoint)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("client", &self.client.as_ref().map(|c| c.name().to_string()))
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl SearchConfig {
    /// Create a new builder for `SearchConfig`.
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder {
            config: Self::default(),
        }
    }

    /// The pass-through parameters for one inference call.
    pub fn inference_params(&self) -> InferenceParams {
        InferenceParams {
            top_k: self.top_k,
            max_length: self.max_length,
            max_answer_length: self.max_answer_length,
        }
    }

    /// The answer-selection policy.
    pub fn policy(&self) -> SearchPolicy {
        SearchPolicy {
            inclusion_threshold: self.inclusion_threshold,
            stop_threshold: self.stop_threshold,
            max_image_dimension: self.max_image_dimension,
        }
    }

    /// Check the invariants the builder enforces.
    ///
    /// Public so configs mutated after `build()` can be re-checked.
    pub fn validate(&self) -> Result<(), DocQaError> {
        if self.dpi < 72 || self.dpi > 400 {
            return Err(DocQaError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                self.dpi
            )));
        }
        for (name, value) in [
            ("inclusion threshold", self.inclusion_threshold),
            ("stop threshold", self.stop_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DocQaError::InvalidConfig(format!(
                    "{name} must be within 0.0–1.0, got {value}"
                )));
            }
        }
        if self.inclusion_threshold > self.stop_threshold {
            return Err(DocQaError::InvalidConfig(format!(
                "inclusion threshold ({}) must not exceed stop threshold ({})",
                self.inclusion_threshold, self.stop_threshold
            )));
        }
        if self.top_k == 0 {
            return Err(DocQaError::InvalidConfig("top_k must be ≥ 1".into()));
        }
        if self.max_image_dimension == 0 {
            return Err(DocQaError::InvalidConfig(
                "max image dimension must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`SearchConfig`].
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl fmt::Debug for SearchConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl SearchConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn max_image_dimension(mut self, px: u32) -> Self {
        self.config.max_image_dimension = px;
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.config.max_length = n;
        self
    }

    pub fn max_answer_length(mut self, n: usize) -> Self {
        self.config.max_answer_length = n;
        self
    }

    pub fn inclusion_threshold(mut self, t: f64) -> Self {
        self.config.inclusion_threshold = t;
        self
    }

    pub fn stop_threshold(mut self, t: f64) -> Self {
        self.config.stop_threshold = t;
        self
    }

    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn backend(mut self, backend: InferenceBackend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = Some(url.into());
        self
    }

    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.config.api_token = Some(token.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn client(mut self, client: Arc<dyn InferenceClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SearchConfig, DocQaError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Whether a search may stop before visiting every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Stop as soon as a sufficiently confident answer is found. (default)
    #[default]
    Quick,
    /// Always scan every page.
    Thorough,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Quick => f.write_str("quick"),
            SearchMode::Thorough => f.write_str("thorough"),
        }
    }
}

/// Which kind of model answers the questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceBackend {
    /// Extractive document-QA model behind an HTTP endpoint. (default)
    #[default]
    DocQa,
    /// Vision LLM asked to answer in JSON.
    Vlm,
}

/// Thresholds and image cap applied by the search engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchPolicy {
    pub inclusion_threshold: f64,
    pub stop_threshold: f64,
    pub max_image_dimension: u32,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        SearchConfig::default().policy()
    }
}

impl SearchPolicy {
    /// Whether a candidate with this score is kept. NaN is never kept.
    pub fn includes(&self, score: f64) -> bool {
        score > self.inclusion_threshold
    }

    /// Whether this score ends a Quick-mode scan.
    pub fn stops(&self, score: f64) -> bool {
        score > self.stop_threshold
    }
}
