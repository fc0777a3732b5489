//! # edgequake-docqa
//!
//! Ask natural-language questions about a PDF and get back short answers
//! with confidence scores and the page each answer came from.
//!
//! ## How it works
//!
//! Every page is rasterised once when the document is loaded. For each
//! question the pages are visited in order: the page is converted to RGB,
//! capped at 1000 px on its longest edge, and handed to a document-QA model
//! together with the question. Candidates above the inclusion threshold
//! are kept, and in [`SearchMode::Quick`] the scan stops at the first page
//! that yields a confident answer. Survivors are ranked by score.
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Render     rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Prepare    RGB + Lanczos downscale, per call
//!  ├─ 4. Infer      document-QA endpoint or vision LLM, one page at a time
//!  ├─ 5. Filter     drop blank answers and scores ≤ 0.01, early stop > 0.05
//!  └─ 6. Rank       stable sort by score, best first
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docqa::{ask, SearchConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Hosted impira/layoutlm-document-qa; token from HF_TOKEN
//!     let config = SearchConfig::default();
//!     let result = ask("invoice.pdf", "What is the invoice total?", &config).await?;
//!     for (i, a) in result.answers.iter().enumerate() {
//!         println!("Answer {} - Page {} (Confidence: {})", i + 1, a.page, a.confidence_percent());
//!         println!("{}", a.text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docqa` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docqa = { version = "0.1", default-features = false }
//! ```
//!
//! ## Backends
//!
//! | Backend | Model | Notes |
//! |---------|-------|-------|
//! | `docqa` | `impira/layoutlm-document-qa` | Extractive, calibrated scores. Default |
//! | `vlm`   | `gpt-4.1-nano`, `claude-*`, `gemini-*`, ... | Any `edgequake-llm` vision provider; self-reported scores |
//!
//! Any other model can be plugged in by implementing
//! [`InferenceClient`] and passing it via [`SearchConfigBuilder::client`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod ask;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod search;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use ask::{ask, ask_bytes, ask_sync, inspect, open, probe};
pub use config::{InferenceBackend, SearchConfig, SearchConfigBuilder, SearchMode, SearchPolicy};
pub use error::{DocQaError, InferenceError, PageError};
pub use output::{AnswerCandidate, DocumentInfo, SearchResult, SearchStats};
pub use pipeline::inference::{InferenceClient, InferenceParams, RawAnswer};
pub use pipeline::render::{DocumentLoader, PageImage, PdfiumLoader};
pub use progress::{NoopProgressCallback, ProgressCallback, SearchProgressCallback};
pub use search::AnswerSearchEngine;
pub use session::{DocumentSession, LoadOutcome};
