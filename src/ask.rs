//! One-shot entry points: load a PDF and answer one question.
//!
//! For repeated questions against the same document, hold a
//! [`crate::session::DocumentSession`] and an
//! [`crate::search::AnswerSearchEngine`] instead; these helpers render the
//! document on every call.

use crate::config::SearchConfig;
use crate::error::DocQaError;
use crate::output::{DocumentInfo, SearchResult};
use crate::pipeline::inference::RawAnswer;
use crate::pipeline::input;
use crate::pipeline::render::{DocumentLoader, PdfiumLoader};
use crate::search::AnswerSearchEngine;
use crate::session::DocumentSession;
use tracing::info;

/// Answer `question` from a PDF file or URL.
///
/// # Arguments
/// * `input`: local file path or HTTP/HTTPS URL to a PDF
/// * `question`: free text; must not be blank
/// * `config`: loader, model and policy settings
///
/// # Returns
/// `Ok(SearchResult)` even when no answer was found or some pages failed
/// (check `result.failures`).
///
/// # Errors
/// - [`DocQaError::EmptyQuestion`] before anything is loaded
/// - input and load errors (not found, not a PDF, password, ...)
/// - [`DocQaError::ProviderNotConfigured`] if the backend cannot be built
pub async fn ask(
    input: impl AsRef<str>,
    question: &str,
    config: &SearchConfig,
) -> Result<SearchResult, DocQaError> {
    if question.trim().is_empty() {
        return Err(DocQaError::EmptyQuestion);
    }
    config.validate()?;

    let engine = AnswerSearchEngine::from_config(config).await?;
    let session = open(input.as_ref(), config).await?;
    session.search(question, config.mode, &engine).await
}

/// Synchronous wrapper around [`ask`].
///
/// Creates a temporary tokio runtime internally.
pub fn ask_sync(
    input: impl AsRef<str>,
    question: &str,
    config: &SearchConfig,
) -> Result<SearchResult, DocQaError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocQaError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(ask(input, question, config))
}

/// Answer `question` from PDF bytes already in memory.
pub async fn ask_bytes(
    name: &str,
    bytes: &[u8],
    question: &str,
    config: &SearchConfig,
) -> Result<SearchResult, DocQaError> {
    if question.trim().is_empty() {
        return Err(DocQaError::EmptyQuestion);
    }
    config.validate()?;
    input::check_pdf_magic(name, bytes)?;

    let engine = AnswerSearchEngine::from_config(config).await?;
    let mut session = DocumentSession::new();
    session.load(name, bytes, &PdfiumLoader::new(config)).await?;
    session.search(question, config.mode, &engine).await
}

/// Resolve, download if needed, and rasterise a PDF into a fresh session.
pub async fn open(input: &str, config: &SearchConfig) -> Result<DocumentSession, DocQaError> {
    let mut session = DocumentSession::new();
    load_into(&mut session, input, config, &PdfiumLoader::new(config)).await?;
    Ok(session)
}

/// Resolve `input` and load it into `session` with `loader`.
///
/// Same-name inputs are not reprocessed; see [`DocumentSession::load`].
pub async fn load_into(
    session: &mut DocumentSession,
    input: &str,
    config: &SearchConfig,
    loader: &dyn DocumentLoader,
) -> Result<(), DocQaError> {
    let resolved = input::resolve_input(input, config.download_timeout_secs).await?;
    info!("Resolved '{}' ({} bytes)", resolved.name, resolved.bytes.len());
    session.load(&resolved.name, &resolved.bytes, loader).await?;
    Ok(())
}

/// Name, page count and first-page size of a PDF.
///
/// Does not require an inference backend or API key.
pub async fn inspect(input: impl AsRef<str>, config: &SearchConfig) -> Result<DocumentInfo, DocQaError> {
    let session = open(input.as_ref(), config).await?;
    session.info().ok_or(DocQaError::EmptyDocument)
}

/// One raw, unfiltered inference call against the first page of a PDF.
///
/// For checking what the model returns before thresholds are applied.
pub async fn probe(
    input: impl AsRef<str>,
    question: &str,
    config: &SearchConfig,
) -> Result<Vec<RawAnswer>, DocQaError> {
    if question.trim().is_empty() {
        return Err(DocQaError::EmptyQuestion);
    }
    let engine = AnswerSearchEngine::from_config(config).await?;
    let session = open(input.as_ref(), config).await?;
    engine.probe(session.pages(), question).await
}
