//! The loaded-document context.
//!
//! A [`DocumentSession`] owns at most one rasterised document and the name
//! it was loaded under. Callers pass it explicitly; nothing is global. The
//! interactive CLI keeps one alive for the whole prompt loop, so a PDF is
//! rendered once and then questioned any number of times.

use crate::config::SearchMode;
use crate::error::DocQaError;
use crate::output::{DocumentInfo, SearchResult};
use crate::pipeline::render::{DocumentLoader, PageImage};
use crate::search::AnswerSearchEngine;
use tracing::{info, warn};

#[derive(Debug, Clone)]
struct LoadedDocument {
    name: String,
    pages: Vec<PageImage>,
}

/// Holds the current document, if any.
#[derive(Debug, Clone, Default)]
pub struct DocumentSession {
    current: Option<LoadedDocument>,
}

/// What [`DocumentSession::load`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The document was rasterised and now replaces any previous one.
    Loaded { page_count: usize },
    /// A document with this name is already loaded; nothing was done.
    Unchanged,
}

impl DocumentSession {
    /// A session with no document. Searches fail with
    /// [`DocQaError::NoDocumentLoaded`] until a load succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `bytes` under `name`, unless a document with the same name is
    /// already held.
    ///
    /// On success the previous document is replaced wholesale. On failure it
    /// is cleared, so searching is refused until the next successful load.
    pub async fn load(
        &mut self,
        name: &str,
        bytes: &[u8],
        loader: &dyn DocumentLoader,
    ) -> Result<LoadOutcome, DocQaError> {
        if self.document_name() == Some(name) {
            info!("'{}' is already loaded", name);
            return Ok(LoadOutcome::Unchanged);
        }
        self.reload(name, bytes, loader).await
    }

    /// Load `bytes` under `name` unconditionally.
    pub async fn reload(
        &mut self,
        name: &str,
        bytes: &[u8],
        loader: &dyn DocumentLoader,
    ) -> Result<LoadOutcome, DocQaError> {
        match loader.load(bytes).await {
            Ok(pages) if pages.is_empty() => {
                self.current = None;
                Err(DocQaError::EmptyDocument)
            }
            Ok(pages) => {
                let page_count = pages.len();
                info!("Loaded '{}': {} pages", name, page_count);
                self.current = Some(LoadedDocument {
                    name: name.to_string(),
                    pages,
                });
                Ok(LoadOutcome::Loaded { page_count })
            }
            Err(e) => {
                warn!("Failed to load '{}': {}", name, e);
                self.current = None;
                Err(e)
            }
        }
    }

    /// Drop the current document.
    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.current.is_some()
    }

    pub fn document_name(&self) -> Option<&str> {
        self.current.as_ref().map(|d| d.name.as_str())
    }

    /// The held pages, in document order. Empty when nothing is loaded.
    pub fn pages(&self) -> &[PageImage] {
        self.current.as_ref().map(|d| d.pages.as_slice()).unwrap_or(&[])
    }

    /// Name, page count and first-page size of the held document.
    pub fn info(&self) -> Option<DocumentInfo> {
        let doc = self.current.as_ref()?;
        let first = doc.pages.first()?;
        Some(DocumentInfo {
            name: doc.name.clone(),
            page_count: doc.pages.len(),
            first_page_size: (first.width(), first.height()),
        })
    }

    /// Search the held document.
    ///
    /// # Errors
    /// [`DocQaError::EmptyQuestion`] is checked first, then
    /// [`DocQaError::NoDocumentLoaded`].
    pub async fn search(
        &self,
        question: &str,
        mode: SearchMode,
        engine: &AnswerSearchEngine,
    ) -> Result<SearchResult, DocQaError> {
        if question.trim().is_empty() {
            return Err(DocQaError::EmptyQuestion);
        }
        let doc = self.current.as_ref().ok_or(DocQaError::NoDocumentLoaded)?;
        engine.search(&doc.pages, question, mode).await
    }
}
