//! Error types for the edgequake-docqa library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`DocQaError`]: **fatal**. The operation cannot proceed at all (bad
//!   input file, wrong password, blank question, no document loaded).
//!   Returned as `Err(DocQaError)` from the top-level functions.
//!
//! * [`PageError`]: **non-fatal**. One page could not be searched (the
//!   model call failed) but every other page is fine. Collected in
//!   [`crate::output::SearchResult::failures`] so callers can tell
//!   "no answer on this page" apart from "this page could not be processed".
//!
//! * [`InferenceError`]: what an [`crate::pipeline::inference::InferenceClient`]
//!   returns for a single call. The search engine turns it into a
//!   [`PageError`]; it never propagates past the page it belongs to.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docqa library.
#[derive(Debug, Error)]
pub enum DocQaError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read, but they are not a PDF.
    #[error("'{name}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: Vec<u8> },

    // ── Load errors ───────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired,

    /// A password was provided but it is wrong.
    #[error("Wrong password for encrypted PDF")]
    WrongPassword,

    /// The PDF parsed but contains no pages.
    #[error("PDF contains no pages")]
    EmptyDocument,

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library next to the\n\
binary, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Search errors ─────────────────────────────────────────────────────
    /// The question was empty or whitespace only. No page was searched.
    #[error("Please enter a question first: the question is empty")]
    EmptyQuestion,

    /// A search was requested before any document loaded successfully.
    #[error("No document loaded\nLoad a PDF before asking questions.")]
    NoDocumentLoaded,

    /// The configured inference backend is not initialised (missing key etc.).
    #[error("Inference backend '{backend}' is not configured.\n{hint}")]
    ProviderNotConfigured { backend: String, hint: String },

    /// A direct inference call failed (used by probing, which has no
    /// per-page isolation).
    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocQaError {
    /// True for errors that mean the document itself could not be loaded.
    ///
    /// A load error clears the current document in a
    /// [`crate::session::DocumentSession`].
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            DocQaError::NotAPdf { .. }
                | DocQaError::CorruptPdf { .. }
                | DocQaError::PasswordRequired
                | DocQaError::WrongPassword
                | DocQaError::EmptyDocument
                | DocQaError::RasterisationFailed { .. }
                | DocQaError::PdfiumBindingFailed(_)
        )
    }
}

/// A non-fatal error for a single page.
///
/// The page contributes zero candidates; the scan carries on.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The inference call for this page failed.
    #[error("Page {page}: inference failed: {detail}")]
    InferenceFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::InferenceFailed { page, .. } => *page,
        }
    }
}

/// Failure of one inference call.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Transport-level HTTP failure (DNS, TLS, connection reset).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The call did not complete within the configured timeout.
    #[error("Inference call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The endpoint answered with a non-success status.
    #[error("Inference API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body could not be understood.
    #[error("Invalid inference response: {0}")]
    InvalidResponse(String),

    /// The LLM provider returned an error.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The page image could not be encoded for the request.
    #[error("Image encoding failed: {0}")]
    Encode(String),
}

impl InferenceError {
    /// Whether another attempt may succeed.
    ///
    /// Rate limits, 5xx and timeouts are transient; 4xx and malformed
    /// responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            InferenceError::Http(_) | InferenceError::Timeout { .. } => true,
            InferenceError::Api { status, .. } => *status == 429 || *status >= 500,
            InferenceError::Provider(_) => true,
            InferenceError::InvalidResponse(_) | InferenceError::Encode(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_question_display() {
        let msg = DocQaError::EmptyQuestion.to_string();
        assert!(msg.contains("question"), "got: {msg}");
    }

    #[test]
    fn page_error_reports_page() {
        let e = PageError::InferenceFailed {
            page: 2,
            detail: "boom".into(),
        };
        assert_eq!(e.page(), 2);
        assert!(e.to_string().contains("Page 2"));
        assert!(e.to_string().contains("boom"));
    }

    #[test]
    fn load_errors_are_classified() {
        assert!(DocQaError::PasswordRequired.is_load_error());
        assert!(DocQaError::EmptyDocument.is_load_error());
        assert!(!DocQaError::EmptyQuestion.is_load_error());
        assert!(!DocQaError::InvalidConfig("x".into()).is_load_error());
    }

    #[test]
    fn retryable_statuses() {
        let rate_limited = InferenceError::Api {
            status: 429,
            message: "slow down".into(),
        };
        let loading = InferenceError::Api {
            status: 503,
            message: "model is loading".into(),
        };
        let bad_request = InferenceError::Api {
            status: 400,
            message: "bad image".into(),
        };
        assert!(rate_limited.is_retryable());
        assert!(loading.is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(InferenceError::Timeout { secs: 5 }.is_retryable());
        assert!(!InferenceError::InvalidResponse("x".into()).is_retryable());
    }
}
