//! Pipeline stages between a PDF and a list of raw answers.
//!
//! Each submodule does one job and can be tested alone. The engine in
//! [`crate::search`] strings them together per page.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ preprocess ──▶ inference ──▶ (engine filters/ranks)
//! (path/URL) (pdfium)  (RGB, ≤1000px)  (docqa | llm)
//! ```
//!
//! 1. [`input`]: resolve a path or URL to PDF bytes and check the magic.
//! 2. [`render`]: rasterise every page once per document, in
//!    `spawn_blocking` because pdfium is not async-safe.
//! 3. [`preprocess`]: convert a page to RGB and cap its longest edge,
//!    per inference call. The stored page is left alone.
//! 4. [`inference`]: the [`inference::InferenceClient`] seam plus retry.
//!    [`docqa`] talks to a document-QA HTTP endpoint; [`llm`] asks a vision
//!    LLM and parses its JSON reply. Both use [`encode`] for the image.

pub mod docqa;
pub mod encode;
pub mod inference;
pub mod input;
pub mod llm;
pub mod preprocess;
pub mod render;
