//! Input resolution: turn a user-supplied path or URL into PDF bytes.
//!
//! The loader works on an in-memory byte slice, so a URL is downloaded
//! straight into memory and a local file is read whole. The `%PDF` magic
//! bytes are checked here so callers get a meaningful error rather than a
//! pdfium parse failure.

use crate::error::DocQaError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A PDF ready to hand to a [`crate::pipeline::render::DocumentLoader`].
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    /// Display name: the file name, or the last URL path segment.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to PDF bytes.
///
/// If the input is a URL, download it. If it is a local file, read it.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, DocQaError> {
    if input.trim().is_empty() {
        return Err(DocQaError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

/// Fail with [`DocQaError::NotAPdf`] unless `bytes` starts with `%PDF`.
pub fn check_pdf_magic(name: &str, bytes: &[u8]) -> Result<(), DocQaError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        return Err(DocQaError::NotAPdf {
            name: name.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        });
    }
    Ok(())
}

async fn read_local(path: &Path) -> Result<ResolvedInput, DocQaError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => DocQaError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => DocQaError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let name = file_name(path);
    check_pdf_magic(&name, &bytes)?;

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(ResolvedInput { name, bytes })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, DocQaError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocQaError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocQaError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocQaError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DocQaError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| DocQaError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    let name = url_file_name(url);
    check_pdf_magic(&name, &bytes)?;

    info!("Downloaded {} bytes as '{}'", bytes.len(), name);
    Ok(ResolvedInput { name, bytes })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| PathBuf::from(path).display().to_string())
}

/// Extract a reasonable name from the URL path.
fn url_file_name(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}
