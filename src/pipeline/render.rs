//! PDF rasterisation: turn PDF bytes into one [`PageImage`] per page.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is CPU-bound and not
//! async-aware. `tokio::task::spawn_blocking` moves rendering onto the
//! blocking pool so Tokio worker threads never stall on a large document.
//!
//! ## Why two caps?
//!
//! Pages render at a fixed DPI (300 by default) so small print stays
//! legible, bounded by `max_rendered_pixels` so an A0 poster cannot exhaust
//! memory. The engine later downscales a copy to the model's input size;
//! the stored page keeps full resolution for previews.

use crate::config::SearchConfig;
use crate::error::DocQaError;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// One rasterised page. Immutable once created.
#[derive(Debug, Clone)]
pub struct PageImage {
    page_num: usize,
    image: Arc<DynamicImage>,
}

impl PageImage {
    /// Wrap an image as page `page_num` (1-indexed).
    pub fn new(page_num: usize, image: DynamicImage) -> Self {
        Self {
            page_num,
            image: Arc::new(image),
        }
    }

    /// 1-indexed page number.
    pub fn page_num(&self) -> usize {
        self.page_num
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

/// Turns PDF bytes into an ordered list of page images.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Rasterise every page, in document order.
    ///
    /// Any failure is fatal for the whole document; there is no retry.
    async fn load(&self, pdf_bytes: &[u8]) -> Result<Vec<PageImage>, DocQaError>;
}

/// [`DocumentLoader`] backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumLoader {
    dpi: u32,
    max_rendered_pixels: u32,
    password: Option<String>,
}

impl PdfiumLoader {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_rendered_pixels: config.max_rendered_pixels,
            password: config.password.clone(),
        }
    }
}

#[async_trait]
impl DocumentLoader for PdfiumLoader {
    async fn load(&self, pdf_bytes: &[u8]) -> Result<Vec<PageImage>, DocQaError> {
        let bytes = pdf_bytes.to_vec();
        let loader = self.clone();

        tokio::task::spawn_blocking(move || loader.load_blocking(&bytes))
            .await
            .map_err(|e| DocQaError::Internal(format!("Render task panicked: {}", e)))?
    }
}

impl PdfiumLoader {
    fn load_blocking(&self, bytes: &[u8]) -> Result<Vec<PageImage>, DocQaError> {
        let pdfium = bind_pdfium()?;
        let password = self.password.as_deref();

        let document = pdfium
            .load_pdf_from_byte_slice(bytes, password)
            .map_err(|e| match e {
                PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                    if password.is_some() {
                        DocQaError::WrongPassword
                    } else {
                        DocQaError::PasswordRequired
                    }
                }
                other => DocQaError::CorruptPdf {
                    detail: other.to_string(),
                },
            })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        if total_pages == 0 {
            return Err(DocQaError::EmptyDocument);
        }
        info!("PDF loaded: {} pages", total_pages);

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.dpi as f32 / 72.0)
            .set_maximum_width(self.max_rendered_pixels as i32)
            .set_maximum_height(self.max_rendered_pixels as i32);

        let mut results = Vec::with_capacity(total_pages);

        for (idx, page) in pages.iter().enumerate() {
            let page_num = idx + 1;
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                DocQaError::RasterisationFailed {
                    page: page_num,
                    detail: e.to_string(),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                page_num,
                image.width(),
                image.height()
            );

            results.push(PageImage::new(page_num, image));
        }

        Ok(results)
    }
}

/// Bind to a pdfium shared library.
///
/// Lookup order: `PDFIUM_LIB_PATH` (a library file or the directory holding
/// it), the working directory, then the system library path.
fn bind_pdfium() -> Result<Pdfium, DocQaError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => {
            let path = PathBuf::from(&p);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            Pdfium::bind_to_library(lib)
        }
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| DocQaError::PdfiumBindingFailed(e.to_string()))?;

    Ok(Pdfium::new(bindings))
}
