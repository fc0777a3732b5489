//! Image encoding: `DynamicImage` → base64 PNG.
//!
//! Both backends ship the page inside a JSON body. PNG is lossless, and text
//! crispness matters far more than payload size for a model reading the
//! page.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as a bare base64 PNG string.
pub fn encode_png_base64(img: &DynamicImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} image → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );
    Ok(b64)
}

/// Encode a page as an `ImageData` attachment for a vision LLM.
///
/// `detail: "high"` keeps fine print legible to GPT-4-class models.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let b64 = encode_png_base64(img)?;
    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
