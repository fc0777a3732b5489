//! Page preparation before each inference call.
//!
//! Document-QA models are trained on RGB input of roughly 1000 px. A page
//! rendered at 300 DPI is about 2500 × 3300 px, so it is converted to RGB
//! and, if its longest edge is over the cap, downscaled with Lanczos3.

use image::imageops::FilterType;
use image::DynamicImage;
use std::borrow::Cow;
use tracing::debug;

/// Convert `img` to RGB and cap its longest edge at `max_dim`.
///
/// Returns the input untouched (borrowed) when it is already RGB and small
/// enough. When downscaling, the longest edge becomes exactly `max_dim` and
/// the other edge is scaled by the same ratio, rounded down, never below 1.
pub fn prepare_page(img: &DynamicImage, max_dim: u32) -> Cow<'_, DynamicImage> {
    let rgb: Cow<'_, DynamicImage> = match img {
        DynamicImage::ImageRgb8(_) => Cow::Borrowed(img),
        other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
    };

    match scaled_size(rgb.width(), rgb.height(), max_dim) {
        None => rgb,
        Some((w, h)) => {
            debug!(
                "Downscaling {}x{} → {}x{}",
                rgb.width(),
                rgb.height(),
                w,
                h
            );
            Cow::Owned(rgb.resize_exact(w, h, FilterType::Lanczos3))
        }
    }
}

/// Target size for a `width × height` image capped at `max_dim`, or `None`
/// when no downscale is needed.
pub fn scaled_size(width: u32, height: u32, max_dim: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest <= max_dim || max_dim == 0 {
        return None;
    }

    let scale = |edge: u32| -> u32 {
        ((u64::from(edge) * u64::from(max_dim)) / u64::from(longest)).max(1) as u32
    };

    if width >= height {
        Some((max_dim, scale(height)))
    } else {
        Some((scale(width), max_dim))
    }
}
