//! Specular reflection: share of bright spots after noise suppression.
//!
//! Screens and glossy prints throw large specular patches; skin under normal
//! lighting rarely saturates. Lower ratios are better.

use super::{require_min_side, SignalOutcome, Unavailable};
use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;

/// Sigma equivalent to a 5×5 Gaussian kernel with automatic sigma.
const BLUR_SIGMA: f32 = 1.1;

/// Fraction of blurred pixels strictly brighter than `cutoff`.
pub fn bright_pixel_ratio(gray: &GrayImage, cutoff: u8) -> Result<f32, Unavailable> {
    let (w, h) = gray.dimensions();
    require_min_side(w, h)?;

    let blurred = gaussian_blur_f32(gray, BLUR_SIGMA);
    let total = blurred.as_raw().len();
    let bright = blurred.as_raw().iter().filter(|&&p| p > cutoff).count();

    Ok(bright as f32 / total as f32)
}

pub fn analyze(gray: &GrayImage, cutoff: u8, max_ratio: f32) -> SignalOutcome {
    SignalOutcome::from_result(
        bright_pixel_ratio(gray, cutoff).map(|ratio| (ratio, ratio <= max_ratio)),
    )
}
