//! Micro-texture entropy via Local Binary Patterns.
//!
//! Live skin carries fine, irregular texture; prints and screens flatten it.
//! Every interior pixel is compared against its 8 neighbours to form an 8-bit
//! code, and the Shannon entropy of the code histogram (normalized by its
//! 8-bit maximum) is the texture score.

use super::{require_min_side, SignalOutcome, Unavailable};
use image::GrayImage;
use imageproc::local_binary_patterns::local_binary_pattern;

const LBP_BINS: usize = 256;
const LBP_MAX_ENTROPY_BITS: f64 = 8.0;

/// 256-bin histogram of LBP codes over all interior pixels.
fn lbp_histogram(gray: &GrayImage) -> ([u32; LBP_BINS], u32) {
    let (w, h) = gray.dimensions();
    let mut hist = [0u32; LBP_BINS];
    let mut total = 0u32;

    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            if let Some(code) = local_binary_pattern(gray, x, y) {
                hist[code as usize] += 1;
                total += 1;
            }
        }
    }

    (hist, total)
}

/// Normalized LBP entropy in [0, 1].
pub fn lbp_entropy(gray: &GrayImage) -> Result<f32, Unavailable> {
    let (w, h) = gray.dimensions();
    require_min_side(w, h)?;

    let (hist, total) = lbp_histogram(gray);
    if total == 0 {
        return Err(Unavailable::RegionTooSmall { width: w, height: h });
    }

    let total = total as f64;
    let entropy: f64 = hist
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum();

    Ok((entropy / LBP_MAX_ENTROPY_BITS).min(1.0) as f32)
}

pub fn analyze(gray: &GrayImage, threshold: f32) -> SignalOutcome {
    SignalOutcome::from_result(lbp_entropy(gray).map(|score| (score, score > threshold)))
}
