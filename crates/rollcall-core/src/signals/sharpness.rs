//! Edge sharpness: Canny edge density combined with Laplacian variance.
//!
//! Re-photographed prints and screens lose fine edges to defocus, moiré
//! filtering and compression. Both measures are normalized to [0, 1] against
//! fixed scales and averaged into one sharpness score.

use super::{mean_std, require_min_side, SignalOutcome, Unavailable};
use image::GrayImage;
use imageproc::edges::canny;
use imageproc::filter::laplacian_filter;

/// Normalization scales and Canny hysteresis thresholds.
#[derive(Debug, Clone, Copy)]
pub struct SharpnessParams {
    pub laplacian_scale: f32,
    pub edge_density_scale: f32,
    pub canny_low: f32,
    pub canny_high: f32,
}

/// Raw sharpness measurements for one crop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharpnessMeasure {
    /// Fraction of pixels marked as edges.
    pub edge_density: f32,
    /// Variance of the 4-neighbour Laplacian response.
    pub laplacian_variance: f32,
    /// Combined normalized score in [0, 1].
    pub sharpness: f32,
}

pub fn measure(gray: &GrayImage, params: &SharpnessParams) -> Result<SharpnessMeasure, Unavailable> {
    let (w, h) = gray.dimensions();
    require_min_side(w, h)?;
    if params.laplacian_scale <= 0.0 || params.edge_density_scale <= 0.0 {
        return Err(Unavailable::NonFinite);
    }

    let edges = canny(gray, params.canny_low, params.canny_high);
    let edge_pixels = edges.as_raw().iter().filter(|&&p| p > 0).count();
    let edge_density = edge_pixels as f32 / edges.as_raw().len() as f32;

    let laplacian = laplacian_filter(gray);
    let (_, std) = mean_std(laplacian.as_raw().iter().map(|&v| v as f64));
    let laplacian_variance = (std * std) as f32;

    let edge_norm = (edge_density / params.edge_density_scale).min(1.0);
    let laplacian_norm = (laplacian_variance / params.laplacian_scale).min(1.0);

    Ok(SharpnessMeasure {
        edge_density,
        laplacian_variance,
        sharpness: (edge_norm + laplacian_norm) / 2.0,
    })
}

pub fn analyze(gray: &GrayImage, params: &SharpnessParams, threshold: f32) -> SignalOutcome {
    match measure(gray, params) {
        Ok(m) => {
            tracing::trace!(
                edge_density = m.edge_density,
                laplacian_variance = m.laplacian_variance,
                "sharpness measured"
            );
            SignalOutcome::measured(m.sharpness, m.sharpness > threshold)
        }
        Err(reason) => SignalOutcome::Unavailable(reason),
    }
}
