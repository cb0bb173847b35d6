//! Print and replay artifacts in the frequency domain.
//!
//! Computes the 2D DFT log-magnitude spectrum of the mean-removed grayscale
//! crop and compares the mean of the strongest quartile of bins against the
//! mean of the weakest quartile. Reproductions tend to squash the spectrum's
//! dynamic range; a crop with no spectral energy at all (a flat patch) scores
//! zero. Quartiles are taken by magnitude, so bin placement (shifted or not)
//! does not affect the ratio.

use super::{require_min_side, SignalOutcome, Unavailable};
use image::GrayImage;
use ndarray::Array2;
use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;

/// Below this mean log-magnitude a quartile counts as empty.
const SPECTRAL_FLOOR: f64 = 1e-6;

/// Log-magnitude spectrum `ln(1 + |F(u, v)|)` of the mean-removed image.
///
/// Rows are transformed first, then columns. Bin (0, 0) is the DC term.
pub fn log_magnitude_spectrum(gray: &GrayImage) -> Array2<f64> {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let raw = gray.as_raw();
    let mean = raw.iter().map(|&p| p as f64).sum::<f64>() / raw.len().max(1) as f64;

    let mut data = Array2::from_shape_fn((h, w), |(y, x)| {
        Complex64::new(raw[y * w + x] as f64 - mean, 0.0)
    });

    let mut planner = FftPlanner::<f64>::new();
    let row_fft = planner.plan_fft_forward(w);
    let col_fft = planner.plan_fft_forward(h);
    let mut buffer = vec![Complex64::new(0.0, 0.0); w.max(h)];

    for mut row in data.rows_mut() {
        let buf = &mut buffer[..w];
        for (dst, src) in buf.iter_mut().zip(row.iter()) {
            *dst = *src;
        }
        row_fft.process(buf);
        for (dst, src) in row.iter_mut().zip(buf.iter()) {
            *dst = *src;
        }
    }

    for mut col in data.columns_mut() {
        let buf = &mut buffer[..h];
        for (dst, src) in buf.iter_mut().zip(col.iter()) {
            *dst = *src;
        }
        col_fft.process(buf);
        for (dst, src) in col.iter_mut().zip(buf.iter()) {
            *dst = *src;
        }
    }

    data.mapv(|c| c.norm().ln_1p())
}

/// Ratio of the top-quartile to bottom-quartile mean log-magnitude,
/// excluding the DC bin.
pub fn quartile_ratio(gray: &GrayImage) -> Result<f32, Unavailable> {
    let (w, h) = gray.dimensions();
    require_min_side(w, h)?;

    let spectrum = log_magnitude_spectrum(gray);
    let mut magnitudes: Vec<f64> = spectrum
        .indexed_iter()
        .filter(|((y, x), _)| *y != 0 || *x != 0)
        .map(|(_, &m)| m)
        .collect();
    if magnitudes.iter().any(|m| !m.is_finite()) {
        return Err(Unavailable::NonFinite);
    }
    magnitudes.sort_by(|a, b| a.total_cmp(b));

    let quartile = (magnitudes.len() / 4).max(1);
    let low = magnitudes[..quartile].iter().sum::<f64>() / quartile as f64;
    let high = magnitudes[magnitudes.len() - quartile..].iter().sum::<f64>() / quartile as f64;

    if high < SPECTRAL_FLOOR {
        return Ok(0.0);
    }
    Ok((high / low.max(SPECTRAL_FLOOR)) as f32)
}

pub fn analyze(gray: &GrayImage, threshold: f32) -> SignalOutcome {
    SignalOutcome::from_result(quartile_ratio(gray).map(|ratio| (ratio, ratio > threshold)))
}
