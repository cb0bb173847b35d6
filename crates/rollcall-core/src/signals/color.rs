//! Color diversity across HSV and CIE Lab.
//!
//! Printed photos and screens compress the color gamut of skin. The score
//! averages four normalized statistics of the face crop:
//! hue spread, mean saturation, and the spread of both Lab chroma channels.
//! Channel ranges follow the common 8-bit conventions: H in [0, 180),
//! S and V in [0, 255], L scaled to [0, 255], a and b offset by 128.

use super::{mean_std, require_min_side, SignalOutcome, Unavailable};
use image::RgbImage;

const HUE_RANGE: f64 = 180.0;
const CHANNEL_RANGE: f64 = 255.0;

// sRGB (D65) → XYZ, and the D65 reference white.
const RGB_TO_XYZ: [[f64; 3]; 3] = [
    [0.412453, 0.357580, 0.180423],
    [0.212671, 0.715160, 0.072169],
    [0.019334, 0.119193, 0.950227],
];
const WHITE_X: f64 = 0.950456;
const WHITE_Z: f64 = 1.088754;

/// Convert an RGB pixel to 8-bit HSV `(h, s, v)`.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v > 0.0 { diff / v * CHANNEL_RANGE } else { 0.0 };
    let h = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    (h / 2.0, s, v)
}

fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn lab_f(t: f64) -> f64 {
    if t > 0.008856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

/// Convert an RGB pixel to 8-bit Lab `(l, a, b)`.
pub fn rgb_to_lab(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let rgb = [
        srgb_to_linear(r as f64 / CHANNEL_RANGE),
        srgb_to_linear(g as f64 / CHANNEL_RANGE),
        srgb_to_linear(b as f64 / CHANNEL_RANGE),
    ];
    let xyz: Vec<f64> = RGB_TO_XYZ
        .iter()
        .map(|row| row.iter().zip(rgb.iter()).map(|(m, c)| m * c).sum())
        .collect();

    let fx = lab_f(xyz[0] / WHITE_X);
    let fy = lab_f(xyz[1]);
    let fz = lab_f(xyz[2] / WHITE_Z);

    let l = if xyz[1] > 0.008856 {
        116.0 * fy - 16.0
    } else {
        903.3 * xyz[1]
    };
    let a = 500.0 * (fx - fy);
    let b = 200.0 * (fy - fz);

    (
        (l * CHANNEL_RANGE / 100.0).clamp(0.0, CHANNEL_RANGE),
        (a + 128.0).clamp(0.0, CHANNEL_RANGE),
        (b + 128.0).clamp(0.0, CHANNEL_RANGE),
    )
}

/// Color diversity score, nominally in [0, 1].
pub fn color_diversity(rgb: &RgbImage) -> Result<f32, Unavailable> {
    let (w, h) = rgb.dimensions();
    require_min_side(w, h)?;

    let hsv: Vec<(f64, f64, f64)> = rgb.pixels().map(|p| rgb_to_hsv(p[0], p[1], p[2])).collect();
    let lab: Vec<(f64, f64, f64)> = rgb.pixels().map(|p| rgb_to_lab(p[0], p[1], p[2])).collect();

    let (_, hue_std) = mean_std(hsv.iter().map(|c| c.0));
    let (sat_mean, _) = mean_std(hsv.iter().map(|c| c.1));
    let (_, a_std) = mean_std(lab.iter().map(|c| c.1));
    let (_, b_std) = mean_std(lab.iter().map(|c| c.2));

    let diversity = (hue_std / HUE_RANGE
        + sat_mean / CHANNEL_RANGE
        + a_std / CHANNEL_RANGE
        + b_std / CHANNEL_RANGE)
        / 4.0;

    Ok(diversity as f32)
}

pub fn analyze(rgb: &RgbImage, threshold: f32) -> SignalOutcome {
    SignalOutcome::from_result(color_diversity(rgb).map(|score| (score, score > threshold)))
}
