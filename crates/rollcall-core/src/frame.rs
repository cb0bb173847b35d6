//! Face crop extraction: clip the face box to the frame, slice, downscale.

use crate::types::FaceBox;
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CropError {
    #[error("frame is empty ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
    #[error("face box has zero area: {0:?}")]
    Degenerate(FaceBox),
    #[error("face box {face_box:?} lies outside the {width}x{height} frame")]
    OutsideFrame {
        face_box: FaceBox,
        width: u32,
        height: u32,
    },
}

/// A face region sliced out of an RGB frame, with its grayscale rendition.
#[derive(Clone)]
pub struct FaceCrop {
    pub rgb: RgbImage,
    pub gray: GrayImage,
}

impl FaceCrop {
    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    /// Average grayscale brightness (0.0–255.0).
    pub fn avg_brightness(&self) -> f32 {
        let data = self.gray.as_raw();
        if data.is_empty() {
            return 0.0;
        }
        data.iter().map(|&b| b as f32).sum::<f32>() / data.len() as f32
    }
}

/// Slice the face region out of `frame`.
///
/// Boxes that extend past the frame edges are clipped to the visible part.
/// A box with no area, or no overlap with the frame, is an error. When
/// `max_side` is set, crops whose longer side exceeds it are downscaled
/// (aspect preserved) before analysis.
pub fn crop_face(
    frame: &RgbImage,
    face_box: &FaceBox,
    max_side: Option<u32>,
) -> Result<FaceCrop, CropError> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(CropError::EmptyFrame { width, height });
    }
    if face_box.area() == 0 {
        return Err(CropError::Degenerate(*face_box));
    }

    let left = face_box.left.max(0) as i64;
    let top = face_box.top.max(0) as i64;
    let right = (face_box.right as i64).min(width as i64);
    let bottom = (face_box.bottom as i64).min(height as i64);
    if right <= left || bottom <= top {
        return Err(CropError::OutsideFrame {
            face_box: *face_box,
            width,
            height,
        });
    }

    let mut rgb = imageops::crop_imm(
        frame,
        left as u32,
        top as u32,
        (right - left) as u32,
        (bottom - top) as u32,
    )
    .to_image();

    if let Some(max_side) = max_side.filter(|&m| m > 0) {
        let longest = rgb.width().max(rgb.height());
        if longest > max_side {
            let scale = max_side as f32 / longest as f32;
            let new_w = ((rgb.width() as f32 * scale).round() as u32).max(1);
            let new_h = ((rgb.height() as f32 * scale).round() as u32).max(1);
            rgb = imageops::resize(&rgb, new_w, new_h, FilterType::Triangle);
        }
    }

    let gray = imageops::grayscale(&rgb);
    Ok(FaceCrop { rgb, gray })
}
