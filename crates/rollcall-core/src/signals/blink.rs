//! Eye aspect ratio (EAR) from six-point eye contours.
//!
//! Point order follows the usual contour convention: 0 and 3 are the
//! horizontal corners, (1, 5) and (2, 4) the upper/lower lid pairs.
//!
//! ```text
//! EAR = (|p1 - p5| + |p2 - p4|) / (2 * |p0 - p3|)
//! ```
//!
//! The blink signal itself is advisory: a single frame cannot show a blink,
//! so it passes whenever the eyes are measurable and only reports the EAR.
//! Blink counting happens in the temporal tracker.

use super::{SignalOutcome, Unavailable};
use crate::types::{FaceLandmarks, Point};

const EYE_CONTOUR_POINTS: usize = 6;

fn distance(a: Point, b: Point) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

/// EAR of one eye contour.
pub fn eye_aspect_ratio(eye: &[Point]) -> Result<f32, Unavailable> {
    if eye.len() < EYE_CONTOUR_POINTS {
        return Err(Unavailable::DegenerateGeometry);
    }
    let vertical_a = distance(eye[1], eye[5]);
    let vertical_b = distance(eye[2], eye[4]);
    let horizontal = distance(eye[0], eye[3]);
    if horizontal <= f32::EPSILON {
        return Err(Unavailable::DegenerateGeometry);
    }
    Ok((vertical_a + vertical_b) / (2.0 * horizontal))
}

/// Mean EAR of both eyes.
pub fn average_ear(landmarks: &FaceLandmarks) -> Result<f32, Unavailable> {
    let left = landmarks
        .left_eye
        .as_deref()
        .ok_or(Unavailable::MissingFeature("left_eye"))?;
    let right = landmarks
        .right_eye
        .as_deref()
        .ok_or(Unavailable::MissingFeature("right_eye"))?;
    Ok((eye_aspect_ratio(left)? + eye_aspect_ratio(right)?) / 2.0)
}

/// Blink signal outcome for an already-measured EAR.
pub fn analyze(ear: Result<f32, Unavailable>) -> SignalOutcome {
    SignalOutcome::from_result(ear.map(|ear| (ear, true)))
}

#[cfg(test)]
pub(crate) fn eye_with_ear(cx: f32, cy: f32, ear: f32) -> Vec<Point> {
    // Corners 20 px apart; both lid pairs open by `ear * 20`.
    let half_open = ear * 20.0 / 2.0;
    vec![
        (cx - 10.0, cy),
        (cx - 4.0, cy - half_open),
        (cx + 4.0, cy - half_open),
        (cx + 10.0, cy),
        (cx + 4.0, cy + half_open),
        (cx - 4.0, cy + half_open),
    ]
}
