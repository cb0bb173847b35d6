//! Inter-frame head motion from the nose-tip anchor.
//!
//! A static photograph produces near-identical landmark positions across
//! consecutive frames; a live person drifts, nods and sways. The signal is
//! the mean Euclidean displacement of the nose tip between consecutive
//! frames of the tracker's rolling window.
//!
//! The first frames of a session cannot show motion yet, so short histories
//! report as unavailable (neutral pass) rather than as a static face.

use super::{SignalOutcome, Unavailable};
use crate::types::Point;

/// Mean displacement over the consecutive pairs that were measurable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub mean_displacement: f32,
    pub pairs_analysed: usize,
}

/// Mean displacement between consecutive anchors.
///
/// Pairs where either frame lacks an anchor are skipped. Returns `None` when
/// no pair could be measured.
pub fn mean_displacement(anchors: &[Option<Point>]) -> Option<MotionSample> {
    let mut total = 0.0f32;
    let mut pairs = 0usize;

    for pair in anchors.windows(2) {
        let (Some(prev), Some(curr)) = (pair[0], pair[1]) else {
            continue;
        };
        let dx = curr.0 - prev.0;
        let dy = curr.1 - prev.1;
        total += (dx * dx + dy * dy).sqrt();
        pairs += 1;
    }

    (pairs > 0).then(|| MotionSample {
        mean_displacement: total / pairs as f32,
        pairs_analysed: pairs,
    })
}

pub fn analyze(sample: Result<MotionSample, Unavailable>, threshold: f32) -> SignalOutcome {
    SignalOutcome::from_result(
        sample.map(|s| (s.mean_displacement, s.mean_displacement > threshold)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_anchors_have_no_motion() {
        let anchors = vec![Some((100.0, 50.0)); 3];
        let s = mean_displacement(&anchors).unwrap();
        assert_eq!(s.pairs_analysed, 2);
        assert!(s.mean_displacement < 1e-6);
    }

    #[test]
    fn test_known_displacement() {
        // 3-4-5 triangle, then no movement: mean 2.5 over two pairs.
        let anchors = vec![Some((0.0, 0.0)), Some((3.0, 4.0)), Some((3.0, 4.0))];
        let s = mean_displacement(&anchors).unwrap();
        assert_eq!(s.pairs_analysed, 2);
        assert!((s.mean_displacement - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_missing_anchor_skips_pairs() {
        let anchors = vec![Some((0.0, 0.0)), None, Some((5.0, 0.0)), Some((5.0, 6.0))];
        let s = mean_displacement(&anchors).unwrap();
        assert_eq!(s.pairs_analysed, 1);
        assert!((s.mean_displacement - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_no_measurable_pairs() {
        assert!(mean_displacement(&[]).is_none());
        assert!(mean_displacement(&[Some((1.0, 1.0))]).is_none());
        assert!(mean_displacement(&[None, None, None]).is_none());
    }

    #[test]
    fn test_insufficient_history_is_neutral() {
        let outcome = analyze(Err(Unavailable::InsufficientHistory { have: 1, need: 3 }), 2.0);
        assert!(matches!(outcome, SignalOutcome::Unavailable(Unavailable::InsufficientHistory { .. })));
    }

    #[test]
    fn test_threshold_decision() {
        let still = MotionSample { mean_displacement: 0.4, pairs_analysed: 4 };
        let moving = MotionSample { mean_displacement: 6.0, pairs_analysed: 4 };
        assert_eq!(analyze(Ok(still), 2.0), SignalOutcome::Measured { score: 0.4, passed: false });
        assert_eq!(analyze(Ok(moving), 2.0), SignalOutcome::Measured { score: 6.0, passed: true });
    }
}
