//! Per-frame liveness signal extractors.
//!
//! Each analyzer produces a [`SignalOutcome`]: either a measurement with its
//! pass/fail decision, or [`Unavailable`] when the input does not allow an
//! evaluation. Unavailable signals are reported as passing with their neutral
//! score, so one analyzer that cannot run never pushes a verdict toward
//! rejection.

pub mod blink;
pub mod color;
pub mod frequency;
pub mod motion;
pub mod reflection;
pub mod sharpness;
pub mod texture;

use crate::types::{SignalKind, SignalResult};
use ndarray::Array1;
use thiserror::Error;

/// Smallest crop side any pixel analyzer will evaluate.
pub const MIN_ANALYSIS_SIDE: u32 = 8;

/// Why a signal could not be evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Unavailable {
    #[error("region too small: {width}x{height}")]
    RegionTooSmall { width: u32, height: u32 },
    #[error("landmark feature missing: {0}")]
    MissingFeature(&'static str),
    #[error("landmark geometry is degenerate")]
    DegenerateGeometry,
    #[error("insufficient history: {have} of {need} frames")]
    InsufficientHistory { have: usize, need: usize },
    #[error("non-finite measurement")]
    NonFinite,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Measured { score: f32, passed: bool },
    Unavailable(Unavailable),
}

impl SignalOutcome {
    /// A measurement, demoted to `NonFinite` if the score is NaN or infinite.
    pub fn measured(score: f32, passed: bool) -> Self {
        if score.is_finite() {
            SignalOutcome::Measured { score, passed }
        } else {
            SignalOutcome::Unavailable(Unavailable::NonFinite)
        }
    }

    pub fn from_result(result: Result<(f32, bool), Unavailable>) -> Self {
        match result {
            Ok((score, passed)) => Self::measured(score, passed),
            Err(reason) => SignalOutcome::Unavailable(reason),
        }
    }

    pub fn into_result(self, kind: SignalKind, weight: f32) -> SignalResult {
        let (score, passed, available) = match self {
            SignalOutcome::Measured { score, passed } => (score, passed, true),
            SignalOutcome::Unavailable(reason) => {
                tracing::debug!(signal = kind.name(), %reason, "signal unavailable, reporting neutral");
                (kind.neutral_score(), true, false)
            }
        };
        SignalResult {
            kind,
            passed,
            score,
            weight,
            critical: kind.is_critical(),
            available,
        }
    }
}

/// Reject crops too small for neighbourhood-based analysis.
pub(crate) fn require_min_side(width: u32, height: u32) -> Result<(), Unavailable> {
    if width < MIN_ANALYSIS_SIDE || height < MIN_ANALYSIS_SIDE {
        return Err(Unavailable::RegionTooSmall { width, height });
    }
    Ok(())
}

/// Mean and population standard deviation; `(0, 0)` for no values.
pub(crate) fn mean_std(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let values: Array1<f64> = values.collect();
    match values.mean() {
        Some(mean) => (mean, values.std(0.0)),
        None => (0.0, 0.0),
    }
}
