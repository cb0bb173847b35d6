//! Evidence fusion: critical short-circuit, then weighted confidence.
//!
//! Critical signals (frequency artifacts, edge sharpness) are the strongest
//! evidence class. When too few of them pass, the frame is rejected without
//! consulting the supporting signals, which are individually weak (motion is
//! near-useless for a person standing still in front of a screen).
//! Otherwise confidence is the passed share of total weight across all
//! signals.

use crate::config::LivenessConfig;
use crate::types::{SignalResult, Verdict};
use thiserror::Error;

/// Scale applied to the critical pass fraction on a short-circuit rejection.
const SHORT_CIRCUIT_CONFIDENCE_SCALE: f32 = 0.6;

#[derive(Debug, Error, PartialEq)]
pub enum FusionError {
    #[error("no signal results to fuse")]
    NoSignals,
    #[error("total signal weight is zero")]
    ZeroWeight,
    #[error("non-finite weight for {0}")]
    NonFiniteWeight(&'static str),
    #[error("weighted confidence is not finite (total weight {0})")]
    NonFiniteConfidence(f32),
}

/// Cut-offs used by [`fuse`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionPolicy {
    /// Critical pass fraction below which the frame is rejected outright.
    pub critical_fraction_threshold: f32,
    /// Fused confidence needed for a live verdict.
    pub overall_threshold: f32,
}

impl FusionPolicy {
    pub fn from_config(config: &LivenessConfig) -> Self {
        Self {
            critical_fraction_threshold: config.critical_fraction_threshold(),
            overall_threshold: config.overall_threshold(),
        }
    }
}

fn names<'a>(results: impl Iterator<Item = &'a SignalResult>) -> String {
    let list: Vec<&str> = results.map(|r| r.name()).collect();
    if list.is_empty() {
        "none".to_string()
    } else {
        list.join(", ")
    }
}

/// Combine per-signal results into a verdict.
pub fn fuse(signals: Vec<SignalResult>, policy: &FusionPolicy) -> Result<Verdict, FusionError> {
    if signals.is_empty() {
        return Err(FusionError::NoSignals);
    }
    if let Some(bad) = signals.iter().find(|s| !s.weight.is_finite() || s.weight < 0.0) {
        return Err(FusionError::NonFiniteWeight(bad.name()));
    }

    let critical: Vec<&SignalResult> = signals.iter().filter(|s| s.critical).collect();
    if !critical.is_empty() {
        let passed = critical.iter().filter(|s| s.passed).count();
        let fraction = passed as f32 / critical.len() as f32;

        if fraction < policy.critical_fraction_threshold {
            let confidence = (fraction * SHORT_CIRCUIT_CONFIDENCE_SCALE).clamp(0.0, 1.0);
            let explanation = format!(
                "rejected: critical checks failed ({}); {passed}/{} critical passed; confidence {:.0}%",
                names(critical.iter().copied().filter(|s| !s.passed)),
                critical.len(),
                confidence * 100.0
            );
            return Ok(Verdict {
                is_live: false,
                confidence,
                signals,
                explanation,
                degraded: false,
            });
        }
    }

    let total: f32 = signals.iter().map(|s| s.weight).sum();
    if !total.is_finite() {
        return Err(FusionError::NonFiniteConfidence(total));
    }
    if total <= 0.0 {
        return Err(FusionError::ZeroWeight);
    }
    let passed_weight: f32 = signals.iter().filter(|s| s.passed).map(|s| s.weight).sum();
    let ratio = passed_weight / total;
    if !ratio.is_finite() {
        return Err(FusionError::NonFiniteConfidence(total));
    }
    let confidence = ratio.clamp(0.0, 1.0);
    let is_live = confidence >= policy.overall_threshold;

    let explanation = format!(
        "{}: confidence {:.0}% (threshold {:.0}%); passed: {}; failed: {}",
        if is_live { "live" } else { "rejected" },
        confidence * 100.0,
        policy.overall_threshold * 100.0,
        names(signals.iter().filter(|s| s.passed)),
        names(signals.iter().filter(|s| !s.passed)),
    );

    Ok(Verdict {
        is_live,
        confidence,
        signals,
        explanation,
        degraded: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignalKind;

    fn result(kind: SignalKind, passed: bool, weight: f32) -> SignalResult {
        SignalResult {
            kind,
            passed,
            score: if passed { 1.0 } else { 0.0 },
            weight,
            critical: kind.is_critical(),
            available: true,
        }
    }

    fn lenient() -> FusionPolicy {
        FusionPolicy::from_config(&LivenessConfig::lenient())
    }

    fn strict() -> FusionPolicy {
        FusionPolicy::from_config(&LivenessConfig::strict())
    }

    /// Both critical signals set to `critical_pass`, supporting to `supporting_pass`.
    fn all_signals(critical_pass: [bool; 2], supporting_pass: bool) -> Vec<SignalResult> {
        let w = crate::config::SignalWeights::default();
        SignalKind::ALL
            .iter()
            .map(|&k| {
                let passed = match k {
                    SignalKind::Frequency => critical_pass[0],
                    SignalKind::Sharpness => critical_pass[1],
                    _ => supporting_pass,
                };
                result(k, passed, w.weight(k))
            })
            .collect()
    }

    #[test]
    fn test_both_critical_fail_short_circuits() {
        let v = fuse(all_signals([false, false], true), &lenient()).unwrap();
        assert!(!v.is_live);
        assert_eq!(v.confidence, 0.0);
        assert!(v.explanation.contains("frequency, sharpness"), "{}", v.explanation);
        assert_eq!(v.signals.len(), 7);
    }

    #[test]
    fn test_half_critical_passes_lenient_cutoff() {
        // 1 of 2 critical passes: 0.5 >= 0.25, falls through to weighting.
        let v = fuse(all_signals([true, false], true), &lenient()).unwrap();
        assert!(v.is_live);
        assert!((v.confidence - 0.75).abs() < 1e-6, "confidence = {}", v.confidence);
    }

    #[test]
    fn test_strict_rejects_single_critical_failure() {
        let v = fuse(all_signals([true, false], true), &strict()).unwrap();
        assert!(!v.is_live);
        assert!((v.confidence - 0.3).abs() < 1e-6);
        assert!(v.explanation.contains("sharpness"));
    }

    #[test]
    fn test_weighted_confidence() {
        // Critical pass, all supporting fail: 0.5 / 1.0.
        let v = fuse(all_signals([true, true], false), &lenient()).unwrap();
        assert!((v.confidence - 0.5).abs() < 1e-6);
        assert!(v.is_live);
    }

    #[test]
    fn test_overall_threshold_decides() {
        let signals = vec![
            result(SignalKind::Frequency, true, 0.1),
            result(SignalKind::Texture, false, 0.3),
            result(SignalKind::Color, false, 0.3),
        ];
        // 0.1 / 0.7 ≈ 0.143
        let v = fuse(signals.clone(), &lenient()).unwrap();
        assert!(!v.is_live);
        assert!((v.confidence - 0.1 / 0.7).abs() < 1e-6);

        let permissive = FusionPolicy {
            overall_threshold: 0.1,
            ..lenient()
        };
        assert!(fuse(signals, &permissive).unwrap().is_live);
    }

    #[test]
    fn test_supporting_only_never_short_circuits() {
        let signals = vec![
            result(SignalKind::Texture, false, 0.2),
            result(SignalKind::Motion, true, 0.2),
        ];
        let v = fuse(signals, &lenient()).unwrap();
        assert!((v.confidence - 0.5).abs() < 1e-6);
        assert!(v.is_live);
    }

    #[test]
    fn test_weights_need_not_sum_to_one() {
        let signals = vec![
            result(SignalKind::Frequency, true, 2.0),
            result(SignalKind::Sharpness, true, 2.0),
            result(SignalKind::Texture, false, 4.0),
        ];
        let v = fuse(signals, &lenient()).unwrap();
        assert!((v.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_bounds_exhaustive() {
        for mask in 0u32..(1 << 7) {
            let signals: Vec<SignalResult> = SignalKind::ALL
                .iter()
                .enumerate()
                .map(|(i, &k)| result(k, mask & (1 << i) != 0, 0.1 + i as f32 * 0.05))
                .collect();
            for policy in [lenient(), strict()] {
                let v = fuse(signals.clone(), &policy).unwrap();
                assert!((0.0..=1.0).contains(&v.confidence), "mask {mask:#b}: {}", v.confidence);
            }
        }
    }

    #[test]
    fn test_empty_is_error() {
        assert_eq!(fuse(vec![], &lenient()).unwrap_err(), FusionError::NoSignals);
    }

    #[test]
    fn test_zero_weight_is_error() {
        let signals = vec![result(SignalKind::Texture, true, 0.0)];
        assert_eq!(fuse(signals, &lenient()).unwrap_err(), FusionError::ZeroWeight);
    }

    #[test]
    fn test_overflowing_total_weight_is_error() {
        let signals = vec![
            result(SignalKind::Frequency, true, 3e38),
            result(SignalKind::Sharpness, true, 3e38),
        ];
        assert!(matches!(
            fuse(signals, &lenient()),
            Err(FusionError::NonFiniteConfidence(total)) if total.is_infinite()
        ));
    }

    #[test]
    fn test_nan_weight_is_error() {
        let signals = vec![result(SignalKind::Color, true, f32::NAN)];
        assert_eq!(
            fuse(signals, &lenient()).unwrap_err(),
            FusionError::NonFiniteWeight("color")
        );
    }
}
