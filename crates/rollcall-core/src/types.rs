use serde::{Deserialize, Serialize};

/// A 2D pixel coordinate `(x, y)` in frame space.
pub type Point = (f32, f32);

/// Facial landmarks for one frame, grouped by named feature.
///
/// Every feature is optional: landmark detectors routinely drop features on
/// profile views or partial occlusion, and analyzers treat an absent feature
/// as "cannot evaluate" rather than as evidence against liveness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceLandmarks {
    pub left_eye: Option<Vec<Point>>,
    pub right_eye: Option<Vec<Point>>,
    pub nose_tip: Option<Vec<Point>>,
    pub chin: Option<Vec<Point>>,
    pub top_lip: Option<Vec<Point>>,
    pub bottom_lip: Option<Vec<Point>>,
    pub left_eyebrow: Option<Vec<Point>>,
    pub right_eyebrow: Option<Vec<Point>>,
    pub nose_bridge: Option<Vec<Point>>,
}

impl FaceLandmarks {
    /// Both eye contours, if both are present.
    pub fn eyes(&self) -> Option<(&[Point], &[Point])> {
        match (&self.left_eye, &self.right_eye) {
            (Some(left), Some(right)) => Some((left.as_slice(), right.as_slice())),
            _ => None,
        }
    }

    /// First point of the nose-tip contour, used as the head-motion anchor.
    pub fn nose_anchor(&self) -> Option<Point> {
        self.nose_tip.as_ref().and_then(|pts| pts.first().copied())
    }
}

/// Face region in pixel coordinates: `(top, right, bottom, left)`, with the
/// right and bottom edges exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl FaceBox {
    pub fn new(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self { top, right, bottom, left }
    }

    /// Build a box from an `(x, y, width, height)` rectangle.
    pub fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            top: y,
            right: x.saturating_add(width),
            bottom: y.saturating_add(height),
            left: x,
        }
    }

    /// Widened to `i64`: edges may sit anywhere in the `i32` range.
    pub fn width(&self) -> i64 {
        (self.right as i64 - self.left as i64).max(0)
    }

    pub fn height(&self) -> i64 {
        (self.bottom as i64 - self.top as i64).max(0)
    }

    pub fn area(&self) -> i64 {
        self.width().saturating_mul(self.height())
    }
}

/// The liveness signals computed per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Blink,
    Texture,
    Color,
    Reflection,
    Frequency,
    Sharpness,
    Motion,
}

impl SignalKind {
    /// Evaluation and reporting order.
    pub const ALL: [SignalKind; 7] = [
        SignalKind::Frequency,
        SignalKind::Sharpness,
        SignalKind::Texture,
        SignalKind::Color,
        SignalKind::Reflection,
        SignalKind::Motion,
        SignalKind::Blink,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SignalKind::Blink => "blink",
            SignalKind::Texture => "texture",
            SignalKind::Color => "color",
            SignalKind::Reflection => "reflection",
            SignalKind::Frequency => "frequency",
            SignalKind::Sharpness => "sharpness",
            SignalKind::Motion => "motion",
        }
    }

    /// Critical signals can reject a frame on their own; the rest only
    /// contribute weight.
    pub fn is_critical(self) -> bool {
        matches!(self, SignalKind::Frequency | SignalKind::Sharpness)
    }

    /// Score reported when the signal could not be evaluated.
    pub fn neutral_score(self) -> f32 {
        match self {
            SignalKind::Texture | SignalKind::Color | SignalKind::Sharpness => 0.5,
            SignalKind::Frequency => 1.0,
            SignalKind::Blink | SignalKind::Reflection | SignalKind::Motion => 0.0,
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one signal for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    #[serde(rename = "name")]
    pub kind: SignalKind,
    pub passed: bool,
    /// Usually in [0, 1]; unnormalized metrics (frequency ratio, motion in
    /// pixels) may exceed 1.
    pub score: f32,
    pub weight: f32,
    pub critical: bool,
    /// False when the signal could not be evaluated and reports its neutral
    /// default instead of a measurement.
    pub available: bool,
}

impl SignalResult {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Final liveness decision for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_live: bool,
    /// Always within [0, 1].
    pub confidence: f32,
    pub signals: Vec<SignalResult>,
    pub explanation: String,
    /// Set when the verdict came from a fail-open path rather than a full
    /// analysis.
    pub degraded: bool,
}

impl Verdict {
    /// Fail-open verdict: allow the attempt, flag it for audit.
    pub fn fail_open(reason: &str, confidence: f32, signals: Vec<SignalResult>) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        Self {
            is_live: true,
            confidence,
            signals,
            explanation: format!(
                "degraded analysis ({reason}); allowing at {:.0}% confidence",
                confidence * 100.0
            ),
            degraded: true,
        }
    }

    pub fn signal(&self, kind: SignalKind) -> Option<&SignalResult> {
        self.signals.iter().find(|s| s.kind == kind)
    }
}
