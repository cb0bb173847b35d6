use crate::types::SignalKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

const STRICT_OVERALL_THRESHOLD: f32 = 0.40;
const LENIENT_OVERALL_THRESHOLD: f32 = 0.25;
/// Above 1/2: with two critical signals, strict rejects on any critical failure.
const STRICT_CRITICAL_FRACTION: f32 = 0.75;
const LENIENT_CRITICAL_FRACTION: f32 = 0.25;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Relative weight of each signal in the fused confidence.
///
/// Weights need not sum to 1; fusion normalizes by the total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub frequency: f32,
    pub sharpness: f32,
    pub texture: f32,
    pub color: f32,
    pub reflection: f32,
    pub motion: f32,
    pub blink: f32,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            frequency: 0.25,
            sharpness: 0.25,
            texture: 0.15,
            color: 0.10,
            reflection: 0.10,
            motion: 0.10,
            blink: 0.05,
        }
    }
}

impl SignalWeights {
    pub fn weight(&self, kind: SignalKind) -> f32 {
        match kind {
            SignalKind::Frequency => self.frequency,
            SignalKind::Sharpness => self.sharpness,
            SignalKind::Texture => self.texture,
            SignalKind::Color => self.color,
            SignalKind::Reflection => self.reflection,
            SignalKind::Motion => self.motion,
            SignalKind::Blink => self.blink,
        }
    }

    pub fn total(&self) -> f32 {
        SignalKind::ALL.iter().map(|&k| self.weight(k)).sum()
    }
}

/// Liveness detector configuration.
///
/// `Default` is the lenient operating point: it only rejects blatant,
/// multi-signal failures. [`LivenessConfig::strict`] raises the fusion
/// cut-offs. Any field may be overridden from TOML or `ROLLCALL_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// EAR below which the eyes count as closed.
    pub ear_close_threshold: f32,
    /// EAR at or above which closed eyes count as reopened.
    pub ear_open_threshold: f32,
    /// Closed frames needed before a reopening counts as a blink.
    pub blink_min_consecutive_frames: u32,
    /// Mean nose-tip displacement (pixels) required to pass the motion check.
    pub motion_min_pixel_threshold: f32,
    /// Frames of history needed before motion is evaluated.
    pub motion_min_history: usize,
    pub texture_entropy_threshold: f32,
    pub color_diversity_threshold: f32,
    /// Grayscale level above which a blurred pixel counts as a bright spot.
    pub specular_brightness_cutoff: u8,
    pub specular_bright_pixel_ratio_max: f32,
    pub frequency_ratio_threshold: f32,
    pub edge_sharpness_threshold: f32,
    /// Laplacian variance that maps to full sharpness.
    pub laplacian_scale: f32,
    /// Edge-pixel fraction that maps to full sharpness.
    pub edge_density_scale: f32,
    pub canny_low_threshold: f32,
    pub canny_high_threshold: f32,
    /// Minimum fraction of critical signals that must pass; below it the
    /// frame is rejected outright. Unset: chosen by `strict_mode`.
    pub critical_failure_fraction_threshold: Option<f32>,
    /// Fused confidence needed for a live verdict. Unset: chosen by `strict_mode`.
    pub overall_confidence_threshold: Option<f32>,
    /// Rolling landmark history length.
    pub history_window_size: usize,
    pub strict_mode: bool,
    /// Confidence reported on fail-open verdicts.
    pub fail_open_confidence: f32,
    /// Downscale face crops whose longer side exceeds this before analysis.
    pub max_crop_side: Option<u32>,
    pub weights: SignalWeights,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self::lenient()
    }
}

impl LivenessConfig {
    /// Availability-first operating point.
    pub fn lenient() -> Self {
        Self {
            ear_close_threshold: 0.20,
            ear_open_threshold: 0.24,
            blink_min_consecutive_frames: 2,
            motion_min_pixel_threshold: 2.0,
            motion_min_history: 3,
            texture_entropy_threshold: 0.30,
            color_diversity_threshold: 0.15,
            specular_brightness_cutoff: 220,
            specular_bright_pixel_ratio_max: 0.30,
            frequency_ratio_threshold: 1.10,
            edge_sharpness_threshold: 0.10,
            laplacian_scale: 1000.0,
            edge_density_scale: 0.10,
            canny_low_threshold: 50.0,
            canny_high_threshold: 100.0,
            critical_failure_fraction_threshold: None,
            overall_confidence_threshold: None,
            history_window_size: 10,
            strict_mode: false,
            fail_open_confidence: 0.75,
            max_crop_side: None,
            weights: SignalWeights::default(),
        }
    }

    /// Security-first operating point.
    pub fn strict() -> Self {
        Self {
            strict_mode: true,
            ..Self::lenient()
        }
    }

    /// Overall confidence cut-off in effect.
    pub fn overall_threshold(&self) -> f32 {
        self.overall_confidence_threshold.unwrap_or(if self.strict_mode {
            STRICT_OVERALL_THRESHOLD
        } else {
            LENIENT_OVERALL_THRESHOLD
        })
    }

    /// Critical pass fraction cut-off in effect.
    pub fn critical_fraction_threshold(&self) -> f32 {
        self.critical_failure_fraction_threshold.unwrap_or(if self.strict_mode {
            STRICT_CRITICAL_FRACTION
        } else {
            LENIENT_CRITICAL_FRACTION
        })
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply `ROLLCALL_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `ROLLCALL_*` overrides from an arbitrary lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("ROLLCALL_STRICT_MODE") {
            self.strict_mode = v != "0" && !v.eq_ignore_ascii_case("false");
        }
        if let Some(v) = parse(&lookup, "ROLLCALL_OVERALL_CONFIDENCE_THRESHOLD") {
            self.overall_confidence_threshold = Some(v);
        }
        if let Some(v) = parse(&lookup, "ROLLCALL_CRITICAL_FAILURE_FRACTION_THRESHOLD") {
            self.critical_failure_fraction_threshold = Some(v);
        }
        override_with(&lookup, "ROLLCALL_EAR_CLOSE_THRESHOLD", &mut self.ear_close_threshold);
        override_with(&lookup, "ROLLCALL_EAR_OPEN_THRESHOLD", &mut self.ear_open_threshold);
        override_with(
            &lookup,
            "ROLLCALL_BLINK_MIN_CONSECUTIVE_FRAMES",
            &mut self.blink_min_consecutive_frames,
        );
        override_with(
            &lookup,
            "ROLLCALL_MOTION_MIN_PIXEL_THRESHOLD",
            &mut self.motion_min_pixel_threshold,
        );
        override_with(
            &lookup,
            "ROLLCALL_TEXTURE_ENTROPY_THRESHOLD",
            &mut self.texture_entropy_threshold,
        );
        override_with(
            &lookup,
            "ROLLCALL_COLOR_DIVERSITY_THRESHOLD",
            &mut self.color_diversity_threshold,
        );
        override_with(
            &lookup,
            "ROLLCALL_SPECULAR_BRIGHT_PIXEL_RATIO_MAX",
            &mut self.specular_bright_pixel_ratio_max,
        );
        override_with(
            &lookup,
            "ROLLCALL_FREQUENCY_RATIO_THRESHOLD",
            &mut self.frequency_ratio_threshold,
        );
        override_with(
            &lookup,
            "ROLLCALL_EDGE_SHARPNESS_THRESHOLD",
            &mut self.edge_sharpness_threshold,
        );
        override_with(&lookup, "ROLLCALL_HISTORY_WINDOW_SIZE", &mut self.history_window_size);
        override_with(&lookup, "ROLLCALL_FAIL_OPEN_CONFIDENCE", &mut self.fail_open_confidence);
        if let Some(side) = parse::<u32>(&lookup, "ROLLCALL_MAX_CROP_SIDE") {
            self.max_crop_side = (side > 0).then_some(side);
        }
    }

    /// Reject configurations the detector cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.ear_close_threshold > self.ear_open_threshold {
            return invalid(format!(
                "ear_close_threshold ({}) exceeds ear_open_threshold ({})",
                self.ear_close_threshold, self.ear_open_threshold
            ));
        }
        if self.history_window_size == 0 {
            return invalid("history_window_size must be at least 1".into());
        }
        if self.motion_min_history > self.history_window_size {
            return invalid(format!(
                "motion_min_history ({}) exceeds history_window_size ({})",
                self.motion_min_history, self.history_window_size
            ));
        }
        if self.canny_low_threshold > self.canny_high_threshold {
            return invalid("canny_low_threshold exceeds canny_high_threshold".into());
        }
        if self.laplacian_scale <= 0.0 || self.edge_density_scale <= 0.0 {
            return invalid("sharpness scales must be positive".into());
        }

        let fractions = [
            ("overall_confidence_threshold", self.overall_threshold()),
            ("critical_failure_fraction_threshold", self.critical_fraction_threshold()),
            ("fail_open_confidence", self.fail_open_confidence),
            ("specular_bright_pixel_ratio_max", self.specular_bright_pixel_ratio_max),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{name} must be within [0, 1], got {value}"));
            }
        }

        for kind in SignalKind::ALL {
            let w = self.weights.weight(kind);
            if !w.is_finite() || w < 0.0 {
                return invalid(format!("weight for {kind} must be non-negative, got {w}"));
            }
        }
        let total = self.weights.total();
        if !total.is_finite() {
            return invalid(format!("signal weights sum to a non-finite total ({total})"));
        }
        if total <= 0.0 {
            return invalid("signal weights sum to zero".into());
        }

        Ok(())
    }
}

fn parse<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn override_with<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    field: &mut T,
) {
    if let Some(v) = parse(lookup, key) {
        *field = v;
    }
}
