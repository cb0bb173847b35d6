//! rollcall-core: face liveness decisions for attendance check-in.
//!
//! Seven per-frame signals (frequency, sharpness, texture, color, specular
//! reflection, head motion, blink) are extracted from a face crop and its
//! landmarks, then fused into a [`Verdict`]. A [`LivenessSession`] carries the
//! short-term history for one camera stream.

pub mod config;
pub mod frame;
pub mod fusion;
pub mod session;
pub mod signals;
pub mod tracker;
pub mod types;

pub use config::{ConfigError, LivenessConfig, SignalWeights};
pub use fusion::{fuse, FusionError, FusionPolicy};
pub use session::LivenessSession;
pub use types::{FaceBox, FaceLandmarks, Point, SignalKind, SignalResult, Verdict};
