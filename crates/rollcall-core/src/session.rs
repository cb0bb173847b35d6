//! One liveness detector session: a temporal tracker plus configuration.
//!
//! A session belongs to a single camera stream. Frames are analysed in
//! arrival order; every per-frame failure resolves to a verdict, never an
//! error, so the attendance flow is not blocked by the detector.

use crate::config::LivenessConfig;
use crate::frame::{crop_face, FaceCrop};
use crate::fusion::{fuse, FusionPolicy};
use crate::signals::sharpness::SharpnessParams;
use crate::signals::{blink, color, frequency, motion, reflection, sharpness, texture, SignalOutcome};
use crate::tracker::{BlinkThresholds, TemporalTracker};
use crate::types::{FaceBox, FaceLandmarks, SignalKind, SignalResult, Verdict};
use image::RgbImage;
use std::time::Instant;
use uuid::Uuid;

pub struct LivenessSession {
    id: Uuid,
    config: LivenessConfig,
    tracker: TemporalTracker,
}

impl LivenessSession {
    pub fn new(config: LivenessConfig) -> Self {
        let tracker = TemporalTracker::new(
            config.history_window_size,
            BlinkThresholds {
                close: config.ear_close_threshold,
                open: config.ear_open_threshold,
                min_consecutive_frames: config.blink_min_consecutive_frames,
            },
        );
        let id = Uuid::new_v4();
        tracing::debug!(session = %id, strict = config.strict_mode, "liveness session created");
        Self { id, config, tracker }
    }

    /// Same as [`LivenessSession::new`], keeping the caller's session id.
    pub fn with_id(id: Uuid, config: LivenessConfig) -> Self {
        Self {
            id,
            ..Self::new(config)
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    pub fn blink_count(&self) -> u32 {
        self.tracker.blink_state().blink_count
    }

    pub fn history_len(&self) -> usize {
        self.tracker.len()
    }

    /// Analyse one frame, timestamped now.
    pub fn check(&mut self, frame: &RgbImage, landmarks: &FaceLandmarks, face_box: &FaceBox) -> Verdict {
        self.check_at(frame, landmarks, face_box, Instant::now())
    }

    /// Analyse one RGB frame captured at `captured_at`.
    pub fn check_at(
        &mut self,
        frame: &RgbImage,
        landmarks: &FaceLandmarks,
        face_box: &FaceBox,
        captured_at: Instant,
    ) -> Verdict {
        let crop = match crop_face(frame, face_box, self.config.max_crop_side) {
            Ok(crop) => crop,
            Err(err) => {
                tracing::warn!(session = %self.id, error = %err, "face crop failed; failing open");
                return Verdict::fail_open(&err.to_string(), self.config.fail_open_confidence, Vec::new());
            }
        };

        self.tracker.push_frame(landmarks.clone(), captured_at);
        let signals: Vec<SignalResult> = SignalKind::ALL
            .iter()
            .map(|&kind| {
                self.evaluate(kind, &crop, landmarks)
                    .into_result(kind, self.config.weights.weight(kind))
            })
            .collect();

        let verdict = match fuse(signals.clone(), &FusionPolicy::from_config(&self.config)) {
            Ok(verdict) => verdict,
            Err(err) => {
                tracing::warn!(session = %self.id, error = %err, "fusion failed; failing open");
                Verdict::fail_open(&err.to_string(), self.config.fail_open_confidence, signals)
            }
        };

        tracing::info!(
            session = %self.id,
            live = verdict.is_live,
            confidence = verdict.confidence,
            degraded = verdict.degraded,
            crop_width = crop.width(),
            crop_height = crop.height(),
            "liveness check complete"
        );
        verdict
    }

    fn evaluate(&mut self, kind: SignalKind, crop: &FaceCrop, landmarks: &FaceLandmarks) -> SignalOutcome {
        let c = &self.config;
        match kind {
            SignalKind::Frequency => frequency::analyze(&crop.gray, c.frequency_ratio_threshold),
            SignalKind::Sharpness => sharpness::analyze(
                &crop.gray,
                &SharpnessParams {
                    laplacian_scale: c.laplacian_scale,
                    edge_density_scale: c.edge_density_scale,
                    canny_low: c.canny_low_threshold,
                    canny_high: c.canny_high_threshold,
                },
                c.edge_sharpness_threshold,
            ),
            SignalKind::Texture => texture::analyze(&crop.gray, c.texture_entropy_threshold),
            SignalKind::Color => color::analyze(&crop.rgb, c.color_diversity_threshold),
            SignalKind::Reflection => reflection::analyze(
                &crop.gray,
                c.specular_brightness_cutoff,
                c.specular_bright_pixel_ratio_max,
            ),
            SignalKind::Motion => motion::analyze(
                self.tracker.motion_sample(c.motion_min_history),
                c.motion_min_pixel_threshold,
            ),
            SignalKind::Blink => {
                let ear = blink::average_ear(landmarks);
                if let Ok(ear) = ear {
                    self.tracker.observe_eye_ratio(ear);
                }
                blink::analyze(ear)
            }
        }
    }

    /// Forget all temporal state. Configuration and session id are kept.
    pub fn reset(&mut self) {
        tracing::debug!(session = %self.id, "liveness session reset");
        self.tracker.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::blink::eye_with_ear;
    use image::Rgb;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const SIDE: u32 = 64;

    fn full_box() -> FaceBox {
        FaceBox::from_xywh(0, 0, SIDE as i32, SIDE as i32)
    }

    fn gray_frame() -> RgbImage {
        RgbImage::from_pixel(SIDE, SIDE, Rgb([128, 128, 128]))
    }

    fn noise_frame(seed: u64) -> RgbImage {
        let mut rng = StdRng::seed_from_u64(seed);
        RgbImage::from_fn(SIDE, SIDE, |_, _| Rgb([rng.gen(), rng.gen(), rng.gen()]))
    }

    fn face(nose_x: f32, ear: f32) -> FaceLandmarks {
        FaceLandmarks {
            left_eye: Some(eye_with_ear(20.0, 24.0, ear)),
            right_eye: Some(eye_with_ear(44.0, 24.0, ear)),
            nose_tip: Some(vec![(nose_x, 40.0)]),
            ..Default::default()
        }
    }

    #[test]
    fn test_flat_gray_frame_rejected_by_criticals() {
        let mut session = LivenessSession::new(LivenessConfig::default());
        let v = session.check(&gray_frame(), &face(32.0, 0.3), &full_box());
        assert!(!v.is_live);
        assert_eq!(v.confidence, 0.0);
        assert!(!v.degraded);
        assert_eq!(v.signals.len(), 7);
        for kind in [SignalKind::Texture, SignalKind::Color, SignalKind::Frequency, SignalKind::Sharpness] {
            assert!(!v.signal(kind).unwrap().passed, "{kind} should fail on a flat frame");
        }
        assert!(v.signal(SignalKind::Reflection).unwrap().passed);
    }

    #[test]
    fn test_textured_moving_face_is_live() {
        let mut session = LivenessSession::new(LivenessConfig::default());
        let frame = noise_frame(11);
        let start = Instant::now();
        let mut last = None;
        for i in 0..4 {
            let at = start + std::time::Duration::from_millis(100 * i);
            last = Some(session.check_at(&frame, &face(20.0 + 5.0 * i as f32, 0.3), &full_box(), at));
        }
        let v = last.unwrap();
        assert!(v.is_live, "{}", v.explanation);
        assert!((v.confidence - 1.0).abs() < 1e-6);
        let m = v.signal(SignalKind::Motion).unwrap();
        assert!(m.available);
        assert!((m.score - 5.0).abs() < 1e-4);
        assert!(v.signals.iter().all(|s| s.available));
    }

    #[test]
    fn test_missing_eyes_neutral_blink() {
        let mut session = LivenessSession::new(LivenessConfig::default());
        let landmarks = FaceLandmarks {
            nose_tip: Some(vec![(32.0, 40.0)]),
            ..Default::default()
        };
        let v = session.check(&noise_frame(3), &landmarks, &full_box());
        let b = v.signal(SignalKind::Blink).unwrap();
        assert!(b.passed);
        assert!(!b.available);
        assert_eq!(b.score, 0.0);
    }

    #[test]
    fn test_reset_makes_motion_unavailable() {
        let mut session = LivenessSession::new(LivenessConfig::default());
        let frame = noise_frame(4);
        for i in 0..5 {
            session.check(&frame, &face(10.0 + 4.0 * i as f32, 0.3), &full_box());
        }
        assert_eq!(session.history_len(), 5);

        session.reset();
        assert_eq!(session.history_len(), 0);
        let v = session.check(&frame, &face(60.0, 0.3), &full_box());
        let m = v.signal(SignalKind::Motion).unwrap();
        assert!(m.passed);
        assert!(!m.available);
        assert_eq!(m.score, 0.0);
    }

    #[test]
    fn test_degenerate_box_fails_open() {
        let config = LivenessConfig::default();
        let mut session = LivenessSession::new(config.clone());
        let v = session.check(&noise_frame(5), &face(32.0, 0.3), &FaceBox::new(10, 10, 10, 10));
        assert!(v.is_live);
        assert!(v.degraded);
        assert!((v.confidence - config.fail_open_confidence).abs() < 1e-6);
        assert!(v.signals.is_empty());
        assert_eq!(session.history_len(), 0);
    }

    #[test]
    fn test_box_outside_frame_fails_open() {
        let mut session = LivenessSession::new(LivenessConfig::default());
        let off = FaceBox::from_xywh(500, 500, 40, 40);
        let v = session.check(&noise_frame(6), &face(32.0, 0.3), &off);
        assert!(v.is_live);
        assert!(v.degraded);
    }

    #[test]
    fn test_fresh_sessions_agree() {
        let frame = noise_frame(7);
        let landmarks = face(30.0, 0.3);
        let mut a = LivenessSession::new(LivenessConfig::strict());
        let mut b = LivenessSession::new(LivenessConfig::strict());
        let at = Instant::now();
        assert_eq!(
            a.check_at(&frame, &landmarks, &full_box(), at),
            b.check_at(&frame, &landmarks, &full_box(), at)
        );
        assert_ne!(a.session_id(), b.session_id());
    }

    #[test]
    fn test_blinks_counted_across_frames() {
        let mut session = LivenessSession::new(LivenessConfig::default());
        let frame = noise_frame(8);
        for ear in [0.3, 0.1, 0.1, 0.3] {
            session.check(&frame, &face(32.0, ear), &full_box());
        }
        assert_eq!(session.blink_count(), 1);
    }

    #[test]
    fn test_zero_weights_fail_open() {
        // Bypasses validation: fusion rejects the zero total weight.
        let mut config = LivenessConfig::default();
        config.weights = crate::config::SignalWeights {
            frequency: 0.0,
            sharpness: 0.0,
            texture: 0.0,
            color: 0.0,
            reflection: 0.0,
            motion: 0.0,
            blink: 0.0,
        };
        let mut session = LivenessSession::new(config);
        let v = session.check(&noise_frame(9), &face(32.0, 0.3), &full_box());
        assert!(v.degraded);
        assert!(v.is_live);
        assert_eq!(v.signals.len(), 7);
    }

    #[test]
    fn test_extreme_face_boxes_do_not_panic() {
        let mut session = LivenessSession::new(LivenessConfig::default());
        let frame = noise_frame(12);

        // Clipped to the whole frame.
        let wide = FaceBox::new(0, i32::MAX, SIDE as i32, -10);
        let v = session.check(&frame, &face(32.0, 0.3), &wide);
        assert!(!v.degraded, "{}", v.explanation);
        assert_eq!(v.signals.len(), 7);

        // Entirely above the frame.
        let above = FaceBox::new(i32::MIN, i32::MAX, i32::MIN + 5, i32::MIN);
        let v = session.check(&frame, &face(32.0, 0.3), &above);
        assert!(v.is_live);
        assert!(v.degraded);
    }

    #[test]
    fn test_strict_rejects_one_failing_critical() {
        // Sharpness can never exceed 1, so only frequency passes.
        let config = LivenessConfig {
            edge_sharpness_threshold: 2.0,
            ..LivenessConfig::default()
        };
        let frame = noise_frame(13);
        let landmarks = FaceLandmarks {
            nose_tip: Some(vec![(32.0, 40.0)]),
            ..Default::default()
        };

        let mut lenient = LivenessSession::new(config.clone());
        let v = lenient.check(&frame, &landmarks, &full_box());
        assert!(v.signal(SignalKind::Frequency).unwrap().passed);
        assert!(!v.signal(SignalKind::Sharpness).unwrap().passed);
        assert!(v.is_live, "{}", v.explanation);
        assert!((v.confidence - 0.75).abs() < 1e-6);

        let mut strict = LivenessSession::new(LivenessConfig {
            strict_mode: true,
            ..config
        });
        let v = strict.check(&frame, &landmarks, &full_box());
        assert!(!v.is_live);
        assert!((v.confidence - 0.3).abs() < 1e-6);
        assert!(v.explanation.contains("sharpness"), "{}", v.explanation);
    }

    #[test]
    fn test_static_printed_photo_rejected() {
        // Flat skin-toned print with one specular dot, held perfectly still.
        let mut photo = RgbImage::from_pixel(SIDE, SIDE, Rgb([140, 125, 110]));
        photo.put_pixel(30, 30, Rgb([255, 255, 255]));
        let config = LivenessConfig::default();
        let mut session = LivenessSession::new(config.clone());
        let landmarks = face(32.0, 0.3);

        let start = Instant::now();
        let mut last = None;
        for i in 0..5 {
            let at = start + std::time::Duration::from_millis(100 * i);
            last = Some(session.check_at(&photo, &landmarks, &full_box(), at));
        }
        let v = last.unwrap();

        let motion = v.signal(SignalKind::Motion).unwrap();
        assert!(motion.available);
        assert!(!motion.passed);
        assert!(motion.score.abs() < 1e-6);

        let texture = v.signal(SignalKind::Texture).unwrap();
        assert!(texture.available && !texture.passed);
        assert!(texture.score > 0.0, "texture = {}", texture.score);

        let color = v.signal(SignalKind::Color).unwrap();
        assert!(color.available && !color.passed);
        assert!(color.score > 0.03 && color.score < 0.1, "color = {}", color.score);

        assert!(!v.signal(SignalKind::Frequency).unwrap().passed);
        assert!(!v.signal(SignalKind::Sharpness).unwrap().passed);
        assert!(!v.is_live);
        assert!(v.confidence < config.overall_threshold());
    }

    #[test]
    fn test_with_id_keeps_id() {
        let id = Uuid::new_v4();
        let session = LivenessSession::with_id(id, LivenessConfig::default());
        assert_eq!(session.session_id(), id);
    }
}
