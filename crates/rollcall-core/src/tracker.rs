//! Short-term temporal state for one liveness session.
//!
//! Holds a bounded FIFO of recent landmarks (for head motion) and the blink
//! state machine driven by per-frame eye aspect ratios:
//!
//! ```text
//!            EAR < close                     EAR < close (count += 1)
//!   Idle ───────────────▶ CountingClosed ◀──────────┐
//!    ▲                        │  └──────────────────┘
//!    └────────────────────────┘
//!       EAR >= open (blink if count >= min_consecutive)
//! ```
//!
//! EARs between the close and open thresholds leave the state unchanged.

use crate::signals::motion::{self, MotionSample};
use crate::signals::Unavailable;
use crate::types::FaceLandmarks;
use std::collections::VecDeque;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct FrameHistoryEntry {
    pub landmarks: FaceLandmarks,
    pub captured_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EyePhase {
    Idle,
    CountingClosed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlinkThresholds {
    pub close: f32,
    pub open: f32,
    pub min_consecutive_frames: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlinkState {
    pub consecutive_closed_frames: u32,
    /// Latched once any blink completes in this session.
    pub blink_detected: bool,
    pub blink_count: u32,
}

impl BlinkState {
    pub fn phase(&self) -> EyePhase {
        if self.consecutive_closed_frames > 0 {
            EyePhase::CountingClosed
        } else {
            EyePhase::Idle
        }
    }
}

pub struct TemporalTracker {
    history: VecDeque<FrameHistoryEntry>,
    window: usize,
    blink: BlinkState,
    thresholds: BlinkThresholds,
}

impl TemporalTracker {
    pub fn new(window: usize, thresholds: BlinkThresholds) -> Self {
        let window = window.max(1);
        Self {
            history: VecDeque::with_capacity(window),
            window,
            blink: BlinkState::default(),
            thresholds,
        }
    }

    /// Append a frame, evicting the oldest entries beyond the window.
    pub fn push_frame(&mut self, landmarks: FaceLandmarks, captured_at: Instant) {
        self.history.push_back(FrameHistoryEntry {
            landmarks,
            captured_at,
        });
        while self.history.len() > self.window {
            self.history.pop_front();
        }
    }

    /// Mean nose-tip displacement across the window, with the number of pairs
    /// analysed. Requires at least `min_history` frames.
    pub fn motion_sample(&self, min_history: usize) -> Result<MotionSample, Unavailable> {
        let need = min_history.max(2);
        if self.history.len() < need {
            return Err(Unavailable::InsufficientHistory {
                have: self.history.len(),
                need,
            });
        }
        let anchors: Vec<_> = self
            .history
            .iter()
            .map(|entry| entry.landmarks.nose_anchor())
            .collect();
        motion::mean_displacement(&anchors).ok_or(Unavailable::MissingFeature("nose_tip"))
    }

    /// Mean nose-tip displacement across the window; 0 with fewer than two
    /// measurable frames.
    pub fn recent_motion(&self) -> f32 {
        self.motion_sample(2)
            .map(|s| s.mean_displacement)
            .unwrap_or(0.0)
    }

    /// Feed one averaged EAR into the blink state machine.
    ///
    /// Returns true when this observation completes a blink.
    pub fn observe_eye_ratio(&mut self, avg_ear: f32) -> bool {
        let t = self.thresholds;
        if avg_ear < t.close {
            self.blink.consecutive_closed_frames += 1;
            return false;
        }
        if avg_ear < t.open || self.blink.phase() == EyePhase::Idle {
            return false;
        }

        let completed = self.blink.consecutive_closed_frames >= t.min_consecutive_frames;
        self.blink.consecutive_closed_frames = 0;
        if completed {
            self.blink.blink_count += 1;
            self.blink.blink_detected = true;
            tracing::debug!(blinks = self.blink.blink_count, "blink completed");
        }
        completed
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.blink = BlinkState::default();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn history(&self) -> impl Iterator<Item = &FrameHistoryEntry> {
        self.history.iter()
    }

    pub fn blink_state(&self) -> BlinkState {
        self.blink
    }
}
