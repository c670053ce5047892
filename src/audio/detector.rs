//! Peak-amplitude activity detection.
//!
//! Classifies each frame by its peak absolute sample and drives the
//! Idle/Capturing state machine that decides onset and offset.

use std::time::Duration;

/// Maximum absolute sample value in the frame (full-scale i16 range, so
/// `i16::MIN` maps to 32768).
pub fn peak(frame: &[i16]) -> u16 {
    frame
        .iter()
        .map(|sample| sample.unsigned_abs())
        .max()
        .unwrap_or(0)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DetectorState {
    Idle,
    Capturing,
}

/// Result of evaluating one frame against the state machine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Idle and below threshold.
    StayIdle,
    /// Idle to Capturing; first loud frame of an episode.
    Onset,
    /// Still capturing (loud or not yet timed out).
    Continue,
    /// Silence outlasted the timeout; back to Idle.
    Offset,
}

/// Edge-triggered onset/offset tracker.
#[derive(Debug, Clone)]
pub struct ActivityDetector {
    threshold: u16,
    silence_timeout: Duration,
    state: DetectorState,
    last_sound_time: Option<Duration>,
}

impl ActivityDetector {
    pub fn new(threshold: u16, silence_timeout: Duration) -> Self {
        Self {
            threshold,
            silence_timeout,
            state: DetectorState::Idle,
            last_sound_time: None,
        }
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn last_sound_time(&self) -> Option<Duration> {
        self.last_sound_time
    }

    /// Evaluate a frame with peak amplitude `peak` observed at `now`.
    ///
    /// Loud means strictly above the threshold. Offset fires once
    /// `now - last_sound_time` strictly exceeds the silence timeout.
    pub fn evaluate(&mut self, peak: u16, now: Duration) -> Transition {
        let loud = peak > self.threshold;
        match self.state {
            DetectorState::Idle => {
                if loud {
                    self.state = DetectorState::Capturing;
                    self.last_sound_time = Some(now);
                    Transition::Onset
                } else {
                    Transition::StayIdle
                }
            }
            DetectorState::Capturing => {
                if loud {
                    self.last_sound_time = Some(now);
                    return Transition::Continue;
                }
                let last = self.last_sound_time.unwrap_or(now);
                if now.saturating_sub(last) > self.silence_timeout {
                    self.reset();
                    Transition::Offset
                } else {
                    Transition::Continue
                }
            }
        }
    }

    /// Force the detector back to Idle (episode finalised or aborted).
    pub fn reset(&mut self) {
        self.state = DetectorState::Idle;
        self.last_sound_time = None;
    }
}
