//! Amplitude-gated segmentation state machine.
//!
//! Driven once per delivered frame. Keeps the pre-roll ring current, grows the
//! capture buffer while an episode is open, and hands finished segments to the
//! delivery worker without blocking the frame path.

use super::detector::{peak, ActivityDetector, DetectorState, Transition};
use super::dispatch::{PipelineEvent, SegmentHandoff};
use super::preroll::RingPreroll;
use super::segment::{EndReason, Segment, SegmentBuffer};
use super::DEFAULT_SAMPLE_RATE;
use crate::config::AppConfig;
use crate::error::CaptureError;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Seconds of audio the capture buffer is sized for at onset.
pub const INITIAL_CAPACITY_SECONDS: u32 = 10;

/// How long the shutdown flush waits for the worker to free a queue slot.
pub const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// Immutable settings snapshot; never changes while a segmenter is alive.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    pub sample_rate: u32,
    pub amplitude_threshold: u16,
    pub silence_timeout: Duration,
    pub remove_last_seconds: u32,
    pub preroll_seconds: f32,
    pub max_segment_seconds: u32,
    pub debug_amplitude: bool,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            amplitude_threshold: 300,
            silence_timeout: Duration::from_secs(5),
            remove_last_seconds: 2,
            preroll_seconds: 1.0,
            max_segment_seconds: 600,
            debug_amplitude: false,
        }
    }
}

impl From<&AppConfig> for SegmenterConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            sample_rate: cfg.sample_rate,
            amplitude_threshold: cfg.amplitude_threshold.clamp(0, i32::from(i16::MAX)) as u16,
            silence_timeout: Duration::from_secs(cfg.silence_timeout_seconds),
            remove_last_seconds: cfg.remove_last_seconds,
            preroll_seconds: cfg.preroll_seconds,
            max_segment_seconds: cfg.max_segment_seconds,
            debug_amplitude: cfg.debug_amplitude,
        }
    }
}

impl SegmenterConfig {
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn initial_capacity(&self) -> usize {
        self.seconds_to_samples(INITIAL_CAPACITY_SECONDS)
    }

    pub fn remove_samples(&self) -> usize {
        self.seconds_to_samples(self.remove_last_seconds)
    }

    pub fn max_samples(&self) -> usize {
        self.seconds_to_samples(self.max_segment_seconds).max(1)
    }

    fn seconds_to_samples(&self, seconds: u32) -> usize {
        (u64::from(seconds) * u64::from(self.sample_rate)) as usize
    }
}

/// Counters for observability; read by the supervising thread after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmenterMetrics {
    pub frames_processed: usize,
    pub frames_skipped: usize,
    pub episodes_started: usize,
    pub episodes_aborted: usize,
    pub segments_emitted: usize,
    pub segments_rejected: usize,
    pub segments_discarded: usize,
    pub buffer_allocations: usize,
    pub buffer_reallocations: usize,
}

/// What a single frame did to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Idle,
    Onset { preroll_samples: usize },
    Capturing,
    /// A segment was finalised (queued or, if the queue stayed full, rejected).
    Finished { samples: usize, reason: EndReason },
    /// Offset reached but nothing survived trailing-silence removal.
    Discarded,
    Aborted,
}

pub struct Segmenter {
    cfg: SegmenterConfig,
    source_label: Arc<str>,
    ring: RingPreroll,
    detector: ActivityDetector,
    buffer: Option<SegmentBuffer>,
    handoff: SegmentHandoff,
    metrics: SegmenterMetrics,
}

impl Segmenter {
    pub fn new(cfg: SegmenterConfig, source_label: &str, handoff: SegmentHandoff) -> Self {
        let ring = RingPreroll::with_duration(cfg.preroll_seconds, cfg.sample_rate);
        let detector = ActivityDetector::new(cfg.amplitude_threshold, cfg.silence_timeout);
        Self {
            cfg,
            source_label: Arc::from(source_label),
            ring,
            detector,
            buffer: None,
            handoff,
            metrics: SegmenterMetrics::default(),
        }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.cfg
    }

    pub fn state(&self) -> DetectorState {
        self.detector.state()
    }

    pub fn preroll(&self) -> &RingPreroll {
        &self.ring
    }

    pub fn metrics(&self) -> &SegmenterMetrics {
        &self.metrics
    }

    /// Samples held by the open episode, if any.
    pub fn captured_samples(&self) -> Option<usize> {
        self.buffer.as_ref().map(SegmentBuffer::len)
    }

    /// Process one frame observed at `now` (source clock).
    ///
    /// The ring is updated after the decision so the onset frame is not
    /// duplicated in the pre-roll snapshot.
    pub fn on_frame(&mut self, frame: &[i16], now: Duration) -> FrameOutcome {
        self.metrics.frames_processed += 1;
        let frame_peak = peak(frame);
        if self.cfg.debug_amplitude {
            tracing::debug!(
                peak = frame_peak,
                threshold = self.cfg.amplitude_threshold,
                at_ms = now.as_millis() as u64,
                "frame peak"
            );
        }

        let outcome = match self.detector.evaluate(frame_peak, now) {
            Transition::StayIdle => FrameOutcome::Idle,
            Transition::Onset => self.start_episode(frame, now),
            Transition::Continue => self.extend_episode(frame, now),
            Transition::Offset => match self.append(frame) {
                Ok(()) => self.finish_episode(EndReason::Silence, None),
                Err(err) => self.abort_episode(err, now),
            },
        };
        if let FrameOutcome::Finished {
            reason: EndReason::MaxDuration,
            ..
        } = outcome
        {
            // The whole window just went out with the cut segment.
            self.ring.clear();
        } else {
            self.ring.push_slice(frame);
        }
        outcome
    }

    /// Account for frames the source could not deliver. The state machine
    /// keeps running on the next frame; the segment simply has a gap.
    pub fn record_skipped_frames(&mut self, frames: usize) {
        self.metrics.frames_skipped += frames;
    }

    /// Finalise an open episode on shutdown so it is flushed, not lost.
    ///
    /// Call only after the source has stopped: unlike the frame path this
    /// waits up to [`SHUTDOWN_FLUSH_TIMEOUT`] for room in the queue.
    pub fn finish(&mut self) -> FrameOutcome {
        self.finish_within(SHUTDOWN_FLUSH_TIMEOUT)
    }

    pub fn finish_within(&mut self, timeout: Duration) -> FrameOutcome {
        match self.detector.state() {
            DetectorState::Capturing => self.finish_episode(EndReason::Shutdown, Some(timeout)),
            DetectorState::Idle => FrameOutcome::Idle,
        }
    }

    fn start_episode(&mut self, frame: &[i16], now: Duration) -> FrameOutcome {
        let threshold_half = self.detector.threshold() / 2;
        match seed_buffer(&self.ring, threshold_half, self.cfg.initial_capacity(), frame) {
            Ok((buffer, preroll_samples)) => {
                self.buffer = Some(buffer);
                self.metrics.buffer_allocations += 1;
                self.metrics.episodes_started += 1;
                self.handoff.note_onset();
                FrameOutcome::Onset { preroll_samples }
            }
            Err(err) => self.abort_episode(err, now),
        }
    }

    fn extend_episode(&mut self, frame: &[i16], now: Duration) -> FrameOutcome {
        if let Err(err) = self.append(frame) {
            return self.abort_episode(err, now);
        }
        let captured = self.captured_samples().unwrap_or(0);
        if captured >= self.cfg.max_samples() {
            return self.finish_episode(EndReason::MaxDuration, None);
        }
        FrameOutcome::Capturing
    }

    fn append(&mut self, frame: &[i16]) -> Result<(), CaptureError> {
        match self.buffer.as_mut() {
            Some(buffer) => buffer.append(frame),
            None => Ok(()),
        }
    }

    /// `wait` is `None` on the frame path, where a full queue never blocks.
    fn finish_episode(&mut self, reason: EndReason, wait: Option<Duration>) -> FrameOutcome {
        self.detector.reset();
        let Some(mut buffer) = self.buffer.take() else {
            return FrameOutcome::Idle;
        };
        self.metrics.buffer_reallocations += buffer.reallocations();
        if reason != EndReason::MaxDuration {
            buffer.truncate_trailing(self.cfg.remove_samples());
        }
        if buffer.is_empty() {
            self.metrics.segments_discarded += 1;
            return FrameOutcome::Discarded;
        }

        let samples = buffer.len();
        let segment = Segment {
            samples: buffer.into_samples(),
            sample_rate: self.cfg.sample_rate,
            source_label: self.source_label.clone(),
            ended_at: SystemTime::now(),
            reason,
        };
        let event = PipelineEvent::Segment(segment);
        let queued = match wait {
            Some(timeout) => self.handoff.hand_off_waiting(event, timeout),
            None => self.handoff.hand_off(event),
        };
        if queued {
            self.metrics.segments_emitted += 1;
        } else {
            self.metrics.segments_rejected += 1;
        }
        FrameOutcome::Finished { samples, reason }
    }

    fn abort_episode(&mut self, error: CaptureError, now: Duration) -> FrameOutcome {
        if let Some(buffer) = self.buffer.take() {
            self.metrics.buffer_reallocations += buffer.reallocations();
        }
        self.detector.reset();
        self.metrics.episodes_aborted += 1;
        self.handoff
            .hand_off(PipelineEvent::EpisodeAborted { at: now, error });
        FrameOutcome::Aborted
    }
}

/// Allocate the episode buffer and fill it with pre-roll plus the onset frame.
fn seed_buffer(
    ring: &RingPreroll,
    threshold_half: u16,
    initial_capacity: usize,
    frame: &[i16],
) -> Result<(SegmentBuffer, usize), CaptureError> {
    let (head, tail) = ring.onset_slices(threshold_half);
    let preroll_samples = head.len() + tail.len();
    let mut buffer = SegmentBuffer::with_capacity(initial_capacity)?;
    buffer.append(head)?;
    buffer.append(tail)?;
    buffer.append(frame)?;
    Ok((buffer, preroll_samples))
}
