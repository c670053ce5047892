use super::segment::Segment;
use super::segmenter::Segmenter;
use crate::error::CaptureError;
use crossbeam_channel::{SendTimeoutError, Sender, TrySendError};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, TryLockError,
};
use std::time::Duration;

/// Everything that leaves the frame path travels as one of these.
#[derive(Debug)]
pub enum PipelineEvent {
    Segment(Segment),
    EpisodeAborted {
        at: Duration,
        error: CaptureError,
    },
    /// Free-form status notice from the supervising thread.
    Status(String),
}

impl PipelineEvent {
    pub fn label(&self) -> &'static str {
        match self {
            PipelineEvent::Segment(_) => "segment",
            PipelineEvent::EpisodeAborted { .. } => "episode_aborted",
            PipelineEvent::Status(_) => "status",
        }
    }
}

/// What a full queue does to the event being handed off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffPolicy {
    /// Real-time sources: the newest event is rejected and counted.
    RejectNewest,
    /// Offline sources: wait for the worker to make room.
    Backpressure,
}

/// Sender side of the segment queue.
///
/// With [`HandoffPolicy::RejectNewest`] a full queue rejects the newest event
/// and bumps `rejected`; the frame path never waits on the worker. Onsets are
/// counted here instead of queued so notices never take a slot a segment needs.
#[derive(Debug, Clone)]
pub struct SegmentHandoff {
    sender: Sender<PipelineEvent>,
    policy: HandoffPolicy,
    rejected: Arc<AtomicUsize>,
    onsets: Arc<AtomicUsize>,
}

impl SegmentHandoff {
    pub fn new(sender: Sender<PipelineEvent>) -> Self {
        Self::with_policy(sender, HandoffPolicy::RejectNewest)
    }

    pub fn with_policy(sender: Sender<PipelineEvent>, policy: HandoffPolicy) -> Self {
        Self {
            sender,
            policy,
            rejected: Arc::new(AtomicUsize::new(0)),
            onsets: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn policy(&self) -> HandoffPolicy {
        self.policy
    }

    /// Returns `true` when the event was queued.
    pub fn hand_off(&self, event: PipelineEvent) -> bool {
        match self.policy {
            HandoffPolicy::RejectNewest => match self.sender.try_send(event) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    self.rejected.fetch_add(1, Ordering::Relaxed);
                    false
                }
                // Worker already gone (shutdown); nothing left to deliver to.
                Err(TrySendError::Disconnected(_)) => false,
            },
            HandoffPolicy::Backpressure => self.sender.send(event).is_ok(),
        }
    }

    /// Blocking handoff for use once frames have stopped arriving. Gives up
    /// after `timeout` so a wedged sink cannot hold shutdown forever.
    pub fn hand_off_waiting(&self, event: PipelineEvent, timeout: Duration) -> bool {
        match self.sender.send_timeout(event, timeout) {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(event)) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    event = event.label(),
                    waited_ms = timeout.as_millis() as u64,
                    "segment queue still full at shutdown; event dropped"
                );
                false
            }
            Err(SendTimeoutError::Disconnected(_)) => false,
        }
    }

    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::Relaxed)
    }

    pub(crate) fn note_onset(&self) {
        self.onsets.fetch_add(1, Ordering::Relaxed);
    }

    /// Episodes started so far; read by the supervisor without locking.
    pub fn onsets(&self) -> usize {
        self.onsets.load(Ordering::Relaxed)
    }
}

/// Downmix interleaved input to mono i16 while applying `convert` so the
/// segmenter sees one channel regardless of the device layout.
pub(crate) fn append_downmixed_samples<T, F>(
    buf: &mut Vec<i16>,
    data: &[T],
    channels: usize,
    mut convert: F,
) where
    T: Copy,
    F: FnMut(T) -> i16,
{
    if channels <= 1 {
        buf.extend(data.iter().copied().map(&mut convert));
        return;
    }

    let mut acc = 0i32;
    let mut count = 0usize;
    for sample in data.iter().copied() {
        acc += i32::from(convert(sample));
        count += 1;
        if count == channels {
            buf.push((acc / channels as i32) as i16);
            acc = 0;
            count = 0;
        }
    }
    if count > 0 {
        buf.push((acc / count as i32) as i16);
    }
}

pub(crate) fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}

pub(crate) fn u16_to_i16(sample: u16) -> i16 {
    (i32::from(sample) - 32_768) as i16
}

/// Converts device callbacks into `Segmenter::on_frame` calls.
///
/// Owns a reusable mono scratch buffer and a sample clock. The segmenter is
/// shared with the supervising thread (which finalises it on shutdown), so the
/// callback only ever `try_lock`s; contention counts as a skipped frame.
pub(crate) struct FramePump {
    segmenter: Arc<Mutex<Segmenter>>,
    scratch: Vec<i16>,
    samples_seen: u64,
    sample_rate: u32,
    skipped: Arc<AtomicUsize>,
}

impl FramePump {
    pub(crate) fn new(
        segmenter: Arc<Mutex<Segmenter>>,
        sample_rate: u32,
        frame_hint: usize,
        skipped: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            segmenter,
            scratch: Vec::with_capacity(frame_hint.max(1)),
            samples_seen: 0,
            sample_rate: sample_rate.max(1),
            skipped,
        }
    }

    fn clock(&self) -> Duration {
        Duration::from_secs_f64(self.samples_seen as f64 / f64::from(self.sample_rate))
    }

    pub(crate) fn push<T, F>(&mut self, data: &[T], channels: usize, convert: F)
    where
        T: Copy,
        F: FnMut(T) -> i16,
    {
        self.scratch.clear();
        append_downmixed_samples(&mut self.scratch, data, channels, convert);
        let now = self.clock();
        self.samples_seen = self.samples_seen.saturating_add(self.scratch.len() as u64);
        match self.segmenter.try_lock() {
            Ok(mut segmenter) => {
                segmenter.on_frame(&self.scratch, now);
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                poisoned.into_inner().on_frame(&self.scratch, now);
            }
            Err(TryLockError::WouldBlock) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
