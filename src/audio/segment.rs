//! Growable capture buffer and the finished segment handed to the worker.

use crate::error::CaptureError;
use crate::naming;
#[cfg(test)]
use std::cell::Cell;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

#[cfg(test)]
thread_local! {
    static FAILED_ALLOCATIONS_PENDING: Cell<usize> = const { Cell::new(0) };
}

/// Make the next `count` buffer allocations on this thread fail.
#[cfg(test)]
pub(crate) fn fail_next_allocations(count: usize) {
    FAILED_ALLOCATIONS_PENDING.with(|pending| pending.set(count));
}

fn try_reserve(
    samples: &mut Vec<i16>,
    additional: usize,
    requested: usize,
) -> Result<(), CaptureError> {
    #[cfg(test)]
    {
        let injected = FAILED_ALLOCATIONS_PENDING.with(|pending| {
            let left = pending.get();
            if left > 0 {
                pending.set(left - 1);
            }
            left > 0
        });
        if injected {
            return Err(CaptureError::OutOfMemory { requested });
        }
    }
    samples
        .try_reserve_exact(additional)
        .map_err(|_| CaptureError::OutOfMemory { requested })
}

/// Samples captured for one activity episode.
///
/// `capacity` is the logical capacity: it starts at the requested size and
/// only ever doubles. Allocation goes through `try_reserve_exact` so a failed
/// allocation surfaces as [`CaptureError::OutOfMemory`] instead of aborting.
#[derive(Debug)]
pub struct SegmentBuffer {
    samples: Vec<i16>,
    capacity: usize,
    reallocations: usize,
}

impl SegmentBuffer {
    pub fn with_capacity(capacity: usize) -> Result<Self, CaptureError> {
        let mut samples = Vec::new();
        try_reserve(&mut samples, capacity, capacity)?;
        Ok(Self {
            samples,
            capacity,
            reallocations: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How many times the buffer had to grow since allocation.
    pub fn reallocations(&self) -> usize {
        self.reallocations
    }

    pub fn as_slice(&self) -> &[i16] {
        &self.samples
    }

    /// Make room for `additional` samples, doubling capacity as often as needed.
    /// A failure leaves the buffer untouched.
    pub fn ensure_capacity(&mut self, additional: usize) -> Result<(), CaptureError> {
        let needed = self
            .samples
            .len()
            .checked_add(additional)
            .ok_or(CaptureError::OutOfMemory {
                requested: usize::MAX,
            })?;
        if needed <= self.capacity {
            return Ok(());
        }
        let mut new_capacity = self.capacity.max(1);
        while new_capacity < needed {
            new_capacity = new_capacity
                .checked_mul(2)
                .ok_or(CaptureError::OutOfMemory { requested: needed })?;
        }
        let additional = new_capacity - self.samples.len();
        try_reserve(&mut self.samples, additional, new_capacity)?;
        self.capacity = new_capacity;
        self.reallocations += 1;
        Ok(())
    }

    pub fn append(&mut self, samples: &[i16]) -> Result<(), CaptureError> {
        self.ensure_capacity(samples.len())?;
        self.samples.extend_from_slice(samples);
        Ok(())
    }

    /// Drop the last `n_samples`, never going below zero.
    pub fn truncate_trailing(&mut self, n_samples: usize) {
        let keep = self.samples.len().saturating_sub(n_samples);
        self.samples.truncate(keep);
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}

/// Why an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Silence outlasted the timeout.
    Silence,
    /// The capture hit the configured maximum length.
    MaxDuration,
    /// The source stopped while an episode was still open.
    Shutdown,
}

impl EndReason {
    pub fn label(self) -> &'static str {
        match self {
            EndReason::Silence => "silence",
            EndReason::MaxDuration => "max_duration",
            EndReason::Shutdown => "shutdown",
        }
    }
}

/// A finished episode, moved out of the frame path exactly once.
#[derive(Debug)]
pub struct Segment {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub source_label: Arc<str>,
    /// Wall-clock time at which the offset was detected.
    pub ended_at: SystemTime,
    pub reason: EndReason,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    /// `{source_label}_{YYYYMMDD_HHMMSS}.wav` in local time.
    pub fn file_name(&self) -> String {
        naming::segment_file_name(&self.source_label, self.ended_at)
    }

    /// Human label passed to the sink along with the file path.
    pub fn delivery_label(&self) -> String {
        naming::delivery_label(&self.source_label, self.ended_at)
    }
}
