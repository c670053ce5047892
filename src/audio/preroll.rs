//! Fixed-capacity circular buffer holding the most recent audio.
//!
//! The segmenter pushes every frame through here so that, when an onset is
//! detected, the audio leading up to it can be recovered.

/// Rolling window of the last `capacity` samples.
#[derive(Debug, Clone)]
pub struct RingPreroll {
    data: Vec<i16>,
    write_pos: usize,
    filled: bool,
}

impl RingPreroll {
    /// Allocate the backing storage once; `push` never allocates afterwards.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            write_pos: 0,
            filled: false,
        }
    }

    /// Ring sized for `seconds` of audio at `sample_rate`.
    pub fn with_duration(seconds: f32, sample_rate: u32) -> Self {
        let capacity = (f64::from(seconds.max(0.0)) * f64::from(sample_rate)).round() as usize;
        Self::new(capacity)
    }

    #[inline]
    pub fn push(&mut self, sample: i16) {
        if self.data.is_empty() {
            return;
        }
        self.data[self.write_pos] = sample;
        self.write_pos += 1;
        if self.write_pos == self.data.len() {
            self.write_pos = 0;
            self.filled = true;
        }
    }

    pub fn push_slice(&mut self, samples: &[i16]) {
        // Only the tail of an oversized frame can survive in the ring.
        let skip = samples.len().saturating_sub(self.data.len());
        for &sample in &samples[skip..] {
            self.push(sample);
        }
    }

    /// Forget the buffered window without releasing storage.
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.filled = false;
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of valid samples (`min(total_written, capacity)`).
    pub fn len(&self) -> usize {
        if self.filled {
            self.data.len()
        } else {
            self.write_pos
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The buffered window in chronological order, as two slices (the second is
    /// empty until the ring has wrapped).
    pub fn as_slices(&self) -> (&[i16], &[i16]) {
        if self.filled {
            (&self.data[self.write_pos..], &self.data[..self.write_pos])
        } else {
            (&self.data[..self.write_pos], &[])
        }
    }

    /// Like [`as_slices`](Self::as_slices) but with leading samples quieter than
    /// `threshold_half` skipped. When nothing reaches `threshold_half` the full
    /// window is returned.
    pub fn onset_slices(&self, threshold_half: u16) -> (&[i16], &[i16]) {
        let (head, tail) = self.as_slices();
        let loud = |sample: &i16| sample.unsigned_abs() >= threshold_half;
        if let Some(idx) = head.iter().position(loud) {
            return (&head[idx..], tail);
        }
        if let Some(idx) = tail.iter().position(loud) {
            return (&tail[idx..], &[]);
        }
        (head, tail)
    }

    /// Owned copy of [`onset_slices`](Self::onset_slices). Does not touch ring state.
    pub fn snapshot_from_onset(&self, threshold_half: u16) -> Vec<i16> {
        let (head, tail) = self.onset_slices(threshold_half);
        let mut out = Vec::with_capacity(head.len() + tail.len());
        out.extend_from_slice(head);
        out.extend_from_slice(tail);
        out
    }
}
