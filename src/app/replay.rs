//! Offline source: feeds a recorded WAV through the same segmenter the live
//! device uses, as fast as the delivery worker keeps up.

use super::shutdown::shutdown_requested;
use crate::audio::{FramePump, Segmenter};
use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub frames: usize,
    pub samples: u64,
    pub skipped_frames: usize,
}

/// An opened replay file whose format has been checked.
pub struct ReplaySource {
    reader: WavReader<BufReader<File>>,
    channels: usize,
    sample_rate: u32,
}

impl ReplaySource {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = WavReader::open(path)
            .with_context(|| format!("failed to open replay file '{}'", path.display()))?;
        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            bail!(
                "replay file '{}' must be 16-bit PCM, found {}-bit {:?}",
                path.display(),
                spec.bits_per_sample,
                spec.sample_format
            );
        }
        if spec.channels == 0 {
            bail!("replay file '{}' has no channels", path.display());
        }
        Ok(Self {
            reader,
            channels: usize::from(spec.channels),
            sample_rate: spec.sample_rate,
        })
    }

    /// The file's rate; it replaces the configured capture rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Push the whole file through `segmenter` in `chunk_size`-frame chunks.
    /// Stops early on a shutdown signal; a truncated file ends the replay
    /// with what was read so far.
    pub fn run(mut self, segmenter: Arc<Mutex<Segmenter>>, chunk_size: usize) -> Result<ReplayStats> {
        let chunk_size = chunk_size.max(1);
        let skipped = Arc::new(AtomicUsize::new(0));
        let mut pump = FramePump::new(segmenter, self.sample_rate, chunk_size, skipped.clone());
        let interleaved_len = chunk_size * self.channels;
        let mut interleaved = Vec::with_capacity(interleaved_len);
        let mut stats = ReplayStats {
            frames: 0,
            samples: 0,
            skipped_frames: 0,
        };

        let mut samples = self.reader.samples::<i16>();
        loop {
            if shutdown_requested() {
                tracing::info!("replay interrupted by shutdown request");
                break;
            }
            interleaved.clear();
            for sample in samples.by_ref().take(interleaved_len) {
                match sample {
                    Ok(sample) => interleaved.push(sample),
                    Err(err) => {
                        tracing::warn!(error = %err, "replay file truncated; stopping early");
                        break;
                    }
                }
            }
            if interleaved.is_empty() {
                break;
            }
            pump.push(&interleaved, self.channels, |sample| sample);
            stats.frames += 1;
            stats.samples += (interleaved.len() / self.channels) as u64;
            if interleaved.len() < interleaved_len {
                break;
            }
        }
        stats.skipped_frames = skipped.load(Ordering::Relaxed);
        Ok(stats)
    }
}
