use super::defaults::{
    MAX_CHUNK_SIZE, MAX_DELIVER_ATTEMPTS, MAX_PREROLL_SECONDS, MAX_SAMPLE_RATE,
    MAX_SEGMENT_HARD_LIMIT_SECONDS, MAX_SEGMENT_QUEUE_CAPACITY, MAX_SILENCE_TIMEOUT_SECONDS,
    MAX_SOURCE_LABEL_BYTES, MIN_CHUNK_SIZE, MIN_SAMPLE_RATE,
};
use super::AppConfig;
use anyhow::{bail, Result};
use clap::Parser;

impl AppConfig {
    /// Parse CLI arguments and validate them right away. Clap handles its
    /// own usage errors (and `--help`) by exiting.
    pub fn parse_args() -> Result<Self> {
        Self::parse_args_from(std::env::args_os())
    }

    pub fn parse_args_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut config = Self::parse_from(args);
        config.validate()?;
        Ok(config)
    }

    /// Check every value before any audio is opened. Fails on the first
    /// problem so a misconfigured unit never starts recording.
    pub fn validate(&mut self) -> Result<()> {
        if !(0..=i32::from(i16::MAX)).contains(&self.amplitude_threshold) {
            bail!(
                "--amplitude-threshold must be between 0 and {}, got {}",
                i16::MAX,
                self.amplitude_threshold
            );
        }

        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            bail!(
                "--sample-rate must be between {MIN_SAMPLE_RATE} and {MAX_SAMPLE_RATE} Hz, got {}",
                self.sample_rate
            );
        }
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            bail!(
                "--chunk-size must be between {MIN_CHUNK_SIZE} and {MAX_CHUNK_SIZE}, got {}",
                self.chunk_size
            );
        }

        if !(1..=MAX_SILENCE_TIMEOUT_SECONDS).contains(&self.silence_timeout_seconds) {
            bail!(
                "--silence-timeout-seconds must be between 1 and {MAX_SILENCE_TIMEOUT_SECONDS}, got {}",
                self.silence_timeout_seconds
            );
        }
        if u64::from(self.remove_last_seconds) > self.silence_timeout_seconds {
            bail!(
                "--remove-last-seconds ({}) must not exceed --silence-timeout-seconds ({})",
                self.remove_last_seconds,
                self.silence_timeout_seconds
            );
        }

        if !self.preroll_seconds.is_finite()
            || !(0.0..=MAX_PREROLL_SECONDS).contains(&self.preroll_seconds)
        {
            bail!(
                "--preroll-seconds must be between 0 and {MAX_PREROLL_SECONDS}, got {}",
                self.preroll_seconds
            );
        }

        if u64::from(self.max_segment_seconds) <= self.silence_timeout_seconds
            || self.max_segment_seconds > MAX_SEGMENT_HARD_LIMIT_SECONDS
        {
            bail!(
                "--max-segment-seconds must be greater than --silence-timeout-seconds ({}) and at most {MAX_SEGMENT_HARD_LIMIT_SECONDS}, got {}",
                self.silence_timeout_seconds,
                self.max_segment_seconds
            );
        }
        if self.preroll_seconds >= self.max_segment_seconds as f32 {
            bail!(
                "--preroll-seconds ({}) must be shorter than --max-segment-seconds ({})",
                self.preroll_seconds,
                self.max_segment_seconds
            );
        }

        if !(1..=MAX_SEGMENT_QUEUE_CAPACITY).contains(&self.segment_queue_capacity) {
            bail!(
                "--segment-queue-capacity must be between 1 and {MAX_SEGMENT_QUEUE_CAPACITY}, got {}",
                self.segment_queue_capacity
            );
        }
        if !(1..=MAX_DELIVER_ATTEMPTS).contains(&self.deliver_attempts) {
            bail!(
                "--deliver-attempts must be between 1 and {MAX_DELIVER_ATTEMPTS}, got {}",
                self.deliver_attempts
            );
        }

        validate_source_label(&self.source_label)?;

        if self.recording_dir.as_os_str().is_empty() {
            bail!("--recording-dir must not be empty");
        }

        if let Some(device) = &self.input_device {
            let trimmed = device.trim();
            if trimmed.is_empty() {
                bail!("--input-device must not be empty");
            }
            self.input_device = Some(trimmed.to_string());
        }

        if let Some(cmd) = &self.sink_cmd {
            if cmd.trim().is_empty() {
                bail!("--sink-cmd must not be empty");
            }
        }

        if let Some(path) = &self.replay_wav {
            if !path.is_file() {
                bail!("--replay-wav file '{}' does not exist", path.display());
            }
        }

        Ok(())
    }
}

/// The label becomes part of every file name, so it must not be able to
/// escape the recording directory.
pub(super) fn validate_source_label(label: &str) -> Result<()> {
    if label.is_empty() {
        bail!("--source-label must not be empty");
    }
    if label.len() > MAX_SOURCE_LABEL_BYTES {
        bail!("--source-label must be at most {MAX_SOURCE_LABEL_BYTES} bytes");
    }
    if label.contains('/') || label.contains('\\') || label.contains("..") {
        bail!("--source-label must not contain path separators or '..'");
    }
    if !label.chars().all(|ch| ch.is_ascii_graphic() || ch == ' ') {
        bail!("--source-label must be printable ASCII");
    }
    Ok(())
}
