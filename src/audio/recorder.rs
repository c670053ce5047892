//! Live microphone / line-in source via CPAL.
//!
//! Handles device selection and format conversion, then pushes every callback
//! buffer straight into the shared [`Segmenter`] as one frame.

use super::dispatch::{f32_to_i16, u16_to_i16, FramePump};
use super::segmenter::Segmenter;
use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Audio input device wrapper.
pub struct Recorder {
    device: cpal::Device,
}

impl Recorder {
    /// Input device names in enumeration order; the position is the index
    /// accepted by `--input-device`.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        Ok(devices
            .map(|d| d.name().unwrap_or_else(|_| "Unknown Device".to_string()))
            .collect())
    }

    /// Open the preferred device (index or name fragment) or the host default.
    pub fn new(preferred_device: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(wanted) => {
                let devices: Vec<cpal::Device> = host
                    .input_devices()
                    .context("no input devices available")?
                    .collect();
                let names: Vec<String> = devices
                    .iter()
                    .map(|d| d.name().unwrap_or_default())
                    .collect();
                let idx = select_device_index(&names, wanted)
                    .ok_or_else(|| anyhow!("no input device matches '{wanted}'"))?;
                devices
                    .into_iter()
                    .nth(idx)
                    .ok_or_else(|| anyhow!("input device {idx} disappeared"))?
            }
            None => host
                .default_input_device()
                .context("no default input device available")?,
        };
        Ok(Self { device })
    }

    pub fn device_name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string())
    }

    /// Start streaming into `segmenter` at `sample_rate`, asking the driver for
    /// `chunk_size` frames per callback. Falls back to the driver's default
    /// buffer size if a fixed size is refused.
    pub fn start(
        &self,
        segmenter: Arc<Mutex<Segmenter>>,
        sample_rate: u32,
        chunk_size: u32,
    ) -> Result<CaptureStream> {
        let default_config = self
            .device
            .default_input_config()
            .context("failed to query default input config")?;
        let format = default_config.sample_format();
        let channels = default_config.channels().max(1);
        let skipped = Arc::new(AtomicUsize::new(0));
        let stream_errors = Arc::new(AtomicUsize::new(0));

        tracing::info!(
            device = %self.device_name(),
            format = ?format,
            channels,
            sample_rate,
            chunk_size,
            "opening input stream"
        );

        let mut config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: BufferSize::Fixed(chunk_size),
        };
        let make_pump = || {
            FramePump::new(
                segmenter.clone(),
                sample_rate,
                chunk_size as usize,
                skipped.clone(),
            )
        };
        let stream = match self.build_stream(&config, format, make_pump(), stream_errors.clone()) {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(%err, "fixed buffer size rejected; using driver default");
                config.buffer_size = BufferSize::Default;
                self.build_stream(&config, format, make_pump(), stream_errors.clone())?
            }
        };
        stream.play().context("failed to start input stream")?;

        Ok(CaptureStream {
            stream,
            skipped,
            stream_errors,
        })
    }

    fn build_stream(
        &self,
        config: &StreamConfig,
        format: SampleFormat,
        mut pump: FramePump,
        stream_errors: Arc<AtomicUsize>,
    ) -> Result<cpal::Stream> {
        let channels = usize::from(config.channels);
        let err_fn = move |err: cpal::StreamError| {
            stream_errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(%err, "audio stream error");
        };
        let stream = match format {
            SampleFormat::I16 => self.device.build_input_stream(
                config,
                move |data: &[i16], _| pump.push(data, channels, |sample| sample),
                err_fn,
                None,
            )?,
            SampleFormat::U16 => self.device.build_input_stream(
                config,
                move |data: &[u16], _| pump.push(data, channels, u16_to_i16),
                err_fn,
                None,
            )?,
            SampleFormat::F32 => self.device.build_input_stream(
                config,
                move |data: &[f32], _| pump.push(data, channels, f32_to_i16),
                err_fn,
                None,
            )?,
            other => return Err(anyhow!("unsupported sample format: {other:?}")),
        };
        Ok(stream)
    }
}

/// A running input stream. Dropping it stops the callbacks.
pub struct CaptureStream {
    stream: cpal::Stream,
    skipped: Arc<AtomicUsize>,
    stream_errors: Arc<AtomicUsize>,
}

impl CaptureStream {
    /// Frames dropped because the segmenter was busy (source overflow).
    pub fn skipped_frames(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn stream_errors(&self) -> usize {
        self.stream_errors.load(Ordering::Relaxed)
    }

    /// Stop delivering frames. After this returns no callback touches the
    /// segmenter again.
    pub fn stop(self) -> usize {
        if let Err(err) = self.stream.pause() {
            tracing::warn!(%err, "failed to pause audio stream");
        }
        let skipped = self.skipped_frames();
        drop(self.stream);
        skipped
    }
}

/// Resolve `wanted` against device names: a number selects by position,
/// anything else is a case-insensitive name fragment (first match wins).
pub fn select_device_index(names: &[String], wanted: &str) -> Option<usize> {
    let wanted = wanted.trim();
    if !wanted.is_empty() && wanted.chars().all(|ch| ch.is_ascii_digit()) {
        return wanted.parse::<usize>().ok().filter(|idx| *idx < names.len());
    }
    let needle = wanted.to_lowercase();
    names
        .iter()
        .position(|name| name.to_lowercase().contains(&needle))
}
