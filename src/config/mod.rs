//! Command-line / environment configuration and validation.

mod defaults;
#[cfg(test)]
mod tests;
mod validation;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

pub use defaults::{
    DEFAULT_AMPLITUDE_THRESHOLD, DEFAULT_CHUNK_SIZE, DEFAULT_DELIVER_ATTEMPTS,
    DEFAULT_MAX_SEGMENT_SECONDS, DEFAULT_PREROLL_SECONDS, DEFAULT_RECORDING_DIR,
    DEFAULT_REMOVE_LAST_SECONDS, DEFAULT_SAMPLE_RATE, DEFAULT_SEGMENT_QUEUE_CAPACITY,
    DEFAULT_SILENCE_TIMEOUT_SECONDS, DEFAULT_SOURCE_LABEL,
};

/// Options for the squelch recorder. Every value can also come from the
/// environment so an appliance can be configured with an env file.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "squelch-recorder",
    about = "Squelch Recorder: records each burst of activity on an audio input to its own WAV file",
    author,
    version
)]
pub struct AppConfig {
    /// Peak amplitude (0-32767) a frame must exceed to count as activity
    #[arg(
        long = "amplitude-threshold",
        env = "AMPLITUDE_THRESHOLD",
        default_value_t = DEFAULT_AMPLITUDE_THRESHOLD,
        allow_negative_numbers = true
    )]
    pub amplitude_threshold: i32,

    /// Seconds of silence that end a recording
    #[arg(
        long = "silence-timeout-seconds",
        env = "SILENCE_TIMEOUT_SECONDS",
        default_value_t = DEFAULT_SILENCE_TIMEOUT_SECONDS
    )]
    pub silence_timeout_seconds: u64,

    /// Seconds trimmed from the end of a recording (part of the silence tail)
    #[arg(
        long = "remove-last-seconds",
        env = "REMOVE_LAST_SECONDS",
        default_value_t = DEFAULT_REMOVE_LAST_SECONDS
    )]
    pub remove_last_seconds: u32,

    /// Capture sample rate (Hz)
    #[arg(long = "sample-rate", env = "SAMPLE_RATE", default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Frames requested per audio callback
    #[arg(long = "chunk-size", env = "CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u32,

    /// Seconds of audio kept from before the onset
    #[arg(
        long = "preroll-seconds",
        env = "PREROLL_SECONDS",
        default_value_t = DEFAULT_PREROLL_SECONDS
    )]
    pub preroll_seconds: f32,

    /// Log the peak amplitude of every frame (diagnostic only)
    #[arg(long = "debug-amplitude", env = "DEBUG_AMPLITUDE", default_value_t = false)]
    pub debug_amplitude: bool,

    /// Longest single recording before it is cut and a new one started
    #[arg(
        long = "max-segment-seconds",
        env = "MAX_SEGMENT_SECONDS",
        default_value_t = DEFAULT_MAX_SEGMENT_SECONDS
    )]
    pub max_segment_seconds: u32,

    /// Finished recordings that may wait for the writer before new ones are dropped
    #[arg(
        long = "segment-queue-capacity",
        env = "SEGMENT_QUEUE_CAPACITY",
        default_value_t = DEFAULT_SEGMENT_QUEUE_CAPACITY
    )]
    pub segment_queue_capacity: usize,

    /// Directory recordings are written to
    #[arg(
        long = "recording-dir",
        env = "RECORDING_DIRECTORY",
        default_value = DEFAULT_RECORDING_DIR
    )]
    pub recording_dir: PathBuf,

    /// Name of the sound source, used as the file name prefix
    #[arg(long = "source-label", env = "SOURCE_LABEL", default_value = DEFAULT_SOURCE_LABEL)]
    pub source_label: String,

    /// Input device: index from --list-input-devices or part of its name
    #[arg(long = "input-device", env = "AUDIO_INPUT_DEVICE")]
    pub input_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Read audio from a 16-bit PCM WAV file instead of a device
    #[arg(long = "replay-wav", value_name = "FILE")]
    pub replay_wav: Option<PathBuf>,

    /// Command run for each recording ("deliver PATH LABEL") and notice ("status MESSAGE")
    #[arg(long = "sink-cmd", env = "SINK_CMD")]
    pub sink_cmd: Option<String>,

    /// Delivery attempts per recording when using --sink-cmd
    #[arg(
        long = "deliver-attempts",
        env = "DELIVER_ATTEMPTS",
        default_value_t = DEFAULT_DELIVER_ATTEMPTS
    )]
    pub deliver_attempts: u32,

    /// Log verbosity
    #[arg(
        long = "log-level",
        env = "SQUELCH_LOG_LEVEL",
        value_enum,
        default_value_t = LogLevel::Info
    )]
    pub log_level: LogLevel,

    /// Write logs to this file (size-capped) instead of stderr
    #[arg(long = "log-file", env = "SQUELCH_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long = "log-json", env = "SQUELCH_LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
