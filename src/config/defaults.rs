pub const DEFAULT_AMPLITUDE_THRESHOLD: i32 = 300;
pub const DEFAULT_SILENCE_TIMEOUT_SECONDS: u64 = 5;
pub const DEFAULT_REMOVE_LAST_SECONDS: u32 = 2;
pub const DEFAULT_SAMPLE_RATE: u32 = crate::audio::DEFAULT_SAMPLE_RATE;
pub const DEFAULT_CHUNK_SIZE: u32 = 1024;
pub const DEFAULT_PREROLL_SECONDS: f32 = 1.0;
pub const DEFAULT_MAX_SEGMENT_SECONDS: u32 = 600;
pub const DEFAULT_SEGMENT_QUEUE_CAPACITY: usize = 8;
pub const DEFAULT_DELIVER_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECORDING_DIR: &str = "./recordings";
pub const DEFAULT_SOURCE_LABEL: &str = "radio";

pub(super) const MIN_SAMPLE_RATE: u32 = 8_000;
pub(super) const MAX_SAMPLE_RATE: u32 = 384_000;
pub(super) const MIN_CHUNK_SIZE: u32 = 16;
pub(super) const MAX_CHUNK_SIZE: u32 = 65_536;
pub(super) const MAX_SILENCE_TIMEOUT_SECONDS: u64 = 3_600;
pub(super) const MAX_PREROLL_SECONDS: f32 = 30.0;
pub(super) const MAX_SEGMENT_HARD_LIMIT_SECONDS: u32 = 14_400;
pub(super) const MAX_SEGMENT_QUEUE_CAPACITY: usize = 1_024;
pub(super) const MAX_DELIVER_ATTEMPTS: u32 = 20;
pub(super) const MAX_SOURCE_LABEL_BYTES: usize = 64;
