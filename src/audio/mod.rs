//! Real-time capture core.
//!
//! Frames from a source (CPAL device or replayed WAV) go through the
//! [`Segmenter`], which keeps a pre-roll ring, detects activity by peak
//! amplitude, and hands finished segments to the delivery worker over a
//! bounded queue. Nothing on the frame path blocks on I/O.

/// Capture rate used when none is configured.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

mod detector;
mod dispatch;
mod preroll;
mod recorder;
mod segment;
mod segmenter;
pub mod wav;

pub use detector::{peak, ActivityDetector, DetectorState, Transition};
pub use dispatch::{HandoffPolicy, PipelineEvent, SegmentHandoff};
pub use preroll::RingPreroll;
pub use recorder::{select_device_index, CaptureStream, Recorder};
pub use segment::{EndReason, Segment, SegmentBuffer};
pub use segmenter::{
    FrameOutcome, Segmenter, SegmenterConfig, SegmenterMetrics, INITIAL_CAPACITY_SECONDS,
    SHUTDOWN_FLUSH_TIMEOUT,
};
pub(crate) use dispatch::FramePump;
