//! Error taxonomy for the capture core.
//!
//! Frame-path errors are always recovered where they happen; these values only
//! travel to the delivery worker so they can be reported.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// Growing or allocating the segment buffer failed. Fatal to the current
    /// episode only.
    #[error("segment buffer allocation of {requested} samples failed")]
    OutOfMemory { requested: usize },

    /// The audio source dropped or could not hand over a frame.
    #[error("audio source overflowed; frame skipped")]
    SourceOverflow,

    #[error("failed to write recording '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode WAV data")]
    Encode(#[from] hound::Error),
}

impl CaptureError {
    /// Short machine-friendly label used in status notices and logs.
    pub fn label(&self) -> &'static str {
        match self {
            CaptureError::OutOfMemory { .. } => "out_of_memory",
            CaptureError::SourceOverflow => "source_overflow",
            CaptureError::Write { .. } => "write_failure",
            CaptureError::Encode(_) => "encode_failure",
        }
    }
}
