pub mod app;
pub mod audio;
pub mod config;
pub mod error;
mod lock;
pub mod naming;
pub mod sink;
mod telemetry;
pub mod worker;

pub(crate) use lock::lock_or_recover;
pub use app::{run, RunSummary};
pub use error::CaptureError;
pub use telemetry::init_tracing;
