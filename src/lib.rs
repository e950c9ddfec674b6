pub mod audio;
pub mod config;
pub mod install;
pub mod job;
pub mod stt;
mod telemetry;

pub use job::{start_capture_job, CaptureJob, CaptureJobEvent, JobError};
pub use telemetry::init_tracing;
