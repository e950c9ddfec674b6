//! Audio capture and silence detection pipeline.
//!
//! Provides microphone recording that stops itself when the speaker goes
//! quiet. Audio is captured via CPAL, downmixed and resampled to 16kHz mono
//! (the format the transcription API expects), and returned as a finished
//! capture session once a stop condition fires.

/// Target sample rate for the transcription payload.
pub const TARGET_RATE: u32 = 16_000;

/// Target channel count for the transcription payload.
pub const TARGET_CHANNELS: u16 = 1;

mod capture;
mod dispatch;
mod level;
mod resample;
mod silence;
mod source;
#[cfg(test)]
mod tests;
mod wav;

pub use capture::{
    CancelToken, CaptureConfig, CaptureError, CaptureMetrics, CaptureSession, RecordingController,
    StopReason,
};
pub use level::{measure, LevelMeter, LoudnessSample};
pub use silence::{SilenceConfig, SilenceDecision, SilenceDetector};
pub use source::{AudioSource, CpalSource, FrameStream};
pub use wav::encode_wav_mono16;
