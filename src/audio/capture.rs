//! Recording loop with silence-gated auto-stop.
//!
//! Drives an [`AudioSource`] until one of three things happens: the silence
//! gate fires after speech, the duration ceiling is hit, or the caller
//! cancels. Every exit path releases the source before the session is
//! returned, so a crash in the consumer never leaves the microphone open.

use super::level::{self, LevelMeter};
use super::resample;
use super::silence::{SilenceConfig, SilenceDecision, SilenceDetector};
use super::source::AudioSource;
use super::TARGET_RATE;
use crossbeam_channel::RecvTimeoutError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// How often the readiness wait and the stop grace period poll their state.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Capture failures the caller can react to individually.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The source could not be opened or never produced audio.
    #[error("audio source failed to start: {0}")]
    SourceStart(String),
    /// The finalized capture contained no audio at all.
    #[error("no audio captured")]
    EmptyRecording,
    /// The source died after recording had begun.
    #[error("audio source failed while recording: {0}")]
    SourceRuntime(String),
}

/// Shared cancellation flag; cloning hands out another handle to the same
/// flag. Cancelling twice is a no-op.
#[derive(Clone, Debug)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tuning for one recording session.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Rate the session is normalized to before leaving the capture loop.
    pub sample_rate: u32,
    /// Granularity of loudness measurement and of stop-condition checks.
    pub frame_duration: Duration,
    /// Hard ceiling; the session stops unconditionally once it is reached.
    pub max_duration: Duration,
    pub silence: SilenceConfig,
    /// Bound of the frame channel between the source and the capture loop.
    pub channel_capacity: usize,
    /// How long to wait for the source's first audio before giving up.
    pub ready_timeout: Duration,
    /// How long to wait for the source to wind down after stop.
    pub stop_grace: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: TARGET_RATE,
            frame_duration: Duration::from_millis(100),
            max_duration: Duration::from_secs(30),
            silence: SilenceConfig::default(),
            channel_capacity: 64,
            ready_timeout: Duration::from_secs(3),
            stop_grace: Duration::from_millis(500),
        }
    }
}

impl CaptureConfig {
    /// Samples per frame at the target rate.
    pub fn frame_samples(&self) -> usize {
        ((u64::from(self.sample_rate) * self.frame_duration.as_millis() as u64) / 1000).max(1)
            as usize
    }
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The silence gate fired; `trailing` is the quiet run that triggered it.
    Silence { trailing: Duration },
    /// The duration ceiling was reached.
    MaxDuration,
    /// The caller cancelled the session.
    Cancelled,
}

impl StopReason {
    pub fn label(&self) -> &'static str {
        match self {
            StopReason::Silence { .. } => "silence",
            StopReason::MaxDuration => "max_duration",
            StopReason::Cancelled => "cancelled",
        }
    }
}

/// Counters collected during capture for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureMetrics {
    pub captured: Duration,
    pub speech: Duration,
    pub trailing_silence: Duration,
    pub frames_processed: usize,
    pub frames_dropped: usize,
}

/// A finished recording: normalized mono PCM plus why and how it ended.
/// Always holds at least one sample; empty captures surface as
/// [`CaptureError::EmptyRecording`] instead.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    samples: Vec<f32>,
    sample_rate: u32,
    reason: StopReason,
    metrics: CaptureMetrics,
}

impl CaptureSession {
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn reason(&self) -> StopReason {
        self.reason
    }

    pub fn metrics(&self) -> &CaptureMetrics {
        &self.metrics
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate.max(1)))
    }
}

enum Outcome {
    Stopped(StopReason),
    Failed(CaptureError),
}

/// Runs recording sessions against a [`CaptureConfig`].
pub struct RecordingController<'a> {
    cfg: &'a CaptureConfig,
}

impl<'a> RecordingController<'a> {
    pub fn new(cfg: &'a CaptureConfig) -> Self {
        Self { cfg }
    }

    /// Record one session.
    ///
    /// Blocks until a stop condition fires. `on_ready` runs exactly once,
    /// after the source has produced its first audio; callers use it to tell
    /// the user that recording has actually begun. Cancellation is honored at
    /// any point and takes effect within roughly one frame duration.
    ///
    /// The ceiling is enforced on both captured audio and wall-clock time,
    /// whichever is exceeded first, so a stalled source still terminates.
    /// When the silence gate and the ceiling land on the same frame, the
    /// silence stop wins.
    pub fn record<F>(
        &self,
        source: &mut dyn AudioSource,
        cancel: &CancelToken,
        meter: Option<&LevelMeter>,
        on_ready: F,
    ) -> Result<CaptureSession, CaptureError>
    where
        F: FnOnce(),
    {
        let cfg = self.cfg;
        let stream = match source.start(cfg.frame_duration, cfg.channel_capacity) {
            Ok(stream) => stream,
            Err(err) => return Err(CaptureError::SourceStart(format!("{err:#}"))),
        };

        // Hold the "recording" announcement until real audio arrives; a
        // device that never produces is a start failure, not a silent hang.
        let ready_deadline = Instant::now() + cfg.ready_timeout;
        let ready = loop {
            if cancel.is_cancelled() {
                break false;
            }
            match stream.ready.recv_timeout(POLL_INTERVAL) {
                Ok(()) => break true,
                Err(RecvTimeoutError::Timeout) => {
                    if Instant::now() >= ready_deadline {
                        break false;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break false,
            }
        };
        if !ready {
            source.stop();
            drop(stream);
            if cancel.is_cancelled() {
                return Err(CaptureError::EmptyRecording);
            }
            return Err(CaptureError::SourceStart(format!(
                "no audio within {:?}; check microphone permissions and availability",
                cfg.ready_timeout
            )));
        }
        on_ready();

        let started = Instant::now();
        let frame_samples = cfg.frame_samples();
        let mut detector = SilenceDetector::new(cfg.silence);
        let mut samples: Vec<f32> = Vec::new();
        let mut captured = Duration::ZERO;
        let mut frames_processed = 0usize;

        let outcome = loop {
            if cancel.is_cancelled() {
                break Outcome::Stopped(StopReason::Cancelled);
            }
            if started.elapsed() >= cfg.max_duration {
                break Outcome::Stopped(StopReason::MaxDuration);
            }
            match stream.frames.recv_timeout(cfg.frame_duration) {
                Ok(raw) => {
                    let frame = resample::fit_frame(
                        raw,
                        stream.sample_rate,
                        cfg.sample_rate,
                        frame_samples,
                    );
                    let loudness = level::measure(&frame, captured);
                    if let Some(meter) = meter {
                        meter.set(loudness.level);
                    }
                    samples.extend_from_slice(&frame);
                    captured = captured.saturating_add(cfg.frame_duration);
                    frames_processed += 1;

                    match detector.observe(loudness, cfg.frame_duration) {
                        SilenceDecision::StopSilence => {
                            break Outcome::Stopped(StopReason::Silence {
                                trailing: detector.silence_run(),
                            });
                        }
                        SilenceDecision::Continue => {
                            if captured >= cfg.max_duration {
                                break Outcome::Stopped(StopReason::MaxDuration);
                            }
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !source.is_alive() {
                        break Outcome::Failed(CaptureError::SourceRuntime(
                            "audio source stopped producing frames".to_string(),
                        ));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    break Outcome::Failed(CaptureError::SourceRuntime(
                        "audio stream disconnected".to_string(),
                    ));
                }
            }
        };

        // Single release point for every exit above.
        source.stop();
        let grace_deadline = Instant::now() + cfg.stop_grace;
        while source.is_alive() && Instant::now() < grace_deadline {
            thread::sleep(POLL_INTERVAL);
        }
        if source.is_alive() {
            debug!("audio source ignored stop; discarding its stream");
        }
        let frames_dropped = stream.dropped.load(Ordering::Relaxed);
        drop(stream);
        if let Some(meter) = meter {
            meter.set(0.0);
        }

        let metrics = CaptureMetrics {
            captured,
            speech: detector.speech_total(),
            trailing_silence: detector.silence_run(),
            frames_processed,
            frames_dropped,
        };

        match outcome {
            Outcome::Failed(err) => {
                if samples.is_empty() {
                    debug!("capture ended with no audio: {err}");
                    return Err(CaptureError::EmptyRecording);
                }
                Err(err)
            }
            Outcome::Stopped(reason) => {
                if samples.is_empty() {
                    return Err(CaptureError::EmptyRecording);
                }
                debug!(
                    reason = reason.label(),
                    captured_ms = metrics.captured.as_millis() as u64,
                    speech_ms = metrics.speech.as_millis() as u64,
                    trailing_silence_ms = metrics.trailing_silence.as_millis() as u64,
                    frames_processed = metrics.frames_processed,
                    frames_dropped = metrics.frames_dropped,
                    "capture finished"
                );
                Ok(CaptureSession {
                    samples,
                    sample_rate: cfg.sample_rate,
                    reason,
                    metrics,
                })
            }
        }
    }
}
