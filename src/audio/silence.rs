//! Silence gate that decides when the speaker has finished.
//!
//! Classifies each frame as speech or silence against a loudness threshold
//! and accumulates the trailing run of silence. The gate only fires after at
//! least one speech frame has been heard, so a recording that starts in a
//! quiet room keeps waiting for the speaker instead of stopping immediately.

use super::level::LoudnessSample;
use std::time::Duration;

/// Tuning for the silence gate.
#[derive(Debug, Clone, Copy)]
pub struct SilenceConfig {
    /// Loudness at or above which a frame counts as speech, as a fraction of
    /// full scale. Lower values are more sensitive; raise this in noisy rooms.
    pub speech_threshold: f32,
    /// Trailing quiet required after speech before the gate fires.
    pub required_silence: Duration,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            speech_threshold: 0.03,
            required_silence: Duration::from_millis(2_500),
        }
    }
}

/// Outcome of feeding one frame to the gate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SilenceDecision {
    /// Keep recording.
    Continue,
    /// Enough trailing silence after speech; stop the capture.
    StopSilence,
}

/// Stateful silence gate fed one loudness sample per frame.
#[derive(Debug, Clone)]
pub struct SilenceDetector {
    cfg: SilenceConfig,
    silence_run: Duration,
    speech_total: Duration,
    heard_speech: bool,
}

impl SilenceDetector {
    pub fn new(cfg: SilenceConfig) -> Self {
        Self {
            cfg,
            silence_run: Duration::ZERO,
            speech_total: Duration::ZERO,
            heard_speech: false,
        }
    }

    /// Feed one frame's loudness. A frame exactly at the threshold counts as
    /// speech; an accumulated run exactly at the required duration fires the
    /// gate.
    pub fn observe(&mut self, sample: LoudnessSample, frame_duration: Duration) -> SilenceDecision {
        if sample.level >= self.cfg.speech_threshold {
            self.heard_speech = true;
            self.speech_total = self.speech_total.saturating_add(frame_duration);
            self.silence_run = Duration::ZERO;
            return SilenceDecision::Continue;
        }

        self.silence_run = self.silence_run.saturating_add(frame_duration);
        if self.heard_speech && self.silence_run >= self.cfg.required_silence {
            SilenceDecision::StopSilence
        } else {
            SilenceDecision::Continue
        }
    }

    /// True once any frame has measured at or above the speech threshold.
    pub fn heard_speech(&self) -> bool {
        self.heard_speech
    }

    /// Length of the current trailing run of silent frames.
    pub fn silence_run(&self) -> Duration {
        self.silence_run
    }

    /// Total duration classified as speech so far.
    pub fn speech_total(&self) -> Duration {
        self.speech_total
    }

    /// Forget all history, keeping the configuration.
    pub fn reset(&mut self) {
        self.silence_run = Duration::ZERO;
        self.speech_total = Duration::ZERO;
        self.heard_speech = false;
    }
}
