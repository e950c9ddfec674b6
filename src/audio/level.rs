//! Frame loudness measurement.
//!
//! Loudness is expressed as a fraction of full scale in `[0.0, 1.0]`, which is
//! what the silence gate compares against. Lower thresholds therefore mean
//! higher sensitivity: quieter sounds still count as speech.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Loudness reported before any frame has been observed.
const METER_FLOOR: f32 = 0.0;

/// Loudness of one frame, stamped with its offset from the start of capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessSample {
    /// Peak amplitude as a fraction of full scale, clamped to `[0.0, 1.0]`.
    pub level: f32,
    /// Time of the frame relative to the first captured frame.
    pub offset: Duration,
}

/// Measure the loudness of a frame of normalized PCM samples.
///
/// Uses the peak magnitude rather than RMS so a short burst of speech inside
/// an otherwise quiet frame still registers. An empty frame measures as the
/// floor.
pub fn measure(frame: &[f32], offset: Duration) -> LoudnessSample {
    let mut peak = METER_FLOOR;
    for sample in frame {
        let magnitude = sample.abs();
        if magnitude > peak {
            peak = magnitude;
        }
    }
    LoudnessSample {
        level: peak.min(1.0),
        offset,
    }
}

/// Shared live loudness cell read by the UI while the capture worker records.
///
/// Stores the f32 level as raw bits in an atomic so the render loop never
/// takes a lock against the audio path.
#[derive(Clone, Debug)]
pub struct LevelMeter {
    level_bits: Arc<AtomicU32>,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self {
            level_bits: Arc::new(AtomicU32::new(METER_FLOOR.to_bits())),
        }
    }

    pub fn set(&self, level: f32) {
        self.level_bits.store(level.to_bits(), Ordering::Relaxed);
    }

    pub fn level(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new()
    }
}
