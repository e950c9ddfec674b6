use crossbeam_channel::{Sender, TrySendError};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Downmix interleaved multi-channel input to mono while applying the
/// provided converter, so the rest of the pipeline sees a single channel
/// regardless of the microphone layout.
pub(super) fn downmix_append<T, F>(out: &mut Vec<f32>, data: &[T], channels: usize, mut convert: F)
where
    T: Copy,
    F: FnMut(T) -> f32,
{
    if channels <= 1 {
        out.extend(data.iter().copied().map(&mut convert));
        return;
    }

    let mut chunks = data.chunks_exact(channels);
    for chunk in &mut chunks {
        let sum: f32 = chunk.iter().copied().map(&mut convert).sum();
        out.push(sum / channels as f32);
    }
    // A truncated trailing frame still contributes its average.
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let sum: f32 = rest.iter().copied().map(&mut convert).sum();
        out.push(sum / rest.len() as f32);
    }
}

/// Runs inside the audio callback: downmixes raw device buffers, slices the
/// result into fixed-size frames, and hands full frames to the capture loop.
/// The channel send never blocks; if the consumer lags, the frame is dropped
/// and counted instead.
pub(super) struct FrameSlicer {
    frame_samples: usize,
    pending: Vec<f32>,
    mono_scratch: Vec<f32>,
    frames: Sender<Vec<f32>>,
    dropped: Arc<AtomicUsize>,
}

impl FrameSlicer {
    pub(super) fn new(
        frame_samples: usize,
        frames: Sender<Vec<f32>>,
        dropped: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            frame_samples: frame_samples.max(1),
            pending: Vec::with_capacity(frame_samples),
            mono_scratch: Vec::new(),
            frames,
            dropped,
        }
    }

    pub(super) fn push<T, F>(&mut self, data: &[T], channels: usize, convert: F)
    where
        T: Copy,
        F: FnMut(T) -> f32,
    {
        self.mono_scratch.clear();
        downmix_append(&mut self.mono_scratch, data, channels, convert);
        self.pending.extend_from_slice(&self.mono_scratch);

        while self.pending.len() >= self.frame_samples {
            let frame: Vec<f32> = self.pending.drain(..self.frame_samples).collect();
            match self.frames.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}
