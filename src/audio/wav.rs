//! In-memory WAV encoding for the transcription payload.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

/// Encode normalized f32 PCM as a 16-bit mono WAV file in memory. Samples
/// outside `[-1.0, 1.0]` are clamped rather than wrapped.
pub fn encode_wav_mono16(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec).context("create wav writer")?;
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        writer
            .write_sample((clamped * f32::from(i16::MAX)) as i16)
            .context("write wav sample")?;
    }
    writer.finalize().context("finalize wav header")?;

    Ok(cursor.into_inner())
}
