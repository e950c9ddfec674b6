use std::f32::consts::PI;

// Practical resampling ratio bounds; rates outside them pass through
// unchanged rather than producing garbage output.
const MIN_RATIO: f32 = 0.01;
const MAX_RATIO: f32 = 8.0;
const MAX_DECIMATION_TAPS: usize = 129;

/// Resample `input` from `source_rate` to `target_rate`.
///
/// Downsampling runs a short FIR low-pass first so speech above the target
/// Nyquist does not alias; upsampling interpolates directly. Equal rates,
/// empty input, and degenerate rates pass through untouched.
pub(super) fn resample(input: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == 0 || target_rate == 0 || input.is_empty() || source_rate == target_rate {
        return input.to_vec();
    }

    let ratio = target_rate as f32 / source_rate as f32;
    if !(MIN_RATIO..=MAX_RATIO).contains(&ratio) {
        return input.to_vec();
    }

    let filtered = if source_rate > target_rate {
        let taps = decimation_taps(source_rate, target_rate);
        low_pass(input, source_rate, target_rate, taps)
    } else {
        input.to_vec()
    };
    linear(&filtered, ratio)
}

/// Convert one captured frame to the target rate and pad or trim it to the
/// exact frame length the capture loop expects.
pub(super) fn fit_frame(
    frame: Vec<f32>,
    source_rate: u32,
    target_rate: u32,
    desired_len: usize,
) -> Vec<f32> {
    if source_rate == target_rate {
        return pad_or_trim(frame, desired_len);
    }
    let resampled = resample(&frame, source_rate, target_rate);
    pad_or_trim(resampled, desired_len)
}

pub(super) fn pad_or_trim(mut data: Vec<f32>, desired: usize) -> Vec<f32> {
    if data.len() > desired {
        data.truncate(desired);
    } else if data.len() < desired {
        let fill = *data.last().unwrap_or(&0.0);
        data.resize(desired, fill);
    }
    data
}

/// Linear interpolation; adequate for short speech snippets where latency
/// matters more than phase accuracy.
pub(super) fn linear(input: &[f32], ratio: f32) -> Vec<f32> {
    let input_len = input.len();
    let output_len = (input_len as f32 * ratio).round() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let pos = i as f32 / ratio;
        let base = pos.floor() as usize;
        let frac = pos - base as f32;

        if base + 1 < input_len {
            output.push(input[base] * (1.0 - frac) + input[base + 1] * frac);
        } else {
            output.push(input.last().copied().unwrap_or(0.0));
        }
    }

    output
}

/// Tap count scaled to the decimation ratio: short for near-equal rates,
/// longer when collapsing 48 kHz down to 16 kHz.
pub(super) fn decimation_taps(source_rate: u32, target_rate: u32) -> usize {
    let ratio = source_rate as f32 / target_rate.max(1) as f32;
    let mut taps = (ratio * 4.0).ceil().max(11.0) as usize;
    if taps % 2 == 0 {
        taps += 1;
    }
    taps.min(MAX_DECIMATION_TAPS)
}

pub(super) fn low_pass(input: &[f32], source_rate: u32, target_rate: u32, taps: usize) -> Vec<f32> {
    if input.is_empty() || taps <= 1 {
        return input.to_vec();
    }

    let cutoff = (target_rate as f32 * 0.5 / source_rate as f32).min(0.499);
    let coeffs = design_low_pass(cutoff, taps);
    let half = taps / 2;
    let mut output = Vec::with_capacity(input.len());

    for n in 0..input.len() {
        let mut acc = 0.0;
        // Skip taps that fall off either edge of the input.
        for k in half.saturating_sub(n)..taps {
            let idx = n + k - half;
            if idx >= input.len() {
                break;
            }
            acc += input[idx] * coeffs[k];
        }
        output.push(acc);
    }

    output
}

/// Normalized Hamming-windowed sinc taps for the low-pass filter.
pub(super) fn design_low_pass(cutoff: f32, taps: usize) -> Vec<f32> {
    if taps <= 1 {
        return vec![1.0; taps];
    }

    let span = (taps - 1) as f32;
    let mut coeffs = Vec::with_capacity(taps);
    for n in 0..taps {
        let offset = n as f32 - span / 2.0;
        let angle = 2.0 * PI * cutoff * offset;
        let sinc = if offset == 0.0 {
            2.0 * cutoff
        } else {
            (2.0 * cutoff * angle.sin()) / angle
        };
        let window = 0.54 - 0.46 * ((2.0 * PI * n as f32) / span).cos();
        coeffs.push(sinc * window);
    }

    let gain: f32 = coeffs.iter().sum();
    if gain != 0.0 {
        for coeff in coeffs.iter_mut() {
            *coeff /= gain;
        }
    }

    coeffs
}
