use super::defaults::{
    ISO_639_1_CODES, MAX_FRAME_MS, MAX_SECONDS_HARD_LIMIT, MIN_FRAME_MS, MIN_MAX_SECONDS,
    MIN_SILENCE_SECONDS,
};
use anyhow::{bail, Result};

pub(super) fn check_max_seconds(value: f64) -> Result<()> {
    if !value.is_finite() || !(MIN_MAX_SECONDS..=MAX_SECONDS_HARD_LIMIT).contains(&value) {
        bail!(
            "--max-seconds must be between {MIN_MAX_SECONDS} and {MAX_SECONDS_HARD_LIMIT}, got {value}"
        );
    }
    Ok(())
}

pub(super) fn check_silence_threshold(value: f32) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        bail!("silence_threshold must be between 0.0 and 1.0, got {value}");
    }
    Ok(())
}

pub(super) fn check_silence_seconds(value: f64, max_seconds: f64) -> Result<()> {
    if !value.is_finite() || value < MIN_SILENCE_SECONDS || value > max_seconds {
        bail!(
            "silence_seconds must be >= {MIN_SILENCE_SECONDS} and <= --max-seconds ({max_seconds}), got {value}"
        );
    }
    Ok(())
}

pub(super) fn check_frame_ms(value: u64) -> Result<()> {
    if !(MIN_FRAME_MS..=MAX_FRAME_MS).contains(&value) {
        bail!("frame_ms must be between {MIN_FRAME_MS} and {MAX_FRAME_MS}, got {value}");
    }
    Ok(())
}

pub(super) fn check_model(value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("model must not be empty");
    }
    Ok(())
}

pub(super) fn check_endpoint(value: &str) -> Result<()> {
    if !value.starts_with("https://") && !value.starts_with("http://") {
        bail!("endpoint must start with http:// or https://, got '{value}'");
    }
    Ok(())
}

pub(super) fn check_device(value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("--device must not be empty");
    }
    Ok(())
}

pub(super) fn check_language(value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("language must not be empty");
    }
    if value.eq_ignore_ascii_case("auto") {
        return Ok(());
    }
    if !value
        .chars()
        .all(|ch| ch.is_ascii_alphabetic() || ch == '-' || ch == '_')
    {
        bail!("language must contain only alphabetic characters or '-'/'_' separators");
    }
    // Allow locale-style values but only check the leading ISO-639-1 code.
    let primary = value
        .split(['-', '_'])
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    if !ISO_639_1_CODES.contains(&primary.as_str()) {
        bail!("language must start with a valid ISO-639-1 code or be 'auto', got '{value}'");
    }
    Ok(())
}
