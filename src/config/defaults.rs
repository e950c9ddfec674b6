pub const DEFAULT_MODEL: &str = "whisper-1";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_MAX_SECONDS: f64 = 30.0;
pub const DEFAULT_SILENCE_THRESHOLD: f32 = 0.03;
pub const DEFAULT_SILENCE_SECONDS: f64 = 2.5;
pub const DEFAULT_FRAME_MS: u64 = 100;

pub(super) const MIN_MAX_SECONDS: f64 = 1.0;
pub(super) const MAX_SECONDS_HARD_LIMIT: f64 = 600.0;
pub(super) const MIN_SILENCE_SECONDS: f64 = 0.2;
pub(super) const MIN_FRAME_MS: u64 = 5;
pub(super) const MAX_FRAME_MS: u64 = 120;

pub(super) const ISO_639_1_CODES: &[&str] = &[
    "af", "am", "ar", "az", "be", "bg", "bn", "bs", "ca", "cs", "cy", "da", "de", "el", "en", "es",
    "et", "eu", "fa", "fi", "fil", "fr", "ga", "gl", "gu", "he", "hi", "hr", "hu", "hy", "id",
    "is", "it", "ja", "jv", "ka", "kk", "km", "kn", "ko", "lo", "lt", "lv", "mk", "ml", "mn", "mr",
    "ms", "my", "ne", "nl", "no", "pa", "pl", "pt", "ro", "ru", "si", "sk", "sl", "sq", "sr", "sv",
    "sw", "ta", "te", "th", "tr", "uk", "ur", "vi", "zh",
];
