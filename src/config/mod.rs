//! Layered settings: CLI flags over config file and `VOXJOT_*` environment
//! variables over built-in defaults, resolved once into an immutable value.

mod defaults;
mod validation;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::{CaptureConfig, SilenceConfig};
use crate::stt::DEFAULT_ENDPOINT;

pub use defaults::{
    DEFAULT_FRAME_MS, DEFAULT_LANGUAGE, DEFAULT_MAX_SECONDS, DEFAULT_MODEL,
    DEFAULT_SILENCE_SECONDS, DEFAULT_SILENCE_THRESHOLD,
};

/// CLI options for voxjot. Anything not set here falls back to the config
/// file, then `VOXJOT_*` environment variables, then built-in defaults.
#[derive(Debug, Parser, Clone)]
#[command(about = "Record speech, transcribe it, print the text", author, version)]
pub struct CliArgs {
    /// Transcribe an existing audio file instead of recording
    #[arg(long = "file", value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Preferred audio input device name
    #[arg(long = "device", env = "VOXJOT_DEVICE", value_name = "NAME")]
    pub device: Option<String>,

    /// Maximum recording duration in seconds
    #[arg(long = "max-seconds", value_name = "SECONDS")]
    pub max_seconds: Option<f64>,

    /// Enable debug logging on stderr
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    pub verbose: bool,

    /// Print detected audio input devices and exit
    #[arg(long = "list-devices", default_value_t = false)]
    pub list_devices: bool,

    /// Symlink this executable into a user bin directory and exit
    #[arg(long = "install", default_value_t = false)]
    pub install: bool,

    /// Config file location (default: ~/.config/voxjot/config.toml)
    #[arg(long = "config", env = "VOXJOT_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Raw values from the config file and `VOXJOT_*` environment, before CLI
/// flags and defaults are applied. Environment wins over file.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FileSettings {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
    pub device: Option<String>,
    pub max_seconds: Option<f64>,
    pub silence_threshold: Option<f32>,
    pub silence_seconds: Option<f64>,
    pub frame_ms: Option<u64>,
}

/// Default config file location under the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("voxjot").join("config.toml"))
}

/// Merge the config file with `VOXJOT_*` environment variables. An explicit
/// path must exist; the default location is optional.
pub fn load_layered(explicit: Option<&Path>) -> Result<FileSettings> {
    let mut builder = config::Config::builder();
    match explicit {
        Some(path) => {
            builder = builder
                .add_source(config::File::from(path.to_path_buf()).format(config::FileFormat::Toml));
        }
        None => {
            if let Some(path) = default_config_path() {
                builder = builder.add_source(
                    config::File::from(path)
                        .format(config::FileFormat::Toml)
                        .required(false),
                );
            }
        }
    }
    builder = builder.add_source(config::Environment::with_prefix("VOXJOT").try_parsing(true));
    let merged = builder.build().context("failed to load configuration")?;
    merged
        .try_deserialize()
        .context("failed to parse configuration values")
}

/// Fully resolved runtime settings. Built once at startup, immutable after.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    /// `None` means let the API auto-detect ("auto" in config).
    pub language: Option<String>,
    pub device: Option<String>,
    pub max_duration: Duration,
    pub silence_threshold: f32,
    pub required_silence: Duration,
    pub frame_duration: Duration,
    pub verbose: bool,
    pub input_file: Option<PathBuf>,
}

impl Settings {
    /// Apply precedence and validate. The API key is never a CLI flag; it
    /// resolves as `VOXJOT_API_KEY` (via the environment layer), then the
    /// config file, then `OPENAI_API_KEY`.
    pub fn resolve(cli: &CliArgs, file: FileSettings) -> Result<Self> {
        let api_key = file
            .api_key
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                env::var("OPENAI_API_KEY")
                    .ok()
                    .filter(|key| !key.trim().is_empty())
            })
            .ok_or_else(|| {
                anyhow!(
                    "no API key found; set VOXJOT_API_KEY, api_key in the config file, \
                     or OPENAI_API_KEY"
                )
            })?;

        let max_seconds = cli
            .max_seconds
            .or(file.max_seconds)
            .unwrap_or(DEFAULT_MAX_SECONDS);
        validation::check_max_seconds(max_seconds)?;

        let silence_threshold = file
            .silence_threshold
            .unwrap_or(DEFAULT_SILENCE_THRESHOLD);
        validation::check_silence_threshold(silence_threshold)?;

        let silence_seconds = file.silence_seconds.unwrap_or(DEFAULT_SILENCE_SECONDS);
        validation::check_silence_seconds(silence_seconds, max_seconds)?;

        let frame_ms = file.frame_ms.unwrap_or(DEFAULT_FRAME_MS);
        validation::check_frame_ms(frame_ms)?;

        let model = file.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        validation::check_model(&model)?;

        let endpoint = file
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        validation::check_endpoint(&endpoint)?;

        let language = file
            .language
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
        validation::check_language(&language)?;
        let language = if language.eq_ignore_ascii_case("auto") {
            None
        } else {
            Some(language)
        };

        let device = cli.device.clone().or(file.device);
        if let Some(name) = &device {
            validation::check_device(name)?;
        }

        Ok(Self {
            api_key,
            endpoint,
            model,
            language,
            device,
            max_duration: Duration::from_secs_f64(max_seconds),
            silence_threshold,
            required_silence: Duration::from_secs_f64(silence_seconds),
            frame_duration: Duration::from_millis(frame_ms),
            verbose: cli.verbose,
            input_file: cli.file.clone(),
        })
    }

    /// Capture parameters derived from the resolved settings.
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            max_duration: self.max_duration,
            frame_duration: self.frame_duration,
            silence: SilenceConfig {
                speech_threshold: self.silence_threshold,
                required_silence: self.required_silence,
            },
            ..CaptureConfig::default()
        }
    }
}
