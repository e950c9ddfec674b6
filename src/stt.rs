//! Remote speech-to-text client.
//!
//! Posts captured audio to an OpenAI-compatible `audio/transcriptions`
//! endpoint as multipart form data and pulls the transcript out of the JSON
//! response. Non-speech markers that transcription models like to emit
//! (`[silence]`, `(noise)`, ...) are stripped before the text reaches the
//! terminal.

use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;
use ureq::Agent;

/// Endpoint used when the configuration names none.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Generous ceiling; transcription of a short dictation normally returns in
/// a couple of seconds.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Transcription failures the caller can react to individually.
#[derive(Debug, Error)]
pub enum TranscribeError {
    /// The request never completed: DNS, connect, TLS, or timeout.
    #[error("transcription request failed: {0}")]
    Network(String),
    /// The API rejected the credentials.
    #[error("transcription API rejected the API key (HTTP {0})")]
    Auth(u16),
    /// Any other non-success status.
    #[error("transcription API returned HTTP {0}")]
    Status(u16),
    /// The response parsed but carried no usable `text` field.
    #[error("transcription API response had no usable text")]
    MalformedResponse,
    /// The API answered properly but heard nothing worth printing.
    #[error("transcription came back empty")]
    EmptyTranscript,
}

/// Audio bytes plus the metadata the multipart upload needs.
pub struct AudioPayload<'a> {
    pub bytes: &'a [u8],
    pub filename: &'a str,
    pub mime: &'a str,
}

impl<'a> AudioPayload<'a> {
    /// Payload for a freshly captured in-memory WAV.
    pub fn wav(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            filename: "audio.wav",
            mime: "audio/wav",
        }
    }

    /// Payload for a user-supplied audio file; the MIME type is guessed from
    /// the extension and falls back to a generic byte stream.
    pub fn from_file(bytes: &'a [u8], path: &'a Path) -> Self {
        Self {
            bytes,
            filename: path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("audio.bin"),
            mime: guess_mime(path),
        }
    }
}

/// Blocking HTTP client for one transcription backend.
pub struct TranscriptionClient {
    agent: Agent,
    endpoint: String,
    api_key: String,
    model: String,
    language: Option<String>,
}

impl TranscriptionClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        language: Option<String>,
    ) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .into();
        Self {
            agent,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            language,
        }
    }

    /// Upload `audio` and return the cleaned transcript.
    pub fn transcribe(&self, audio: &AudioPayload<'_>) -> Result<String, TranscribeError> {
        let boundary = multipart_boundary();
        let body = multipart_body(&boundary, audio, &self.model, self.language.as_deref());
        debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            payload_bytes = audio.bytes.len(),
            "posting transcription request"
        );

        let response = match self
            .agent
            .post(&self.endpoint)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header(
                "Content-Type",
                &format!("multipart/form-data; boundary={boundary}"),
            )
            .send(body.as_slice())
        {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(code)) if code == 401 || code == 403 => {
                return Err(TranscribeError::Auth(code))
            }
            Err(ureq::Error::StatusCode(code)) => return Err(TranscribeError::Status(code)),
            Err(err) => return Err(TranscribeError::Network(err.to_string())),
        };

        let json: Value = response.into_body().read_json().map_err(|err| {
            debug!("unparseable transcription response: {err}");
            TranscribeError::MalformedResponse
        })?;
        extract_transcript(&json)
    }
}

fn extract_transcript(json: &Value) -> Result<String, TranscribeError> {
    let text = json
        .get("text")
        .and_then(Value::as_str)
        .ok_or(TranscribeError::MalformedResponse)?;
    let cleaned = sanitize_transcript(text);
    if cleaned.is_empty() {
        return Err(TranscribeError::EmptyTranscript);
    }
    Ok(cleaned)
}

/// Strip non-speech markers and collapse whitespace so the printed transcript
/// is a single clean line.
pub fn sanitize_transcript(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    static NON_SPEECH_RE: OnceLock<Regex> = OnceLock::new();
    let re = NON_SPEECH_RE.get_or_init(|| {
        Regex::new(
            r"(?i)\[\s*\]|\(\s*\)|\[(?:\s*(?:silence|noise|inaudible|blank_audio|blank audio|music|laughter|applause|cough|breath(?:ing)?|wind|background)\s*)\]|\((?:\s*(?:silence|noise|inaudible|blank audio|music|laughter|applause|cough|breath(?:ing)?|wind|background|wind blowing)\s*)\)",
        )
        .expect("non-speech regex should compile")
    });
    let without_markers = re.replace_all(trimmed, " ");
    without_markers
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn multipart_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or(0);
    format!("----voxjot{nanos}")
}

fn multipart_body(
    boundary: &str,
    audio: &AudioPayload<'_>,
    model: &str,
    language: Option<&str>,
) -> Vec<u8> {
    let mut body = Vec::with_capacity(audio.bytes.len() + 512);

    push_text_field(&mut body, boundary, "model", model);
    if let Some(language) = language {
        push_text_field(&mut body, boundary, "language", language);
    }

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            audio.filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", audio.mime).as_bytes());
    body.extend_from_slice(audio.bytes);
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

fn push_text_field(body: &mut Vec<u8>, boundary: &str, name: &str, value: &str) {
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(value.as_bytes());
    body.extend_from_slice(b"\r\n");
}

fn guess_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("m4a" | "mp4") => "audio/mp4",
        Some("ogg" | "oga") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("webm") => "audio/webm",
        _ => "application/octet-stream",
    }
}
