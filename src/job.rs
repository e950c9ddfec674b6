//! Background worker that records one dictation and transcribes it.
//!
//! Capture and the API round trip run off the main thread so the CLI stays
//! free to render the level meter and react to Ctrl-C.

use crate::audio::{
    encode_wav_mono16, CancelToken, CaptureError, CaptureMetrics, CpalSource, LevelMeter,
    RecordingController, StopReason,
};
use crate::config::Settings;
use crate::stt::{AudioPayload, TranscribeError, TranscriptionClient};
use std::sync::mpsc;
use std::thread;
use thiserror::Error;
use tracing::debug;

/// Everything that can sink a capture job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Transcribe(#[from] TranscribeError),
    #[error("failed to encode recording: {0}")]
    Encode(String),
}

/// Messages sent from the worker back to the CLI loop.
#[derive(Debug)]
pub enum CaptureJobEvent {
    /// The source produced its first audio; recording is really underway.
    Started,
    /// Terminal event: the dictation round trip succeeded.
    Transcript {
        text: String,
        reason: StopReason,
        metrics: CaptureMetrics,
    },
    /// Terminal event: something failed along the way.
    Failed(JobError),
}

/// Handle the CLI uses to poll the worker thread.
pub struct CaptureJob {
    pub receiver: mpsc::Receiver<CaptureJobEvent>,
    pub handle: Option<thread::JoinHandle<()>>,
    cancel: CancelToken,
}

impl CaptureJob {
    /// Ask the worker to stop recording and transcribe what it has so far.
    pub fn request_stop(&self) {
        self.cancel.cancel();
    }
}

/// Spawn the worker. At most two events arrive: `Started`, then one terminal
/// `Transcript` or `Failed`; the channel is sized so the worker never blocks
/// on a slow consumer.
pub fn start_capture_job(settings: Settings, meter: Option<LevelMeter>) -> CaptureJob {
    let (tx, rx) = mpsc::sync_channel(2);
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();

    let handle = thread::spawn(move || {
        let event = perform_capture(&settings, &worker_cancel, meter.as_ref(), &tx);
        let _ = tx.send(event);
    });

    CaptureJob {
        receiver: rx,
        handle: Some(handle),
        cancel,
    }
}

fn perform_capture(
    settings: &Settings,
    cancel: &CancelToken,
    meter: Option<&LevelMeter>,
    events: &mpsc::SyncSender<CaptureJobEvent>,
) -> CaptureJobEvent {
    let mut source = match CpalSource::open(settings.device.as_deref()) {
        Ok(source) => source,
        Err(err) => {
            return CaptureJobEvent::Failed(CaptureError::SourceStart(format!("{err:#}")).into())
        }
    };

    let cfg = settings.capture_config();
    let session = match RecordingController::new(&cfg).record(&mut source, cancel, meter, || {
        let _ = events.send(CaptureJobEvent::Started);
    }) {
        Ok(session) => session,
        Err(err) => return CaptureJobEvent::Failed(err.into()),
    };

    // A cancelled session still carries partial audio; it is transcribed
    // like any other stop.
    let reason = session.reason();
    let metrics = session.metrics().clone();
    debug!(
        reason = reason.label(),
        duration_ms = session.duration().as_millis() as u64,
        "capture complete; transcribing"
    );

    let sample_rate = session.sample_rate();
    let samples = session.into_samples();
    let wav = match encode_wav_mono16(&samples, sample_rate) {
        Ok(wav) => wav,
        Err(err) => return CaptureJobEvent::Failed(JobError::Encode(format!("{err:#}"))),
    };

    let client = TranscriptionClient::new(
        settings.endpoint.clone(),
        settings.api_key.clone(),
        settings.model.clone(),
        settings.language.clone(),
    );
    match client.transcribe(&AudioPayload::wav(&wav)) {
        Ok(text) => CaptureJobEvent::Transcript {
            text,
            reason,
            metrics,
        },
        Err(err) => CaptureJobEvent::Failed(err.into()),
    }
}
