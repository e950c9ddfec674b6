//! voxjot entrypoint: record one dictation, transcribe it, print the text.
//!
//! The capture worker owns the microphone and the API round trip; the main
//! thread draws a level meter on stderr and turns Ctrl-C into a stop
//! request. Stdout carries nothing but the transcript so the output can be
//! piped straight into other tools.

mod cli_utils;
mod meter;
mod signal;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs;
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;
use tracing::debug;
use voxjot::audio::{CaptureError, LevelMeter};
use voxjot::config::{load_layered, CliArgs, Settings};
use voxjot::install::install_symlink;
use voxjot::stt::{AudioPayload, TranscriptionClient};
use voxjot::{init_tracing, start_capture_job, CaptureJobEvent, JobError};

use crate::cli_utils::list_input_devices;
use crate::meter::MeterLine;
use crate::signal::{install_sigint_handler, take_interrupt};

/// How often the main loop wakes to redraw the meter and poll for Ctrl-C.
const POLL_INTERVAL: Duration = Duration::from_millis(80);

fn main() {
    let cli = match CliArgs::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version print to stdout and exit clean; real argument
            // errors exit 1 like every other failure.
            let _ = err.print();
            std::process::exit(if err.use_stderr() { 1 } else { 0 });
        }
    };
    if let Err(err) = run(cli) {
        eprintln!("voxjot: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: CliArgs) -> Result<()> {
    init_tracing(cli.verbose);

    if cli.list_devices {
        return list_input_devices();
    }
    if cli.install {
        let link = install_symlink()?;
        eprintln!("installed {}", link.display());
        return Ok(());
    }

    let file = load_layered(cli.config.as_deref())?;
    let settings = Settings::resolve(&cli, file)?;

    match settings.input_file.clone() {
        Some(path) => transcribe_file(&settings, &path),
        None => record_and_transcribe(&settings),
    }
}

/// `--file` mode: skip capture entirely and send an existing recording.
fn transcribe_file(settings: &Settings, path: &Path) -> Result<()> {
    let bytes =
        fs::read(path).with_context(|| format!("could not read '{}'", path.display()))?;
    let client = TranscriptionClient::new(
        settings.endpoint.clone(),
        settings.api_key.clone(),
        settings.model.clone(),
        settings.language.clone(),
    );
    let text = client.transcribe(&AudioPayload::from_file(&bytes, path))?;
    println!("{text}");
    Ok(())
}

fn record_and_transcribe(settings: &Settings) -> Result<()> {
    install_sigint_handler()?;

    let meter = LevelMeter::new();
    let mut job = start_capture_job(settings.clone(), Some(meter.clone()));

    let interactive = io::stderr().is_terminal();
    let mut meter_line = MeterLine::new();
    let mut stopping = false;

    let outcome: Result<String> = loop {
        if take_interrupt() {
            meter_line.clear();
            if stopping {
                // Second Ctrl-C: detach the worker instead of waiting on it.
                drop(job.handle.take());
                break Err(anyhow!("aborted"));
            }
            stopping = true;
            job.request_stop();
            eprintln!("stopping...");
        }

        match job.receiver.recv_timeout(POLL_INTERVAL) {
            Ok(CaptureJobEvent::Started) => {
                eprintln!("listening... (Ctrl-C to stop)");
            }
            Ok(CaptureJobEvent::Transcript {
                text,
                reason,
                metrics,
            }) => {
                debug!(
                    reason = reason.label(),
                    frames_processed = metrics.frames_processed,
                    frames_dropped = metrics.frames_dropped,
                    "transcript ready"
                );
                break Ok(text);
            }
            Ok(CaptureJobEvent::Failed(JobError::Capture(CaptureError::EmptyRecording))) => {
                break Err(anyhow!(
                    "no audio captured; check the microphone or pick one with --device (see --list-devices)"
                ));
            }
            Ok(CaptureJobEvent::Failed(err)) => break Err(err.into()),
            Err(RecvTimeoutError::Timeout) => {
                if interactive && !stopping {
                    meter_line.draw(meter.level());
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                break Err(anyhow!("capture worker exited without reporting a result"));
            }
        }
    };

    meter_line.clear();
    if let Some(handle) = job.handle.take() {
        let _ = handle.join();
    }

    let text = outcome?;
    println!("{text}");
    Ok(())
}
