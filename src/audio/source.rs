//! Microphone access behind the `AudioSource` seam.
//!
//! The capture loop talks to an [`AudioSource`] trait object so tests can
//! substitute scripted producers; [`CpalSource`] is the real implementation.
//! Device enumeration honors the `VOXJOT_TEST_DEVICES` override so CLI tests
//! can run on machines without audio hardware.

use super::dispatch::FrameSlicer;
use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::{bounded, Receiver};
use std::env;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Channels handed back by a started source.
pub struct FrameStream {
    /// Fires once, when the source has produced its first audio buffer.
    pub ready: Receiver<()>,
    /// Fixed-size mono frames at `sample_rate`.
    pub frames: Receiver<Vec<f32>>,
    /// Native rate of the frames; the capture loop resamples to its target.
    pub sample_rate: u32,
    /// Count of frames discarded because the consumer lagged.
    pub dropped: Arc<AtomicUsize>,
}

/// A concurrent producer of PCM frames.
///
/// `start` spins up the producer and returns its stream; the readiness
/// channel fires once real data is flowing, so callers can gate their
/// "recording" notification on it. `stop` asks the producer to halt and must
/// be safe to call any number of times. `is_alive` reports whether the
/// producer is still running, letting the capture loop distinguish a quiet
/// room from a dead device.
pub trait AudioSource {
    fn start(&mut self, frame_duration: Duration, channel_capacity: usize) -> Result<FrameStream>;
    fn stop(&mut self);
    fn is_alive(&self) -> bool;
}

/// System microphone via CPAL.
pub struct CpalSource {
    device: cpal::Device,
    stream: Option<cpal::Stream>,
    failed: Arc<AtomicBool>,
}

impl CpalSource {
    /// Open a microphone, optionally forcing a specific device so users can
    /// pick the right input when a laptop exposes several.
    pub fn open(preferred_device: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => {
                let mut devices = host.input_devices().context("no input devices available")?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| anyhow!("input device '{name}' not found"))?
            }
            None => host
                .default_input_device()
                .context("no default input device available")?,
        };
        Ok(Self {
            device,
            stream: None,
            failed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// List microphone names so the CLI can expose a human-friendly selector.
    /// `VOXJOT_TEST_DEVICES` (comma-separated) bypasses the host entirely.
    pub fn list_devices() -> Result<Vec<String>> {
        if let Ok(fake) = env::var("VOXJOT_TEST_DEVICES") {
            return Ok(fake
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect());
        }
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Name of the opened device.
    pub fn device_name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "unknown input device".to_string())
    }
}

impl AudioSource for CpalSource {
    fn start(&mut self, frame_duration: Duration, channel_capacity: usize) -> Result<FrameStream> {
        let default_config = self
            .device
            .default_input_config()
            .context("query input device config")?;
        let format = default_config.sample_format();
        let device_config: StreamConfig = default_config.into();
        let device_rate = device_config.sample_rate.0;
        let channels = usize::from(device_config.channels.max(1));
        let frame_samples =
            ((u64::from(device_rate) * frame_duration.as_millis() as u64) / 1000).max(1) as usize;

        debug!(
            device = %self.device_name(),
            ?format,
            rate = device_rate,
            channels,
            frame_samples,
            "starting input stream"
        );

        let (frame_tx, frame_rx) = bounded::<Vec<f32>>(channel_capacity.max(1));
        let (ready_tx, ready_rx) = bounded::<()>(1);
        let dropped = Arc::new(AtomicUsize::new(0));
        let slicer = Arc::new(Mutex::new(FrameSlicer::new(
            frame_samples,
            frame_tx,
            dropped.clone(),
        )));
        let announced = Arc::new(AtomicBool::new(false));

        // cpal invokes the data callback on its own thread; it only ever
        // try-locks the slicer so a slow capture loop costs dropped frames,
        // never a blocked callback.
        let stream = match format {
            SampleFormat::F32 => {
                let slicer = slicer.clone();
                let dropped = dropped.clone();
                let announced = announced.clone();
                let ready_tx = ready_tx.clone();
                self.device.build_input_stream(
                    &device_config,
                    move |data: &[f32], _| {
                        if !announced.swap(true, Ordering::Relaxed) {
                            let _ = ready_tx.try_send(());
                        }
                        if let Ok(mut pump) = slicer.try_lock() {
                            pump.push(data, channels, |sample| sample);
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    stream_error_hook(self.failed.clone()),
                    None,
                )?
            }
            SampleFormat::I16 => {
                let slicer = slicer.clone();
                let dropped = dropped.clone();
                let announced = announced.clone();
                let ready_tx = ready_tx.clone();
                self.device.build_input_stream(
                    &device_config,
                    move |data: &[i16], _| {
                        if !announced.swap(true, Ordering::Relaxed) {
                            let _ = ready_tx.try_send(());
                        }
                        if let Ok(mut pump) = slicer.try_lock() {
                            pump.push(data, channels, |sample| sample as f32 / 32_768.0);
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    stream_error_hook(self.failed.clone()),
                    None,
                )?
            }
            SampleFormat::U16 => {
                let slicer = slicer.clone();
                let dropped = dropped.clone();
                let announced = announced.clone();
                let ready_tx = ready_tx.clone();
                self.device.build_input_stream(
                    &device_config,
                    move |data: &[u16], _| {
                        if !announced.swap(true, Ordering::Relaxed) {
                            let _ = ready_tx.try_send(());
                        }
                        if let Ok(mut pump) = slicer.try_lock() {
                            pump.push(data, channels, |sample| {
                                (sample as f32 - 32_768.0) / 32_768.0
                            });
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    stream_error_hook(self.failed.clone()),
                    None,
                )?
            }
            other => return Err(anyhow!("unsupported sample format: {other:?}")),
        };

        stream.play().context("start input stream")?;
        self.failed.store(false, Ordering::Relaxed);
        self.stream = Some(stream);

        Ok(FrameStream {
            ready: ready_rx,
            frames: frame_rx,
            sample_rate: device_rate,
            dropped,
        })
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.pause() {
                debug!("failed to pause input stream: {err}");
            }
            drop(stream);
        }
    }

    fn is_alive(&self) -> bool {
        self.stream.is_some() && !self.failed.load(Ordering::Relaxed)
    }
}

fn stream_error_hook(failed: Arc<AtomicBool>) -> impl FnMut(cpal::StreamError) {
    move |err| {
        debug!("input stream error: {err}");
        failed.store(true, Ordering::Relaxed);
    }
}
