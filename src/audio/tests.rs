use super::dispatch::{downmix_append, FrameSlicer};
use super::resample::{
    decimation_taps, design_low_pass, fit_frame, linear, low_pass, pad_or_trim, resample,
};
use super::{
    measure, AudioSource, CancelToken, CaptureConfig, CaptureError, CaptureSession, FrameStream,
    LevelMeter, RecordingController, SilenceConfig, SilenceDecision, SilenceDetector, StopReason,
    TARGET_RATE,
};
use anyhow::Result;
use crossbeam_channel::bounded;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const FRAME: Duration = Duration::from_millis(100);

fn sample_at(level: f32) -> super::LoudnessSample {
    measure(&[level], Duration::ZERO)
}

#[test]
fn detector_waits_for_speech_before_stopping() {
    let mut detector = SilenceDetector::new(SilenceConfig {
        speech_threshold: 0.2,
        required_silence: Duration::from_millis(200),
    });
    for _ in 0..50 {
        assert_eq!(
            detector.observe(sample_at(0.05), FRAME),
            SilenceDecision::Continue
        );
    }
    assert!(!detector.heard_speech());
}

#[test]
fn detector_stops_after_trailing_silence() {
    let mut detector = SilenceDetector::new(SilenceConfig {
        speech_threshold: 0.2,
        required_silence: Duration::from_millis(300),
    });
    assert_eq!(
        detector.observe(sample_at(0.5), FRAME),
        SilenceDecision::Continue
    );
    assert_eq!(
        detector.observe(sample_at(0.05), FRAME),
        SilenceDecision::Continue
    );
    assert_eq!(
        detector.observe(sample_at(0.05), FRAME),
        SilenceDecision::Continue
    );
    // Third silent frame reaches exactly the required 300ms.
    assert_eq!(
        detector.observe(sample_at(0.05), FRAME),
        SilenceDecision::StopSilence
    );
    assert_eq!(detector.silence_run(), Duration::from_millis(300));
}

#[test]
fn detector_treats_threshold_equality_as_speech() {
    let mut detector = SilenceDetector::new(SilenceConfig {
        speech_threshold: 0.2,
        required_silence: Duration::from_millis(200),
    });
    detector.observe(sample_at(0.2), FRAME);
    assert!(detector.heard_speech());
    assert_eq!(detector.silence_run(), Duration::ZERO);
}

#[test]
fn detector_speech_resets_silence_run() {
    let mut detector = SilenceDetector::new(SilenceConfig {
        speech_threshold: 0.2,
        required_silence: Duration::from_millis(300),
    });
    detector.observe(sample_at(0.5), FRAME);
    detector.observe(sample_at(0.05), FRAME);
    detector.observe(sample_at(0.05), FRAME);
    detector.observe(sample_at(0.5), FRAME);
    assert_eq!(detector.silence_run(), Duration::ZERO);
    assert_eq!(detector.speech_total(), Duration::from_millis(200));
}

#[test]
fn detector_reset_clears_history() {
    let mut detector = SilenceDetector::new(SilenceConfig::default());
    detector.observe(sample_at(0.9), FRAME);
    detector.observe(sample_at(0.0), FRAME);
    detector.reset();
    assert!(!detector.heard_speech());
    assert_eq!(detector.silence_run(), Duration::ZERO);
    assert_eq!(detector.speech_total(), Duration::ZERO);
}

/// Test source driven by a pre-scripted frame list on a worker thread.
struct ScriptedSource {
    frames: Vec<Vec<f32>>,
    sample_rate: u32,
    pace: Option<Duration>,
    hold_open: bool,
    send_ready: bool,
    stop: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ScriptedSource {
    fn new(frames: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self {
            frames,
            sample_rate,
            pace: None,
            hold_open: false,
            send_ready: true,
            stop: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

impl AudioSource for ScriptedSource {
    fn start(&mut self, _frame_duration: Duration, channel_capacity: usize) -> Result<FrameStream> {
        let capacity = channel_capacity.max(self.frames.len() + 1);
        let (frame_tx, frame_rx) = bounded::<Vec<f32>>(capacity);
        let (ready_tx, ready_rx) = bounded::<()>(1);
        let frames = std::mem::take(&mut self.frames);
        let pace = self.pace;
        let hold_open = self.hold_open;
        let send_ready = self.send_ready;
        let stop = self.stop.clone();
        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);

        let worker = thread::spawn(move || {
            if send_ready {
                let _ = ready_tx.send(());
            }
            for frame in frames {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                if frame_tx.send(frame).is_err() {
                    break;
                }
                if let Some(pace) = pace {
                    thread::sleep(pace);
                }
            }
            while hold_open && !stop.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(5));
            }
            running.store(false, Ordering::SeqCst);
        });
        self.worker = Some(worker);

        Ok(FrameStream {
            ready: ready_rx,
            frames: frame_rx,
            sample_rate: self.sample_rate,
            dropped: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    fn is_alive(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn frames_of(level: f32, count: usize, samples_per_frame: usize) -> Vec<Vec<f32>> {
    vec![vec![level; samples_per_frame]; count]
}

fn test_config(max: Duration, silence: SilenceConfig) -> CaptureConfig {
    CaptureConfig {
        sample_rate: 1_000,
        frame_duration: FRAME,
        max_duration: max,
        silence,
        channel_capacity: 64,
        ready_timeout: Duration::from_millis(500),
        stop_grace: Duration::from_millis(500),
    }
}

fn record(
    cfg: &CaptureConfig,
    source: &mut ScriptedSource,
    cancel: &CancelToken,
    meter: Option<&LevelMeter>,
) -> std::result::Result<CaptureSession, CaptureError> {
    RecordingController::new(cfg).record(source, cancel, meter, || {})
}

#[test]
fn stops_after_silence_following_speech() {
    // 1.0s of speech at 0.5, then quiet frames at 0.05: the gate needs 3.0s
    // of accumulated silence, so the session ends on the 40th frame.
    let cfg = test_config(
        Duration::from_secs(30),
        SilenceConfig {
            speech_threshold: 0.2,
            required_silence: Duration::from_secs(3),
        },
    );
    let samples_per_frame = cfg.frame_samples();
    let mut script = frames_of(0.5, 10, samples_per_frame);
    script.extend(frames_of(0.05, 35, samples_per_frame));
    let mut source = ScriptedSource::new(script, cfg.sample_rate);

    let session = record(&cfg, &mut source, &CancelToken::new(), None).expect("capture");
    assert_eq!(
        session.reason(),
        StopReason::Silence {
            trailing: Duration::from_secs(3)
        }
    );
    assert_eq!(session.metrics().frames_processed, 40);
    assert_eq!(session.metrics().captured, Duration::from_secs(4));
    assert_eq!(session.metrics().speech, Duration::from_secs(1));
    assert_eq!(session.samples().len(), 40 * samples_per_frame);
    assert_eq!(session.sample_rate(), cfg.sample_rate);
    assert!(!session.is_empty());
    assert_eq!(session.duration(), Duration::from_secs(4));
}

#[test]
fn quiet_stream_runs_to_ceiling_without_silence_stop() {
    // Never crosses the speech threshold, so the silence gate must not fire
    // even though the quiet run exceeds the requirement many times over.
    let cfg = test_config(
        Duration::from_secs(3),
        SilenceConfig {
            speech_threshold: 0.2,
            required_silence: Duration::from_secs(1),
        },
    );
    let samples_per_frame = cfg.frame_samples();
    let mut source = ScriptedSource::new(frames_of(0.05, 35, samples_per_frame), cfg.sample_rate);

    let session = record(&cfg, &mut source, &CancelToken::new(), None).expect("capture");
    assert_eq!(session.reason(), StopReason::MaxDuration);
    assert_eq!(session.metrics().frames_processed, 30);
    assert_eq!(session.metrics().speech, Duration::ZERO);
}

#[test]
fn silence_wins_when_it_ties_with_the_ceiling() {
    let cfg = test_config(
        Duration::from_secs(2),
        SilenceConfig {
            speech_threshold: 0.2,
            required_silence: Duration::from_secs(1),
        },
    );
    let samples_per_frame = cfg.frame_samples();
    let mut script = frames_of(0.5, 10, samples_per_frame);
    script.extend(frames_of(0.05, 10, samples_per_frame));
    let mut source = ScriptedSource::new(script, cfg.sample_rate);

    let session = record(&cfg, &mut source, &CancelToken::new(), None).expect("capture");
    assert!(matches!(session.reason(), StopReason::Silence { .. }));
    assert_eq!(session.metrics().frames_processed, 20);
}

#[test]
fn cancel_keeps_partial_audio_and_releases_source() {
    let cfg = test_config(Duration::from_secs(30), SilenceConfig::default());
    let samples_per_frame = cfg.frame_samples();
    let mut source = ScriptedSource::new(frames_of(0.5, 5, samples_per_frame), cfg.sample_rate);
    source.hold_open = true;

    let cancel = CancelToken::new();
    let canceller = {
        let cancel = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            cancel.cancel();
        })
    };

    let meter = LevelMeter::new();
    let session = record(&cfg, &mut source, &cancel, Some(&meter)).expect("capture");
    canceller.join().unwrap();

    assert_eq!(session.reason(), StopReason::Cancelled);
    assert_eq!(session.samples().len(), 5 * samples_per_frame);
    assert!(!source.is_alive(), "source must be released after capture");
    assert_eq!(meter.level(), 0.0, "meter resets to the floor on stop");
}

#[test]
fn cancel_before_any_audio_reports_empty_recording() {
    let cfg = test_config(Duration::from_secs(30), SilenceConfig::default());
    let mut source = ScriptedSource::new(frames_of(0.5, 5, cfg.frame_samples()), cfg.sample_rate);
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = record(&cfg, &mut source, &cancel, None).expect_err("must fail");
    assert!(matches!(err, CaptureError::EmptyRecording));
}

#[test]
fn source_that_never_becomes_ready_is_a_start_failure() {
    let mut cfg = test_config(Duration::from_secs(30), SilenceConfig::default());
    cfg.ready_timeout = Duration::from_millis(50);
    let mut source = ScriptedSource::new(Vec::new(), cfg.sample_rate);
    source.send_ready = false;
    source.hold_open = true;

    let announced = AtomicBool::new(false);
    let err = RecordingController::new(&cfg)
        .record(&mut source, &CancelToken::new(), None, || {
            announced.store(true, Ordering::SeqCst);
        })
        .expect_err("must fail");
    assert!(matches!(err, CaptureError::SourceStart(_)));
    assert!(err.to_string().contains("no audio within"));
    assert!(!announced.load(Ordering::SeqCst));

    thread::sleep(Duration::from_millis(30));
    assert!(!source.is_alive());
}

#[test]
fn source_dying_instantly_reports_empty_recording() {
    let cfg = test_config(Duration::from_secs(30), SilenceConfig::default());
    let mut source = ScriptedSource::new(Vec::new(), cfg.sample_rate);

    let err = record(&cfg, &mut source, &CancelToken::new(), None).expect_err("must fail");
    assert!(matches!(err, CaptureError::EmptyRecording));
}

#[test]
fn source_dying_mid_recording_reports_runtime_failure() {
    let cfg = test_config(Duration::from_secs(30), SilenceConfig::default());
    let samples_per_frame = cfg.frame_samples();
    let mut source = ScriptedSource::new(frames_of(0.5, 3, samples_per_frame), cfg.sample_rate);

    let err = record(&cfg, &mut source, &CancelToken::new(), None).expect_err("must fail");
    assert!(matches!(err, CaptureError::SourceRuntime(_)));
}

#[test]
fn stalled_source_hits_wall_clock_ceiling() {
    let mut cfg = test_config(Duration::from_millis(150), SilenceConfig::default());
    cfg.frame_duration = Duration::from_millis(10);
    let mut source = ScriptedSource::new(Vec::new(), cfg.sample_rate);
    source.hold_open = true;

    let started = Instant::now();
    let err = record(&cfg, &mut source, &CancelToken::new(), None).expect_err("must fail");
    // Ready fires but no audio ever arrives, so the ceiling trips and the
    // empty capture surfaces as EmptyRecording.
    assert!(matches!(err, CaptureError::EmptyRecording));
    assert!(started.elapsed() >= Duration::from_millis(140));
}

#[test]
fn slow_source_is_bounded_by_wall_clock() {
    let mut cfg = test_config(Duration::from_millis(150), SilenceConfig::default());
    cfg.frame_duration = Duration::from_millis(10);
    let samples_per_frame = cfg.frame_samples();
    let mut source = ScriptedSource::new(frames_of(0.0, 100, samples_per_frame), cfg.sample_rate);
    source.pace = Some(Duration::from_millis(30));
    source.hold_open = true;

    let session = record(&cfg, &mut source, &CancelToken::new(), None).expect("capture");
    assert_eq!(session.reason(), StopReason::MaxDuration);
    assert!(!session.is_empty());
    // Logical audio time alone (10ms per frame) would need 15 frames; the
    // wall clock cuts in well before that.
    assert!(session.metrics().frames_processed <= 10);
}

#[test]
fn on_ready_runs_once_before_frames_are_consumed() {
    let cfg = test_config(
        Duration::from_millis(300),
        SilenceConfig {
            speech_threshold: 0.2,
            required_silence: Duration::from_secs(5),
        },
    );
    let mut source = ScriptedSource::new(frames_of(0.5, 2, cfg.frame_samples()), cfg.sample_rate);
    source.hold_open = true;

    let calls = AtomicUsize::new(0);
    let session = RecordingController::new(&cfg)
        .record(&mut source, &CancelToken::new(), None, || {
            calls.fetch_add(1, Ordering::SeqCst);
        })
        .expect("capture");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.reason(), StopReason::MaxDuration);
}

#[test]
fn stop_reason_labels_are_stable() {
    assert_eq!(
        StopReason::Silence {
            trailing: Duration::from_secs(1)
        }
        .label(),
        "silence"
    );
    assert_eq!(StopReason::MaxDuration.label(), "max_duration");
    assert_eq!(StopReason::Cancelled.label(), "cancelled");
}

#[test]
fn downmixes_stereo_to_mono() {
    let mut buf = Vec::new();
    let samples = [1.0f32, -1.0, 0.5, 0.5];
    downmix_append(&mut buf, &samples, 2, |sample| sample);
    assert_eq!(buf, vec![0.0, 0.5]);
}

#[test]
fn downmix_preserves_single_channel() {
    let mut buf = Vec::new();
    let samples = [0.1f32, 0.2, 0.3];
    downmix_append(&mut buf, &samples, 1, |sample| sample);
    assert_eq!(buf, samples);
}

#[test]
fn downmix_averages_partial_trailing_frame() {
    let mut buf = Vec::new();
    let samples = [1.0f32, 3.0, 5.0];
    downmix_append(&mut buf, &samples, 2, |sample| sample);
    assert_eq!(buf, vec![2.0, 5.0]);
}

#[test]
fn frame_slicer_emits_frames_and_counts_drops() {
    let (tx, rx) = bounded::<Vec<f32>>(1);
    let dropped = Arc::new(AtomicUsize::new(0));
    let mut slicer = FrameSlicer::new(2, tx, dropped.clone());

    slicer.push(&[1.0f32, 2.0, 3.0, 4.0], 1, |sample| sample);

    let frame = rx.try_recv().expect("missing frame");
    assert_eq!(frame, vec![1.0, 2.0]);
    assert_eq!(dropped.load(Ordering::Relaxed), 1);
}

#[test]
fn frame_slicer_accumulates_partial_frames() {
    let (tx, rx) = bounded::<Vec<f32>>(1);
    let dropped = Arc::new(AtomicUsize::new(0));
    let mut slicer = FrameSlicer::new(3, tx, dropped);

    slicer.push(&[1.0f32, 2.0], 1, |sample| sample);
    assert!(rx.try_recv().is_err());

    slicer.push(&[3.0f32, 4.0], 1, |sample| sample);
    let frame = rx.try_recv().expect("missing frame");
    assert_eq!(frame, vec![1.0, 2.0, 3.0]);
}

#[test]
fn resample_is_identity_for_equal_rates() {
    let input = vec![0.1f32, 0.2, 0.3];
    assert_eq!(resample(&input, TARGET_RATE, TARGET_RATE), input);
}

#[test]
fn resample_returns_empty_for_empty_input() {
    assert!(resample(&[], 48_000, TARGET_RATE).is_empty());
}

#[test]
fn resample_passes_through_absurd_ratios() {
    let input = vec![0.2f32; 32];
    assert_eq!(resample(&input, 1, TARGET_RATE), input);
    assert_eq!(resample(&input, 48_000, 1), input);
}

#[test]
fn resample_halves_length_at_double_rate() {
    let input = vec![1.0f32; 64];
    let output = resample(&input, 2 * TARGET_RATE, TARGET_RATE);
    assert_eq!(output.len(), 32);
}

#[test]
fn linear_interpolates_expected_values() {
    let input = vec![0.0f32, 1.0];
    assert_eq!(linear(&input, 2.0), vec![0.0, 0.5, 1.0, 1.0]);
}

#[test]
fn linear_downsamples_midpoints() {
    let input = vec![0.0f32, 2.0, 4.0, 6.0];
    assert_eq!(linear(&input, 0.5), vec![0.0, 4.0]);
}

#[test]
fn decimation_taps_are_odd_and_scaled() {
    assert_eq!(decimation_taps(16_000, 16_000), 11);
    assert_eq!(decimation_taps(48_000, 16_000), 13);
    assert_eq!(decimation_taps(96_000, 16_000), 25);
}

#[test]
fn design_low_pass_coeffs_are_normalized_and_symmetric() {
    let coeffs = design_low_pass(0.1, 11);
    let sum: f32 = coeffs.iter().sum();
    assert!((sum - 1.0).abs() < 1e-3);
    assert!((coeffs[0] - coeffs[10]).abs() < 1e-6);
}

#[test]
fn low_pass_preserves_dc_component() {
    let input = vec![1.0f32; 64];
    let output = low_pass(&input, 48_000, TARGET_RATE, 11);
    let avg: f32 = output.iter().sum::<f32>() / output.len() as f32;
    assert!(avg > 0.8 && avg < 1.2);
}

#[test]
fn pad_or_trim_adjusts_to_exact_length() {
    let data = vec![0.1f32, 0.2, 0.3];
    assert_eq!(pad_or_trim(data.clone(), 2), vec![0.1, 0.2]);
    assert_eq!(pad_or_trim(data.clone(), 5), vec![0.1, 0.2, 0.3, 0.3, 0.3]);
    assert_eq!(pad_or_trim(data.clone(), 3), data);
}

#[test]
fn fit_frame_skips_resample_when_rates_match() {
    let frame = vec![0.1f32, 0.2, 0.3, 0.4];
    assert_eq!(fit_frame(frame.clone(), 8_000, 8_000, frame.len()), frame);
}

#[test]
fn fit_frame_resamples_and_pads_to_length() {
    let frame = vec![0.5f32; 200];
    let output = fit_frame(frame, 2_000, 1_000, 100);
    assert_eq!(output.len(), 100);
}

#[test]
fn wav_encoding_round_trips_through_hound() {
    let samples = [0.0f32, 0.5, -0.5, 1.0, -1.0, 1.5, -2.0];
    let bytes = super::encode_wav_mono16(&samples, TARGET_RATE).expect("encode");

    let mut reader = hound::WavReader::new(Cursor::new(bytes)).expect("parse wav");
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, TARGET_RATE);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);

    let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.expect("sample")).collect();
    assert_eq!(
        decoded,
        vec![0, 16_383, -16_383, 32_767, -32_767, 32_767, -32_767]
    );
}
