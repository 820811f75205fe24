//! End-to-end pipeline tests over the mock input stack.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use mic_capture::source::mock::{ManualClock, MockDriver, MockSessionConfig};
use mic_capture::{
    event_callback, CaptureController, CaptureEvent, CaptureOptions, CaptureState, ErrorCode,
    EventCallback, MicProfile, OutputStream, PcmChunk, SessionId, SessionMode,
};

const WAIT_BUDGET: Duration = Duration::from_secs(3);

#[derive(Clone, Default)]
struct EventLog(Arc<Mutex<Vec<CaptureEvent>>>);

impl EventLog {
    fn callback(&self) -> EventCallback {
        let log = Arc::clone(&self.0);
        event_callback(move |event| log.lock().push(event))
    }

    fn snapshot(&self) -> Vec<CaptureEvent> {
        self.0.lock().clone()
    }

    fn chunks(&self, stream: OutputStream) -> Vec<PcmChunk> {
        self.snapshot()
            .into_iter()
            .filter_map(|event| match event {
                CaptureEvent::PcmChunk(chunk) if chunk.stream == stream => Some(chunk),
                _ => None,
            })
            .collect()
    }

    fn wait_until(&self, pred: impl Fn(&[CaptureEvent]) -> bool) -> bool {
        let deadline = Instant::now() + WAIT_BUDGET;
        loop {
            if pred(&self.0.lock()) {
                return true;
            }
            if Instant::now() > deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

fn wait_for_ingest(controller: &CaptureController, frames: u64) -> bool {
    let deadline = Instant::now() + WAIT_BUDGET;
    while controller.diagnostics().total_frames_in < frames {
        if Instant::now() > deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    true
}

fn both_streams() -> CaptureOptions {
    CaptureOptions::new(
        MicProfile::Pipecat,
        SessionMode::VoiceChat,
        vec![OutputStream::Pcm16k, OutputStream::Pcm48k],
    )
}

fn build(driver: MockDriver, log: &EventLog, config: MockSessionConfig) -> CaptureController {
    CaptureController::builder(driver)
        .session_config(config)
        .on_event(log.callback())
        .clock(Arc::new(ManualClock::new()))
        .build()
}

#[test]
fn test_one_second_fans_out_fifty_chunks_per_stream() {
    let (driver, mut feed) = MockDriver::new(48_000);
    let log = EventLog::default();
    let controller = build(driver, &log, MockSessionConfig::new());

    let outcome = controller.start(both_streams()).unwrap();
    assert_eq!(outcome.actual_input_rate, 48_000);
    assert_eq!(outcome.chunk_ms, 20);

    for _ in 0..100 {
        feed.push_noise(10);
    }
    assert!(log.wait_until(|events| {
        events
            .iter()
            .filter(|e| matches!(e, CaptureEvent::PcmChunk(c) if c.stream == OutputStream::Pcm16k))
            .count()
            >= 50
    }));

    let stopped = controller.stop(&outcome.session_id, None).unwrap();
    assert_eq!(stopped.total_frames_in, 48_000);
    let totals: Vec<u64> = stopped.frames_out.iter().map(|t| t.frames).collect();
    assert_eq!(totals, vec![16_000, 48_000]);

    for stream in [OutputStream::Pcm16k, OutputStream::Pcm48k] {
        let chunks = log.chunks(stream);
        assert_eq!(chunks.len(), 50, "{}", stream.as_wire());
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.seq, i as u64);
            assert_eq!(chunk.pts_ms, i as u64 * 20);
            assert_eq!(chunk.frames, stream.sample_rate() / 50);
            assert_eq!(chunk.payload.len(), chunk.frames as usize * 2);
            assert_eq!(chunk.channels, 1);
        }
    }
    assert_eq!(controller.state(), CaptureState::Idle);
}

#[test]
fn test_partial_tail_emits_zero_padded_final_chunk() {
    let (driver, mut feed) = MockDriver::new(48_000);
    let log = EventLog::default();
    let controller = build(driver, &log, MockSessionConfig::new());

    let outcome = controller
        .start(CaptureOptions::new(
            MicProfile::Waveform,
            SessionMode::Measurement,
            vec![OutputStream::Pcm16k],
        ))
        .unwrap();
    // 30 ms of input leaves 10 ms pending at 16 kHz.
    feed.push_noise(30);
    assert!(wait_for_ingest(&controller, 1_440));
    controller.stop(&outcome.session_id, None).unwrap();

    let chunks = log.chunks(OutputStream::Pcm16k);
    assert_eq!(chunks.len(), 2);
    assert!(!chunks[0].is_final);
    let last = &chunks[1];
    assert!(last.is_final);
    assert_eq!(last.frames, 320);
    // The pad is silence.
    assert!(last.samples()[160..].iter().all(|&s| s == 0));
}

#[test]
fn test_audio_levels_track_signal_loudness() {
    let (driver, mut feed) = MockDriver::new(48_000);
    let log = EventLog::default();
    let controller = build(driver, &log, MockSessionConfig::new());

    let mut options = both_streams();
    options.emit_audio_level = true;
    let outcome = controller.start(options).unwrap();

    feed.push_sine(440.0, 100);
    assert!(log.wait_until(|events| {
        events
            .iter()
            .any(|e| matches!(e, CaptureEvent::AudioLevel(_)))
    }));
    feed.push_silence(100);
    assert!(log.wait_until(|events| {
        events
            .iter()
            .any(|e| matches!(e, CaptureEvent::AudioLevel(l) if l.dbfs <= -89.0))
    }));
    controller.stop(&outcome.session_id, None).unwrap();

    let levels: Vec<_> = log
        .snapshot()
        .into_iter()
        .filter_map(|e| match e {
            CaptureEvent::AudioLevel(level) => Some(level),
            _ => None,
        })
        .collect();
    // A full-scale sine sits at roughly -3 dBFS RMS.
    let loud = &levels[0];
    assert!((loud.dbfs + 3.01).abs() < 0.5, "dbfs = {}", loud.dbfs);
    assert!(loud.vad);
    assert!(loud.peak > 0.99);
    let quiet = levels.last().unwrap();
    assert!(quiet.dbfs <= -89.0);
    assert!(!quiet.vad);
}

#[test]
fn test_mute_keeps_cadence_with_silent_payloads() {
    let (driver, mut feed) = MockDriver::new(48_000);
    let log = EventLog::default();
    let controller = build(driver, &log, MockSessionConfig::new());

    let outcome = controller.start(both_streams()).unwrap();
    controller
        .set_mic_enabled(&outcome.session_id, false)
        .unwrap();
    feed.push_noise(100);
    assert!(wait_for_ingest(&controller, 4_800));
    let stopped = controller.stop(&outcome.session_id, None).unwrap();

    // Muted input still counts as ingested and still produces chunks.
    assert_eq!(stopped.total_frames_in, 4_800);
    let chunks = log.chunks(OutputStream::Pcm16k);
    assert!(chunks.len() >= 4);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.seq, i as u64);
        assert!(chunk.samples().iter().all(|&s| s == 0));
    }
}

#[test]
fn test_profile_mode_mismatch_fails_before_opening_device() {
    let (driver, _feed) = MockDriver::new(48_000);
    let open_count = driver.open_count();
    let log = EventLog::default();
    let controller = build(driver, &log, MockSessionConfig::new());

    let options = CaptureOptions::new(
        MicProfile::Waveform,
        SessionMode::VoiceChat,
        vec![OutputStream::Pcm16k],
    );
    let err = controller.start(options).unwrap_err();
    assert_eq!(err.code, ErrorCode::Internal);
    assert_eq!(open_count.load(Ordering::SeqCst), 0);
    assert_eq!(controller.state(), CaptureState::Idle);
}

#[test]
fn test_invalid_chunk_and_empty_streams_rejected() {
    let (driver, _feed) = MockDriver::new(48_000);
    let log = EventLog::default();
    let controller = build(driver, &log, MockSessionConfig::new());

    let mut options = both_streams();
    options.chunk_ms = 10;
    assert_eq!(
        controller.start(options).unwrap_err().code,
        ErrorCode::Internal
    );

    let mut options = both_streams();
    options.output_streams = Vec::new();
    assert_eq!(
        controller.start(options).unwrap_err().code,
        ErrorCode::Internal
    );
    assert_eq!(controller.state(), CaptureState::Idle);
}

#[test]
fn test_failed_session_activation_rolls_back_to_idle() {
    let (driver, _feed) = MockDriver::new(48_000);
    let open_count = driver.open_count();
    let log = EventLog::default();
    let config = MockSessionConfig::new();
    let state = config.state();
    state.fail_apply.store(true, Ordering::SeqCst);
    let controller = build(driver, &log, config);

    let err = controller.start(both_streams()).unwrap_err();
    assert_eq!(err.code, ErrorCode::SessionConfigFailed);
    assert_eq!(controller.state(), CaptureState::Idle);
    assert_eq!(open_count.load(Ordering::SeqCst), 0);
    assert_eq!(state.teardown_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_second_start_is_rejected() {
    let (driver, _feed) = MockDriver::new(48_000);
    let log = EventLog::default();
    let controller = build(driver, &log, MockSessionConfig::new());

    let outcome = controller.start(both_streams()).unwrap();
    let err = controller.start(both_streams()).unwrap_err();
    assert_eq!(err.code, ErrorCode::AlreadyRunning);
    controller.stop(&outcome.session_id, None).unwrap();
}

#[test]
fn test_stale_session_id_cannot_stop_or_mute() {
    let (driver, _feed) = MockDriver::new(48_000);
    let log = EventLog::default();
    let controller = build(driver, &log, MockSessionConfig::new());

    let outcome = controller.start(both_streams()).unwrap();
    let stale = SessionId::new("not-the-session");
    assert_eq!(
        controller.stop(&stale, None).unwrap_err().code,
        ErrorCode::NotRunning
    );
    assert_eq!(
        controller
            .set_mic_enabled(&stale, false)
            .unwrap_err()
            .code,
        ErrorCode::NotRunning
    );
    assert_eq!(controller.state(), CaptureState::Running);
    controller.stop(&outcome.session_id, None).unwrap();
    assert_eq!(controller.state(), CaptureState::Idle);
}

#[test]
fn test_device_loss_pauses_and_reports_reset() {
    let (driver, mut feed) = MockDriver::new(48_000);
    let log = EventLog::default();
    let controller = build(driver, &log, MockSessionConfig::new());

    let outcome = controller.start(both_streams()).unwrap();
    feed.push_noise(40);
    assert!(log.wait_until(|events| {
        events
            .iter()
            .any(|e| matches!(e, CaptureEvent::PcmChunk(_)))
    }));
    feed.signal_device_lost();
    assert!(log.wait_until(|events| {
        events.iter().any(|e| {
            matches!(
                e,
                CaptureEvent::Error(err)
                    if err.code == ErrorCode::DeviceReset && err.recoverable
            )
        })
    }));
    assert!(log.wait_until(|events| {
        events.iter().any(|e| {
            matches!(
                e,
                CaptureEvent::StateChanged { state, reason, .. }
                    if *state == CaptureState::Paused && reason == "device_reset"
            )
        })
    }));
    assert_eq!(controller.state(), CaptureState::Paused);
    assert_eq!(controller.diagnostics().device_reset_count, 1);
    controller.stop(&outcome.session_id, None).unwrap();
}

#[test]
fn test_interruption_pauses_then_resumes() {
    let (driver, _feed) = MockDriver::new(48_000);
    let log = EventLog::default();
    let controller = build(driver, &log, MockSessionConfig::new());

    let outcome = controller.start(both_streams()).unwrap();
    controller.interruption_began();
    assert_eq!(controller.state(), CaptureState::Paused);
    let events = log.snapshot();
    assert!(events.iter().any(|e| {
        matches!(
            e,
            CaptureEvent::Error(err)
                if err.code == ErrorCode::Interrupted && err.recoverable
        )
    }));

    controller.interruption_ended(true);
    assert_eq!(controller.state(), CaptureState::Running);
    assert!(log.snapshot().iter().any(|e| {
        matches!(
            e,
            CaptureEvent::StateChanged { state, reason, .. }
                if *state == CaptureState::Running && reason == "interruption_resumed"
        )
    }));
    controller.stop(&outcome.session_id, None).unwrap();
}

#[test]
fn test_interruption_without_resume_hint_stays_paused() {
    let (driver, _feed) = MockDriver::new(48_000);
    let log = EventLog::default();
    let controller = build(driver, &log, MockSessionConfig::new());

    let outcome = controller.start(both_streams()).unwrap();
    controller.interruption_began();
    controller.interruption_ended(false);
    assert_eq!(controller.state(), CaptureState::Paused);
    controller.stop(&outcome.session_id, None).unwrap();
}

#[test]
fn test_route_commands_reach_session_config_when_live() {
    use mic_capture::OutputRoute;

    let (driver, _feed) = MockDriver::new(48_000);
    let log = EventLog::default();
    let config = MockSessionConfig::new();
    let state = config.state();
    let controller = build(driver, &log, config);

    // Idle: recorded but not applied.
    controller.set_output_route(OutputRoute::Speaker).unwrap();
    assert_eq!(*state.last_route.lock(), None);

    let outcome = controller.start(both_streams()).unwrap();
    controller.set_output_route(OutputRoute::Receiver).unwrap();
    assert_eq!(*state.last_route.lock(), Some(OutputRoute::Receiver));
    controller.set_preferred_input(Some("mic-2")).unwrap();
    assert_eq!(
        *state.last_preferred_input.lock(),
        Some(Some("mic-2".to_string()))
    );
    assert!(log.snapshot().iter().any(|e| {
        matches!(
            e,
            CaptureEvent::RouteChanged { reason, .. } if reason == "set_preferred_input"
        )
    }));
    controller.stop(&outcome.session_id, None).unwrap();
}

#[test]
fn test_idle_preferred_input_carries_into_next_start() {
    let (driver, _feed) = MockDriver::new(48_000);
    let last_request = driver.last_request();
    let log = EventLog::default();
    let config = MockSessionConfig::new();
    let state = config.state();
    let controller = build(driver, &log, config);

    controller.set_preferred_input(Some("mic-2")).unwrap();
    let outcome = controller.start(both_streams()).unwrap();

    let request = last_request.lock().clone().unwrap();
    assert_eq!(request.preferred_input.as_deref(), Some("mic-2"));
    assert_eq!(
        *state.last_preferred_input.lock(),
        Some(Some("mic-2".to_string()))
    );
    assert_eq!(
        controller.diagnostics().preferred_input.as_deref(),
        Some("mic-2")
    );
    controller.stop(&outcome.session_id, None).unwrap();
}

#[test]
fn test_start_options_override_stored_preferred_input() {
    let (driver, _feed) = MockDriver::new(48_000);
    let last_request = driver.last_request();
    let log = EventLog::default();
    let controller = build(driver, &log, MockSessionConfig::new());

    controller.set_preferred_input(Some("mic-2")).unwrap();
    let mut options = both_streams();
    options.preferred_input = Some("usb-1".to_string());
    let outcome = controller.start(options).unwrap();

    let request = last_request.lock().clone().unwrap();
    assert_eq!(request.preferred_input.as_deref(), Some("usb-1"));
    assert_eq!(
        controller.diagnostics().preferred_input.as_deref(),
        Some("usb-1")
    );
    controller.stop(&outcome.session_id, None).unwrap();
}

#[test]
fn test_device_enumeration_and_route_notification() {
    use mic_capture::source::{InputDevice, InputKind};

    let (driver, _feed) = MockDriver::new(48_000);
    let log = EventLog::default();
    let config = MockSessionConfig::new();
    let state = config.state();
    state.devices.lock().extend([
        InputDevice {
            id: "mic-1".to_string(),
            label: "Built-in Microphone".to_string(),
            kind: InputKind::BuiltIn,
            is_default: true,
        },
        InputDevice {
            id: "bt-1".to_string(),
            label: "Headset".to_string(),
            kind: InputKind::Bluetooth,
            is_default: false,
        },
    ]);
    let controller = build(driver, &log, config);

    let (devices, selected) = controller.devices();
    assert_eq!(devices.len(), 2);
    assert_eq!(selected.as_deref(), Some("mic-1"));

    controller.set_preferred_input(Some("bt-1")).unwrap();
    let (_, selected) = controller.devices();
    assert_eq!(selected.as_deref(), Some("bt-1"));

    controller.notify_route_changed("new_device_available");
    assert!(log.snapshot().iter().any(|e| {
        matches!(
            e,
            CaptureEvent::RouteChanged { reason, selected_input_id, .. }
                if reason == "new_device_available"
                    && selected_input_id.as_deref() == Some("bt-1")
        )
    }));
    assert_eq!(
        controller.diagnostics().last_route_change_reason,
        "new_device_available"
    );
}

#[test]
fn test_diagnostics_reflect_session_counters() {
    let (driver, mut feed) = MockDriver::new(48_000);
    let log = EventLog::default();
    let controller = build(driver, &log, MockSessionConfig::new());

    let idle = controller.diagnostics();
    assert_eq!(idle.state, CaptureState::Idle);
    assert_eq!(idle.actual_input_rate, 0);

    let outcome = controller.start(both_streams()).unwrap();
    feed.push_noise(100);
    assert!(log.wait_until(|events| {
        events
            .iter()
            .filter(|e| matches!(e, CaptureEvent::PcmChunk(c) if c.stream == OutputStream::Pcm48k))
            .count()
            >= 4
    }));
    let live = controller.diagnostics();
    assert_eq!(live.state, CaptureState::Running);
    assert_eq!(live.session_id, Some(outcome.session_id.clone()));
    assert!(live.mic_enabled);
    assert_eq!(live.actual_input_rate, 48_000);
    assert!(live.total_frames_in >= 4_800 - 960);
    assert_eq!(live.frames_out.len(), 2);
    controller.stop(&outcome.session_id, None).unwrap();
}

#[test]
fn test_duplicate_streams_collapse() {
    let (driver, mut feed) = MockDriver::new(48_000);
    let log = EventLog::default();
    let controller = build(driver, &log, MockSessionConfig::new());

    let options = CaptureOptions::new(
        MicProfile::Pipecat,
        SessionMode::VoiceChat,
        vec![
            OutputStream::Pcm16k,
            OutputStream::Pcm16k,
            OutputStream::Pcm48k,
        ],
    );
    let outcome = controller.start(options).unwrap();
    feed.push_noise(40);
    assert!(log.wait_until(|events| {
        events
            .iter()
            .any(|e| matches!(e, CaptureEvent::PcmChunk(c) if c.stream == OutputStream::Pcm16k))
    }));
    let stopped = controller.stop(&outcome.session_id, None).unwrap();
    assert_eq!(stopped.frames_out.len(), 2);

    // One pipeline per distinct stream, so 16 kHz seq numbers stay dense.
    let chunks = log.chunks(OutputStream::Pcm16k);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.seq, i as u64);
    }
}
