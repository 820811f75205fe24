//! Capture controller: session lifecycle, ingestion thread, and fan-out.
//!
//! One controller owns at most one session at a time. Commands run on the
//! caller's thread under a single coarse mutex; audio flows on a dedicated
//! ingestion thread that reads the input without holding the lock and only
//! locks to process each batch. Events are emitted while the lock is held,
//! so callbacks must not call back into the controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::chunk::PcmChunk;
use crate::config::{
    CaptureOptions, CaptureState, OutputRoute, OutputStream, DEFAULT_CHUNK_MS,
    DEFAULT_FLUSH_TIMEOUT_MS,
};
use crate::error::{CaptureError, ErrorCode};
use crate::event::{
    AudioLevel, CaptureEvent, ErrorEvent, EventCallback, InterruptionPhase,
};
use crate::format::convert::{i16_slice_to_f32, i16_to_le_bytes};
use crate::pipeline::level::LevelMeter;
use crate::pipeline::stream::StreamPipeline;
use crate::session::{Diagnostics, SessionId, StartOutcome, StopOutcome, StreamTotals};
use crate::source::{
    AudioInput, AudioInputDriver, Clock, InputDevice, InputRequest, MonotonicClock,
    NullSessionConfig, ReadOutcome, SessionConfig,
};

/// Smallest accepted stop-time flush wait.
const MIN_FLUSH_TIMEOUT_MS: u64 = 10;

/// Floor on the per-read buffer size in frames.
const MIN_READ_FRAMES: usize = 256;

struct ActiveSession {
    id: SessionId,
    pipelines: Vec<StreamPipeline>,
    level_meter: Option<LevelMeter>,
    mic_enabled: bool,
    start_ms: u64,
    total_frames_in: u64,
    dropped_input_frames: u64,
    actual_input_rate: u32,
    actual_input_channels: u16,
    expected_resume: bool,
}

struct ControllerState {
    state: CaptureState,
    session: Option<ActiveSession>,
    preferred_input: Option<String>,
    output_route: OutputRoute,
    last_route_change_reason: String,
    device_reset_count: u32,
    driver: Box<dyn AudioInputDriver>,
    session_config: Box<dyn SessionConfig>,
    loop_running: Arc<AtomicBool>,
    ingest_thread: Option<JoinHandle<()>>,
    ingest_done: Option<Receiver<()>>,
}

struct Shared {
    state: Mutex<ControllerState>,
    events: EventCallback,
    clock: Arc<dyn Clock>,
}

/// Builder for [`CaptureController`].
pub struct CaptureControllerBuilder {
    driver: Box<dyn AudioInputDriver>,
    session_config: Box<dyn SessionConfig>,
    on_event: EventCallback,
    clock: Arc<dyn Clock>,
}

impl CaptureControllerBuilder {
    /// Sets the platform session-config collaborator. Defaults to
    /// [`NullSessionConfig`].
    #[must_use]
    pub fn session_config(mut self, config: impl SessionConfig + 'static) -> Self {
        self.session_config = Box::new(config);
        self
    }

    /// Sets the event callback. Defaults to discarding all events.
    #[must_use]
    pub fn on_event(mut self, callback: EventCallback) -> Self {
        self.on_event = callback;
        self
    }

    /// Sets the clock. Defaults to a monotonic wall clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Finishes the builder.
    #[must_use]
    pub fn build(self) -> CaptureController {
        CaptureController {
            shared: Arc::new(Shared {
                state: Mutex::new(ControllerState {
                    state: CaptureState::Idle,
                    session: None,
                    preferred_input: None,
                    output_route: OutputRoute::System,
                    last_route_change_reason: String::new(),
                    device_reset_count: 0,
                    driver: self.driver,
                    session_config: self.session_config,
                    loop_running: Arc::new(AtomicBool::new(false)),
                    ingest_thread: None,
                    ingest_done: None,
                }),
                events: self.on_event,
                clock: self.clock,
            }),
        }
    }
}

/// Single-session microphone capture with multi-stream PCM16 fan-out.
pub struct CaptureController {
    shared: Arc<Shared>,
}

impl CaptureController {
    /// Starts building a controller around an input driver.
    pub fn builder(driver: impl AudioInputDriver + 'static) -> CaptureControllerBuilder {
        CaptureControllerBuilder {
            driver: Box::new(driver),
            session_config: Box::new(NullSessionConfig),
            on_event: Arc::new(|_| {}),
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    /// Starts a capture session.
    ///
    /// Validates options before touching any resource; on a later failure
    /// the audio session is torn down and the controller returns to idle,
    /// so a failed start leaves no partial state behind.
    pub fn start(&self, options: CaptureOptions) -> Result<StartOutcome, CaptureError> {
        let mut guard = self.shared.state.lock();
        if guard.state != CaptureState::Idle {
            return Err(CaptureError::already_running());
        }
        let streams = validate_options(&options)?;

        // Options name an input only to override a preference recorded
        // while idle; otherwise the stored one carries over.
        if options.preferred_input.is_some() {
            guard.preferred_input = options.preferred_input.clone();
        }
        guard.output_route = options.output_route;
        let preferred_input = guard.preferred_input.clone();

        if let Err(err) =
            guard
                .session_config
                .apply(options.profile, options.output_route, options.voice_processing)
        {
            let _ = guard.session_config.teardown();
            return Err(err);
        }
        if let Some(device_id) = preferred_input.as_deref() {
            if let Err(err) = guard.session_config.set_preferred_input(Some(device_id)) {
                warn!(device_id, error = %err, "preferred input not applied");
            }
        }

        let request = InputRequest {
            preferred_input: preferred_input.clone(),
            voice_processing: options.voice_processing,
            chunk_ms: options.chunk_ms,
        };
        let input = match guard.driver.open(&request) {
            Ok(input) => input,
            Err(err) => {
                let _ = guard.session_config.teardown();
                return Err(err);
            }
        };
        let actual_input_rate = input.sample_rate();
        let actual_input_channels = input.channels();

        let pipelines: Vec<StreamPipeline> = streams
            .iter()
            .map(|stream| StreamPipeline::new(*stream, actual_input_rate, options.chunk_ms))
            .collect();
        let level_meter = options.emit_audio_level.then(|| {
            let interval_frames =
                u64::from(actual_input_rate) * u64::from(options.audio_level_interval_ms) / 1_000;
            LevelMeter::new(interval_frames.max(1))
        });

        let session_id = SessionId::generate();
        let loop_running = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = bounded(1);
        let read_frames = ((actual_input_rate * options.chunk_ms / 1_000) as usize)
            .max(MIN_READ_FRAMES);
        let spawn_result = thread::Builder::new().name("mic-capture-ingest".to_string()).spawn({
            let shared = Arc::clone(&self.shared);
            let loop_running = Arc::clone(&loop_running);
            move || ingest_loop(&shared, input, &loop_running, read_frames, &done_tx)
        });
        let handle = match spawn_result {
            Ok(handle) => handle,
            Err(err) => {
                let _ = guard.session_config.teardown();
                return Err(CaptureError::engine_start(format!(
                    "Could not spawn ingestion thread: {err}"
                )));
            }
        };

        guard.session = Some(ActiveSession {
            id: session_id.clone(),
            pipelines,
            level_meter,
            mic_enabled: true,
            start_ms: self.shared.clock.now_ms(),
            total_frames_in: 0,
            dropped_input_frames: 0,
            actual_input_rate,
            actual_input_channels,
            expected_resume: false,
        });
        guard.state = CaptureState::Running;
        guard.loop_running = loop_running;
        guard.ingest_thread = Some(handle);
        guard.ingest_done = Some(done_rx);

        info!(
            session = %session_id,
            rate = actual_input_rate,
            channels = actual_input_channels,
            streams = streams.len(),
            "capture started"
        );
        (self.shared.events)(CaptureEvent::StateChanged {
            state: CaptureState::Running,
            reason: "start_capture".to_string(),
            session_id: Some(session_id.clone()),
        });

        Ok(StartOutcome {
            session_id,
            actual_input_rate,
            actual_input_channels,
            chunk_ms: options.chunk_ms,
        })
    }

    /// Stops the session with the given id, flushing every stream.
    ///
    /// Waits up to `flush_timeout_ms` (default 150 ms, floor 10 ms) for the
    /// ingestion thread to drain its current batch, then flushes resampler
    /// tails and emits zero-padded terminal chunks marked final. A stale or
    /// unknown id fails without touching the active session.
    pub fn stop(
        &self,
        session_id: &SessionId,
        flush_timeout_ms: Option<u64>,
    ) -> Result<StopOutcome, CaptureError> {
        let mut guard = self.shared.state.lock();
        match guard.session.as_ref() {
            Some(session) if session.id == *session_id => {}
            _ => return Err(CaptureError::not_running(session_id.as_str())),
        }
        guard.loop_running.store(false, Ordering::SeqCst);
        let done_rx = guard.ingest_done.take();
        let handle = guard.ingest_thread.take();
        drop(guard);

        let timeout = flush_timeout_ms
            .unwrap_or(DEFAULT_FLUSH_TIMEOUT_MS)
            .max(MIN_FLUSH_TIMEOUT_MS);
        if let Some(done_rx) = done_rx {
            match done_rx.recv_timeout(Duration::from_millis(timeout)) {
                Ok(()) => {
                    if let Some(handle) = handle {
                        let _ = handle.join();
                    }
                }
                Err(_) => {
                    warn!(timeout, "ingestion thread did not stop in time; abandoning it");
                }
            }
        }

        let mut guard = self.shared.state.lock();
        let Some(mut session) = guard.session.take() else {
            return Err(CaptureError::not_running(session_id.as_str()));
        };
        let stopped_id = session.id.clone();
        let start_ms = session.start_ms;

        let mut frames_out = Vec::with_capacity(session.pipelines.len());
        for pipeline in &mut session.pipelines {
            let tail = pipeline.flush();
            pipeline.append(&tail);
            while let Some(chunk) = pipeline.pop_chunk() {
                emit_chunk(&self.shared, &stopped_id, start_ms, pipeline, chunk, false);
            }
            if let Some(chunk) = pipeline.pop_final_chunk() {
                emit_chunk(&self.shared, &stopped_id, start_ms, pipeline, chunk, true);
            }
            frames_out.push(StreamTotals {
                stream: pipeline.stream(),
                frames: pipeline.emitted_frames(),
            });
        }

        if let Err(err) = guard.session_config.teardown() {
            (self.shared.events)(CaptureEvent::Error(ErrorEvent {
                code: ErrorCode::EngineStopFailed,
                message: err.message,
                recoverable: true,
                session_id: Some(stopped_id.clone()),
                native_detail: err.native_detail,
            }));
        }

        guard.state = CaptureState::Idle;
        info!(session = %stopped_id, frames_in = session.total_frames_in, "capture stopped");
        (self.shared.events)(CaptureEvent::StateChanged {
            state: CaptureState::Idle,
            reason: "stop_capture".to_string(),
            session_id: None,
        });

        let duration_ms = self.shared.clock.now_ms().saturating_sub(start_ms);
        Ok(StopOutcome {
            session_id: stopped_id,
            total_frames_in: session.total_frames_in,
            frames_out,
            duration_ms,
        })
    }

    /// Mutes or unmutes the session without disturbing its timing.
    ///
    /// While muted, ingestion keeps running and chunks keep flowing with
    /// zeroed payloads, so sequence numbers and timestamps stay continuous.
    pub fn set_mic_enabled(
        &self,
        session_id: &SessionId,
        enabled: bool,
    ) -> Result<(), CaptureError> {
        let mut guard = self.shared.state.lock();
        match guard.session.as_mut() {
            Some(session) if session.id == *session_id => {
                session.mic_enabled = enabled;
                debug!(session = %session_id, enabled, "mic toggled");
                Ok(())
            }
            _ => Err(CaptureError::not_running(session_id.as_str())),
        }
    }

    /// Records a preferred input device and, when a session is live,
    /// applies it immediately.
    pub fn set_preferred_input(&self, device_id: Option<&str>) -> Result<(), CaptureError> {
        let mut guard = self.shared.state.lock();
        guard.preferred_input = device_id.map(str::to_owned);
        if guard.state == CaptureState::Idle {
            return Ok(());
        }
        guard.session_config.set_preferred_input(device_id)?;
        guard.last_route_change_reason = "set_preferred_input".to_string();
        let session_id = guard.session.as_ref().map(|s| s.id.clone());
        (self.shared.events)(CaptureEvent::RouteChanged {
            reason: "set_preferred_input".to_string(),
            session_id,
            selected_input_id: device_id.map(str::to_owned),
        });
        Ok(())
    }

    /// Records an output route and, when a session is live, applies it
    /// immediately.
    pub fn set_output_route(&self, route: OutputRoute) -> Result<(), CaptureError> {
        let mut guard = self.shared.state.lock();
        guard.output_route = route;
        if guard.state == CaptureState::Idle {
            return Ok(());
        }
        guard.session_config.set_output_route(route)?;
        guard.last_route_change_reason = "set_output_route".to_string();
        let session_id = guard.session.as_ref().map(|s| s.id.clone());
        (self.shared.events)(CaptureEvent::RouteChanged {
            reason: "set_output_route".to_string(),
            session_id,
            selected_input_id: None,
        });
        Ok(())
    }

    /// Reports an audio-session interruption beginning.
    ///
    /// A running session pauses and remembers that it should resume when
    /// the interruption ends.
    pub fn interruption_began(&self) {
        let mut guard = self.shared.state.lock();
        let was_running = guard.state == CaptureState::Running;
        let session_id = guard.session.as_ref().map(|s| s.id.clone());
        if let Some(session) = guard.session.as_mut() {
            session.expected_resume = was_running;
        }
        if was_running {
            guard.state = CaptureState::Paused;
            (self.shared.events)(CaptureEvent::StateChanged {
                state: CaptureState::Paused,
                reason: "interruption_began".to_string(),
                session_id: session_id.clone(),
            });
        }
        (self.shared.events)(CaptureEvent::Interruption {
            session_id: session_id.clone(),
            phase: InterruptionPhase::Began,
            should_resume: None,
        });
        (self.shared.events)(CaptureEvent::Error(ErrorEvent {
            code: ErrorCode::Interrupted,
            message: "Audio session interruption began.".to_string(),
            recoverable: true,
            session_id,
            native_detail: None,
        }));
    }

    /// Reports an audio-session interruption ending.
    ///
    /// Resumes only when the platform suggests it and the session was
    /// running when the interruption began.
    pub fn interruption_ended(&self, should_resume: bool) {
        let mut guard = self.shared.state.lock();
        let session_id = guard.session.as_ref().map(|s| s.id.clone());
        (self.shared.events)(CaptureEvent::Interruption {
            session_id: session_id.clone(),
            phase: InterruptionPhase::Ended,
            should_resume: Some(should_resume),
        });
        let expected = guard
            .session
            .as_mut()
            .map(|session| std::mem::take(&mut session.expected_resume))
            .unwrap_or(false);
        if should_resume && expected && guard.state == CaptureState::Paused {
            guard.state = CaptureState::Running;
            (self.shared.events)(CaptureEvent::StateChanged {
                state: CaptureState::Running,
                reason: "interruption_resumed".to_string(),
                session_id,
            });
        }
    }

    /// Reports a platform route change, e.g. `"new_device_available"` or
    /// `"old_device_unavailable"`.
    pub fn notify_route_changed(&self, reason: &str) {
        let mut guard = self.shared.state.lock();
        guard.last_route_change_reason = reason.to_string();
        let session_id = guard.session.as_ref().map(|s| s.id.clone());
        let selected_input_id = selected_input(&guard);
        (self.shared.events)(CaptureEvent::RouteChanged {
            reason: reason.to_string(),
            session_id,
            selected_input_id,
        });
    }

    /// Enumerates available input devices plus the id of the one currently
    /// selected, when known.
    #[must_use]
    pub fn devices(&self) -> (Vec<InputDevice>, Option<String>) {
        let guard = self.shared.state.lock();
        let devices = guard.session_config.inputs();
        let selected = guard.preferred_input.clone().or_else(|| {
            devices
                .iter()
                .find(|device| device.is_default)
                .map(|device| device.id.clone())
        });
        (devices, selected)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> CaptureState {
        self.shared.state.lock().state
    }

    /// Snapshot of controller and session counters.
    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        let guard = self.shared.state.lock();
        let session = guard.session.as_ref();
        Diagnostics {
            state: guard.state,
            session_id: session.map(|s| s.id.clone()),
            mic_enabled: session.map_or(false, |s| s.mic_enabled),
            output_route: guard.output_route,
            preferred_input: guard.preferred_input.clone(),
            actual_input_rate: session.map_or(0, |s| s.actual_input_rate),
            actual_input_channels: session.map_or(0, |s| s.actual_input_channels),
            total_frames_in: session.map_or(0, |s| s.total_frames_in),
            frames_out: session.map_or_else(Vec::new, |s| {
                s.pipelines
                    .iter()
                    .map(|p| StreamTotals {
                        stream: p.stream(),
                        frames: p.emitted_frames(),
                    })
                    .collect()
            }),
            dropped_input_frames: session.map_or(0, |s| s.dropped_input_frames),
            device_reset_count: guard.device_reset_count,
            last_route_change_reason: guard.last_route_change_reason.clone(),
        }
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        let guard = self.shared.state.lock();
        guard.loop_running.store(false, Ordering::SeqCst);
    }
}

/// Explicit preference wins; otherwise the platform default device.
fn selected_input(state: &ControllerState) -> Option<String> {
    state.preferred_input.clone().or_else(|| {
        state
            .session_config
            .inputs()
            .into_iter()
            .find(|device| device.is_default)
            .map(|device| device.id)
    })
}

/// Checks option invariants and returns the deduplicated stream list.
fn validate_options(options: &CaptureOptions) -> Result<Vec<OutputStream>, CaptureError> {
    if options.chunk_ms != DEFAULT_CHUNK_MS {
        return Err(CaptureError::internal("Only 20ms chunking is supported."));
    }
    if options.output_streams.is_empty() {
        return Err(CaptureError::internal(
            "At least one output stream must be provided.",
        ));
    }
    if options.mode != options.profile.required_mode() {
        let message = match options.profile {
            crate::config::MicProfile::Waveform => "Waveform profile requires measurement mode.",
            crate::config::MicProfile::Pipecat => "Pipecat profile requires voice_chat mode.",
        };
        return Err(CaptureError::internal(message));
    }
    let mut streams = Vec::with_capacity(options.output_streams.len());
    for stream in &options.output_streams {
        if !streams.contains(stream) {
            streams.push(*stream);
        }
    }
    Ok(streams)
}

fn ingest_loop(
    shared: &Shared,
    mut input: Box<dyn AudioInput>,
    running: &AtomicBool,
    read_frames: usize,
    done: &Sender<()>,
) {
    let mut buf = vec![0i16; read_frames];
    while running.load(Ordering::SeqCst) {
        match input.read(&mut buf) {
            ReadOutcome::Frames(n) => process_batch(shared, &buf[..n]),
            ReadOutcome::TimedOut => {}
            ReadOutcome::DeviceLost => {
                handle_device_lost(shared);
                break;
            }
        }
    }
    debug!("ingestion loop exited");
    let _ = done.send(());
}

fn process_batch(shared: &Shared, samples: &[i16]) {
    let mut guard = shared.state.lock();
    let state = guard.state;
    let Some(session) = guard.session.as_mut() else {
        return;
    };
    if state != CaptureState::Running {
        session.dropped_input_frames += samples.len() as u64;
        return;
    }
    session.total_frames_in += samples.len() as u64;

    let mut floats = i16_slice_to_f32(samples);
    if !session.mic_enabled {
        floats.iter_mut().for_each(|v| *v = 0.0);
    }

    let session_id = session.id.clone();
    let start_ms = session.start_ms;
    if let Some(meter) = session.level_meter.as_mut() {
        if let Some(reading) = meter.accumulate(&floats) {
            (shared.events)(CaptureEvent::AudioLevel(AudioLevel {
                session_id: session_id.clone(),
                rms: reading.rms,
                peak: reading.peak,
                dbfs: reading.dbfs,
                vad: reading.vad,
                pts_ms: shared.clock.now_ms(),
            }));
        }
    }
    for pipeline in &mut session.pipelines {
        let converted = pipeline.convert(&floats);
        pipeline.append(&converted);
        while let Some(chunk) = pipeline.pop_chunk() {
            emit_chunk(shared, &session_id, start_ms, pipeline, chunk, false);
        }
    }
}

fn emit_chunk(
    shared: &Shared,
    session_id: &SessionId,
    start_ms: u64,
    pipeline: &mut StreamPipeline,
    chunk: Vec<i16>,
    is_final: bool,
) {
    let frames = chunk.len() as u64;
    let (seq, pts_offset_ms) = pipeline.next_chunk_meta(frames);
    (shared.events)(CaptureEvent::PcmChunk(PcmChunk {
        session_id: session_id.clone(),
        stream: pipeline.stream(),
        sample_rate: pipeline.sample_rate(),
        channels: 1,
        frames: frames as u32,
        seq,
        pts_ms: start_ms + pts_offset_ms,
        payload: Arc::new(i16_to_le_bytes(&chunk)),
        is_final,
    }));
}

fn handle_device_lost(shared: &Shared) {
    let mut guard = shared.state.lock();
    guard.device_reset_count += 1;
    let session_id = guard.session.as_ref().map(|s| s.id.clone());
    warn!(session = session_id.as_ref().map(SessionId::as_str), "input device lost");
    (shared.events)(CaptureEvent::Error(ErrorEvent {
        code: ErrorCode::DeviceReset,
        message: "Audio device was reset.".to_string(),
        recoverable: true,
        session_id: session_id.clone(),
        native_detail: None,
    }));
    if guard.state == CaptureState::Running {
        guard.state = CaptureState::Paused;
        (shared.events)(CaptureEvent::StateChanged {
            state: CaptureState::Paused,
            reason: "device_reset".to_string(),
            session_id,
        });
    }
}
