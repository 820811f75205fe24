//! Mock input stack for hardware-free testing.
//!
//! [`MockFeed`] is the producer half: a test pushes samples (or generated
//! silence, sine, noise) and they flow through an SPSC ring into the
//! [`MockInput`] the controller reads from. Reads block on a signal channel
//! with a short bound, so the ingestion loop behaves like a real device
//! callback without busy-waiting.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::config::{MicProfile, OutputRoute};
use crate::error::CaptureError;
use crate::source::{
    AudioInput, AudioInputDriver, Clock, InputDevice, InputRequest, ReadOutcome, SessionConfig,
};

/// Ring capacity in samples. Roughly 2.7 s at 48 kHz.
const FEED_CAPACITY: usize = 1 << 17;

/// Upper bound on one blocking read.
const READ_BOUND: Duration = Duration::from_millis(20);

enum Signal {
    Wake,
    DeviceLost,
}

/// Consumer half handed to the controller via [`MockDriver`].
pub struct MockInput {
    sample_rate: u32,
    channels: u16,
    consumer: HeapCons<i16>,
    signals: Receiver<Signal>,
    device_lost: bool,
}

impl AudioInput for MockInput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn read(&mut self, buf: &mut [i16]) -> ReadOutcome {
        if self.device_lost {
            return ReadOutcome::DeviceLost;
        }
        loop {
            let n = self.consumer.pop_slice(buf);
            if n > 0 {
                return ReadOutcome::Frames(n);
            }
            match self.signals.recv_timeout(READ_BOUND) {
                Ok(Signal::Wake) => {}
                Ok(Signal::DeviceLost) => {
                    self.device_lost = true;
                    return ReadOutcome::DeviceLost;
                }
                Err(_) => return ReadOutcome::TimedOut,
            }
        }
    }
}

/// Producer half retained by the test.
pub struct MockFeed {
    sample_rate: u32,
    producer: HeapProd<i16>,
    signals: Sender<Signal>,
    noise_state: u32,
}

impl MockFeed {
    /// Pushes raw samples, returning how many the ring accepted.
    pub fn push_samples(&mut self, samples: &[i16]) -> usize {
        let pushed = self.producer.push_slice(samples);
        let _ = self.signals.send(Signal::Wake);
        pushed
    }

    /// Pushes `ms` milliseconds of silence.
    pub fn push_silence(&mut self, ms: u32) -> usize {
        let frames = (self.sample_rate * ms / 1_000) as usize;
        self.push_samples(&vec![0i16; frames])
    }

    /// Pushes `ms` milliseconds of a full-scale sine at `freq_hz`.
    pub fn push_sine(&mut self, freq_hz: f32, ms: u32) -> usize {
        let frames = (self.sample_rate * ms / 1_000) as usize;
        let samples: Vec<i16> = (0..frames)
            .map(|i| {
                let t = i as f32 / self.sample_rate as f32;
                ((t * freq_hz * 2.0 * std::f32::consts::PI).sin() * 32_767.0).round() as i16
            })
            .collect();
        self.push_samples(&samples)
    }

    /// Pushes `ms` milliseconds of deterministic pseudo-random noise.
    pub fn push_noise(&mut self, ms: u32) -> usize {
        let frames = (self.sample_rate * ms / 1_000) as usize;
        let samples: Vec<i16> = (0..frames)
            .map(|_| {
                self.noise_state = self
                    .noise_state
                    .wrapping_mul(1_664_525)
                    .wrapping_add(1_013_904_223);
                (self.noise_state >> 16) as i16
            })
            .collect();
        self.push_samples(&samples)
    }

    /// Marks the device as lost. The next read that drains the ring
    /// observes [`ReadOutcome::DeviceLost`].
    pub fn signal_device_lost(&self) {
        let _ = self.signals.send(Signal::DeviceLost);
    }
}

/// Creates a connected feed/input pair at the given rate, mono.
#[must_use]
pub fn mock_input_pair(sample_rate: u32) -> (MockFeed, MockInput) {
    let (producer, consumer) = HeapRb::<i16>::new(FEED_CAPACITY).split();
    let (signal_tx, signal_rx) = crossbeam_channel::unbounded();
    let feed = MockFeed {
        sample_rate,
        producer,
        signals: signal_tx,
        noise_state: 0x2545_F491,
    };
    let input = MockInput {
        sample_rate,
        channels: 1,
        consumer,
        signals: signal_rx,
        device_lost: false,
    };
    (feed, input)
}

/// Driver that hands out one pre-built [`MockInput`].
pub struct MockDriver {
    input: Option<MockInput>,
    open_count: Arc<AtomicU32>,
    last_request: Arc<Mutex<Option<InputRequest>>>,
}

impl MockDriver {
    /// Creates a driver plus the feed that supplies its input.
    #[must_use]
    pub fn new(sample_rate: u32) -> (Self, MockFeed) {
        let (feed, input) = mock_input_pair(sample_rate);
        let driver = Self {
            input: Some(input),
            open_count: Arc::new(AtomicU32::new(0)),
            last_request: Arc::new(Mutex::new(None)),
        };
        (driver, feed)
    }

    /// Shared open-call counter, for asserting a driver was (not) opened.
    #[must_use]
    pub fn open_count(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.open_count)
    }

    /// Shared handle to the most recent open request.
    #[must_use]
    pub fn last_request(&self) -> Arc<Mutex<Option<InputRequest>>> {
        Arc::clone(&self.last_request)
    }
}

impl AudioInputDriver for MockDriver {
    fn open(&mut self, request: &InputRequest) -> Result<Box<dyn AudioInput>, CaptureError> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request.clone());
        match self.input.take() {
            Some(input) => Ok(Box::new(input)),
            None => Err(CaptureError::engine_start("Mock input already opened.")),
        }
    }
}

/// Shared, inspectable state behind a [`MockSessionConfig`].
#[derive(Debug, Default)]
pub struct MockSessionState {
    /// Number of `apply` calls.
    pub apply_calls: AtomicU32,
    /// Number of `teardown` calls.
    pub teardown_calls: AtomicU32,
    /// When set, `apply` fails with an audio-session error.
    pub fail_apply: AtomicBool,
    /// When set, `set_preferred_input` fails with a route-change error.
    pub fail_preferred_input: AtomicBool,
    /// Most recent route passed to `set_output_route`.
    pub last_route: Mutex<Option<OutputRoute>>,
    /// Most recent id passed to `set_preferred_input`.
    pub last_preferred_input: Mutex<Option<Option<String>>>,
    /// Devices returned by `inputs`.
    pub devices: Mutex<Vec<InputDevice>>,
}

/// Scriptable [`SessionConfig`] with call counters and failure injection.
#[derive(Debug, Default)]
pub struct MockSessionConfig {
    state: Arc<MockSessionState>,
}

impl MockSessionConfig {
    /// Creates a config with fresh state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle for assertions and failure injection.
    #[must_use]
    pub fn state(&self) -> Arc<MockSessionState> {
        Arc::clone(&self.state)
    }
}

impl SessionConfig for MockSessionConfig {
    fn apply(
        &mut self,
        _profile: MicProfile,
        route: OutputRoute,
        _voice_processing: bool,
    ) -> Result<(), CaptureError> {
        self.state.apply_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_apply.load(Ordering::SeqCst) {
            return Err(CaptureError::session_config(
                "Audio session activation failed.",
            ));
        }
        *self.state.last_route.lock() = Some(route);
        Ok(())
    }

    fn set_preferred_input(&mut self, device_id: Option<&str>) -> Result<(), CaptureError> {
        if self.state.fail_preferred_input.load(Ordering::SeqCst) {
            return Err(CaptureError::route_change(
                "Preferred input is unavailable.",
                true,
            ));
        }
        *self.state.last_preferred_input.lock() = Some(device_id.map(str::to_owned));
        Ok(())
    }

    fn set_output_route(&mut self, route: OutputRoute) -> Result<(), CaptureError> {
        *self.state.last_route.lock() = Some(route);
        Ok(())
    }

    fn inputs(&self) -> Vec<InputDevice> {
        self.state.devices.lock().clone()
    }

    fn teardown(&mut self) -> Result<(), CaptureError> {
        self.state.teardown_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// [`Clock`] whose time only moves when the test advances it.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle that survives handing the clock to a controller.
    #[must_use]
    pub fn handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.now_ms)
    }

    /// Advances the clock by `ms` milliseconds.
    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
