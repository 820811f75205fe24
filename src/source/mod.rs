//! Audio input abstraction and platform-session collaborators.
//!
//! The controller never talks to hardware directly. It opens an
//! [`AudioInput`] through an [`AudioInputDriver`] and applies platform
//! audio-session policy through a [`SessionConfig`]. Both seams have mock
//! implementations in [`mock`] so the whole pipeline runs hardware-free.

pub mod mock;

use std::time::Instant;

use serde::Serialize;

use crate::config::{MicProfile, OutputRoute};
use crate::error::CaptureError;

/// Result of one bounded blocking read from an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` frames were written to the front of the buffer.
    Frames(usize),
    /// No frames arrived within the read bound; the caller should retry.
    TimedOut,
    /// The device is gone and will produce no more frames.
    DeviceLost,
}

/// An open capture device producing mono signed 16-bit frames.
pub trait AudioInput: Send {
    /// Sample rate the device opened at, in Hz.
    fn sample_rate(&self) -> u32;

    /// Channel count the device opened at.
    fn channels(&self) -> u16;

    /// Reads up to `buf.len()` frames, blocking for at most a bounded
    /// interval so the caller can observe shutdown promptly.
    fn read(&mut self, buf: &mut [i16]) -> ReadOutcome;
}

/// Parameters for opening an input device.
#[derive(Debug, Clone)]
pub struct InputRequest {
    /// Device id to prefer, when the caller has one.
    pub preferred_input: Option<String>,
    /// Whether to request platform voice processing.
    pub voice_processing: bool,
    /// Session chunk duration, as a sizing hint for device buffers.
    pub chunk_ms: u32,
}

/// Opens capture devices.
pub trait AudioInputDriver: Send {
    /// Opens an input for the given request.
    fn open(&mut self, request: &InputRequest) -> Result<Box<dyn AudioInput>, CaptureError>;
}

/// Physical transport category of an input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Built-in microphone.
    BuiltIn,
    /// Wired headset or line-in.
    Wired,
    /// Bluetooth device.
    Bluetooth,
    /// USB audio device.
    Usb,
    /// Anything else.
    Unknown,
}

impl InputKind {
    /// Returns the wire encoding of this kind.
    #[must_use]
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::BuiltIn => "built_in",
            Self::Wired => "wired",
            Self::Bluetooth => "bluetooth",
            Self::Usb => "usb",
            Self::Unknown => "unknown",
        }
    }
}

/// One enumerable input device.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDevice {
    /// Stable device identifier.
    pub id: String,
    /// Human-readable device name.
    pub label: String,
    /// Transport category.
    pub kind: InputKind,
    /// Whether the platform currently treats this device as the default.
    pub is_default: bool,
}

/// Platform audio-session policy: profile activation, routing, and device
/// enumeration.
pub trait SessionConfig: Send {
    /// Activates the audio session for the given profile and route.
    fn apply(
        &mut self,
        profile: MicProfile,
        route: OutputRoute,
        voice_processing: bool,
    ) -> Result<(), CaptureError>;

    /// Requests a specific input device, or clears the preference.
    fn set_preferred_input(&mut self, device_id: Option<&str>) -> Result<(), CaptureError>;

    /// Applies an output routing choice.
    fn set_output_route(&mut self, route: OutputRoute) -> Result<(), CaptureError>;

    /// Enumerates currently available input devices.
    fn inputs(&self) -> Vec<InputDevice>;

    /// Deactivates the audio session.
    fn teardown(&mut self) -> Result<(), CaptureError>;
}

/// A [`SessionConfig`] that accepts everything and enumerates nothing.
///
/// Useful on hosts with no platform audio-session concept.
#[derive(Debug, Default)]
pub struct NullSessionConfig;

impl SessionConfig for NullSessionConfig {
    fn apply(
        &mut self,
        _profile: MicProfile,
        _route: OutputRoute,
        _voice_processing: bool,
    ) -> Result<(), CaptureError> {
        Ok(())
    }

    fn set_preferred_input(&mut self, _device_id: Option<&str>) -> Result<(), CaptureError> {
        Ok(())
    }

    fn set_output_route(&mut self, _route: OutputRoute) -> Result<(), CaptureError> {
        Ok(())
    }

    fn inputs(&self) -> Vec<InputDevice> {
        Vec::new()
    }

    fn teardown(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }
}

/// Monotonic millisecond clock used for level timestamps and durations.
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;
}

/// [`Clock`] backed by [`Instant`].
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Creates a clock with its origin at construction time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}
