//! Configuration types for capture sessions.
//!
//! All enums here are wire-facing: they carry an explicit, exhaustive
//! string-encoding table via `as_wire`/`from_wire`. Unknown wire values
//! parse to `None`, never to a default.

use serde::{Deserialize, Serialize};

/// Default chunk duration. The only duration the pipeline supports.
pub const DEFAULT_CHUNK_MS: u32 = 20;

/// Default interval between audio-level events.
pub const DEFAULT_AUDIO_LEVEL_INTERVAL_MS: u32 = 50;

/// Default upper bound on the stop-time flush wait.
pub const DEFAULT_FLUSH_TIMEOUT_MS: u64 = 150;

/// Capture profile selecting the shape of the platform audio session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MicProfile {
    /// Raw measurement capture for waveform display and analysis.
    Waveform,
    /// Voice-chat capture feeding a conversational pipeline.
    Pipecat,
}

impl MicProfile {
    /// Returns the wire encoding of this profile.
    #[must_use]
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Waveform => "waveform",
            Self::Pipecat => "pipecat",
        }
    }

    /// Parses a wire value. Unknown values return `None`.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "waveform" => Some(Self::Waveform),
            "pipecat" => Some(Self::Pipecat),
            _ => None,
        }
    }

    /// Returns the session mode this profile requires.
    ///
    /// Profile/mode pairs are validated before any resource is acquired;
    /// a mismatch rejects the start request.
    #[must_use]
    pub fn required_mode(&self) -> SessionMode {
        match self {
            Self::Waveform => SessionMode::Measurement,
            Self::Pipecat => SessionMode::VoiceChat,
        }
    }
}

/// Session mode requested alongside the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Flat-response measurement mode.
    Measurement,
    /// Echo-cancelled voice-chat mode.
    VoiceChat,
}

impl SessionMode {
    /// Returns the wire encoding of this mode.
    #[must_use]
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Measurement => "measurement",
            Self::VoiceChat => "voice_chat",
        }
    }

    /// Parses a wire value. Unknown values return `None`.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "measurement" => Some(Self::Measurement),
            "voice_chat" => Some(Self::VoiceChat),
            _ => None,
        }
    }
}

/// Output stream identifiers.
///
/// A closed enumeration: each variant fixes the output sample rate, and the
/// chunk frame count follows from the session chunk duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputStream {
    /// 16 kHz mono signed 16-bit little-endian PCM.
    #[serde(rename = "pcm16k_s16le")]
    Pcm16k,
    /// 48 kHz mono signed 16-bit little-endian PCM.
    #[serde(rename = "pcm48k_s16le")]
    Pcm48k,
}

impl OutputStream {
    /// All supported streams, in canonical order.
    pub const ALL: [Self; 2] = [Self::Pcm16k, Self::Pcm48k];

    /// Returns the wire encoding of this stream tag.
    #[must_use]
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Pcm16k => "pcm16k_s16le",
            Self::Pcm48k => "pcm48k_s16le",
        }
    }

    /// Parses a wire value. Unknown values return `None`.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "pcm16k_s16le" => Some(Self::Pcm16k),
            "pcm48k_s16le" => Some(Self::Pcm48k),
            _ => None,
        }
    }

    /// Returns the output sample rate in Hz.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        match self {
            Self::Pcm16k => 16_000,
            Self::Pcm48k => 48_000,
        }
    }
}

/// Output routing choice applied through the session-config collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputRoute {
    /// Let the platform pick the route.
    #[default]
    System,
    /// Force the loudspeaker.
    Speaker,
    /// Force the earpiece receiver.
    Receiver,
}

impl OutputRoute {
    /// Returns the wire encoding of this route.
    #[must_use]
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Speaker => "speaker",
            Self::Receiver => "receiver",
        }
    }

    /// Parses a wire value. Unknown values return `None`.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "system" => Some(Self::System),
            "speaker" => Some(Self::Speaker),
            "receiver" => Some(Self::Receiver),
            _ => None,
        }
    }
}

/// Controller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    /// No session exists.
    Idle,
    /// A session is actively ingesting and emitting.
    Running,
    /// A session exists but ingestion is halted by an interruption or
    /// device loss.
    Paused,
}

impl CaptureState {
    /// Returns the wire encoding of this state.
    #[must_use]
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
        }
    }
}

/// Options for starting a capture session.
///
/// # Example
///
/// ```
/// use mic_capture::{CaptureOptions, MicProfile, OutputStream, SessionMode};
///
/// let options = CaptureOptions::new(
///     MicProfile::Pipecat,
///     SessionMode::VoiceChat,
///     vec![OutputStream::Pcm16k, OutputStream::Pcm48k],
/// );
/// assert_eq!(options.chunk_ms, 20);
/// ```
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Requested capture profile.
    pub profile: MicProfile,
    /// Requested session mode. Must match the profile's required mode.
    pub mode: SessionMode,
    /// Output streams to produce. Duplicates are collapsed preserving
    /// first-occurrence order.
    pub output_streams: Vec<OutputStream>,
    /// Chunk duration in milliseconds. Only 20 ms is supported.
    pub chunk_ms: u32,
    /// Whether to emit periodic audio-level telemetry.
    pub emit_audio_level: bool,
    /// Interval between audio-level events in milliseconds.
    pub audio_level_interval_ms: u32,
    /// Whether to request platform voice processing on the input.
    pub voice_processing: bool,
    /// Preferred input device id, recorded for the session-config layer.
    pub preferred_input: Option<String>,
    /// Output routing choice.
    pub output_route: OutputRoute,
}

impl CaptureOptions {
    /// Creates options with defaults for everything beyond profile, mode,
    /// and streams.
    pub fn new(profile: MicProfile, mode: SessionMode, output_streams: Vec<OutputStream>) -> Self {
        Self {
            profile,
            mode,
            output_streams,
            chunk_ms: DEFAULT_CHUNK_MS,
            emit_audio_level: false,
            audio_level_interval_ms: DEFAULT_AUDIO_LEVEL_INTERVAL_MS,
            voice_processing: false,
            preferred_input: None,
            output_route: OutputRoute::System,
        }
    }
}
