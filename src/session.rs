//! Session identity, command outcomes, and diagnostics.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::config::{CaptureState, OutputRoute, OutputStream};

/// Opaque identifier for one capture session.
///
/// Generated at session start and required for every session-scoped
/// command. Uses `Arc<str>` internally so cloning is an Arc pointer copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(Arc<str>);

impl SessionId {
    /// Creates a session id from an existing string.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random session id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string().into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Result of a successful `start` command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOutcome {
    /// Id of the newly created session.
    pub session_id: SessionId,
    /// Sample rate the input device actually opened at.
    pub actual_input_rate: u32,
    /// Channel count the input device actually opened at.
    pub actual_input_channels: u16,
    /// Chunk duration in effect for the session.
    pub chunk_ms: u32,
}

/// Cumulative frame total for one output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamTotals {
    /// The stream these frames belong to.
    pub stream: OutputStream,
    /// Total frames emitted on the stream.
    pub frames: u64,
}

/// Result of a successful `stop` command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopOutcome {
    /// Id of the stopped session.
    pub session_id: SessionId,
    /// Total input frames ingested over the session lifetime.
    pub total_frames_in: u64,
    /// Per-stream emitted frame totals, in stream registration order.
    pub frames_out: Vec<StreamTotals>,
    /// Wall-clock session duration in milliseconds.
    pub duration_ms: u64,
}

/// Point-in-time controller snapshot returned by `diagnostics`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    /// Current lifecycle state.
    pub state: CaptureState,
    /// Active session id, when one exists.
    pub session_id: Option<SessionId>,
    /// Whether the microphone is currently unmuted.
    pub mic_enabled: bool,
    /// Currently selected output route.
    pub output_route: OutputRoute,
    /// Preferred input device id, when one has been set.
    pub preferred_input: Option<String>,
    /// Sample rate of the open input device (0 when idle).
    pub actual_input_rate: u32,
    /// Channel count of the open input device (0 when idle).
    pub actual_input_channels: u16,
    /// Total input frames ingested by the active session.
    pub total_frames_in: u64,
    /// Per-stream emitted frame totals for the active session.
    pub frames_out: Vec<StreamTotals>,
    /// Input frames read but discarded, e.g. while paused.
    pub dropped_input_frames: u64,
    /// Number of device-loss resets observed.
    pub device_reset_count: u32,
    /// Reason string from the most recent route change.
    pub last_route_change_reason: String,
}
