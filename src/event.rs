//! Events emitted by the capture controller.
//!
//! All asynchronous output leaves the crate through a single
//! [`EventCallback`]. The callback is invoked from the ingestion thread and
//! from command paths; it must be fast and must not call back into the
//! controller.

use std::sync::Arc;

use serde::Serialize;

use crate::chunk::PcmChunk;
use crate::config::CaptureState;
use crate::error::ErrorCode;
use crate::session::SessionId;

/// Periodic loudness telemetry for the active session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioLevel {
    /// Session the measurement belongs to.
    pub session_id: SessionId,
    /// Root-mean-square amplitude over the window, in [0, 1].
    pub rms: f64,
    /// Peak absolute amplitude over the window, in [0, 1].
    pub peak: f32,
    /// RMS in decibels relative to full scale, clamped to [-90, 0].
    pub dbfs: f64,
    /// Simple voice-activity flag: `dbfs > -45`.
    pub vad: bool,
    /// Timestamp of the measurement in milliseconds.
    pub pts_ms: u64,
}

/// Phase of an audio-session interruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptionPhase {
    /// The interruption started; capture is paused.
    Began,
    /// The interruption ended.
    Ended,
}

/// Error surfaced asynchronously through the event callback.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    /// Taxonomy code for the failure.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// `true` when the session is still viable.
    pub recoverable: bool,
    /// Session the failure relates to, when one exists.
    pub session_id: Option<SessionId>,
    /// Platform-specific detail, when a native layer supplied one.
    pub native_detail: Option<String>,
}

/// Everything the controller can emit.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CaptureEvent {
    /// A block of encoded PCM for one output stream.
    PcmChunk(PcmChunk),
    /// Periodic loudness telemetry.
    AudioLevel(AudioLevel),
    /// The controller lifecycle state changed.
    StateChanged {
        /// New state.
        state: CaptureState,
        /// What caused the transition, e.g. `"start_capture"`.
        reason: String,
        /// Session involved, when one exists.
        session_id: Option<SessionId>,
    },
    /// The audio route or selected input changed.
    RouteChanged {
        /// What caused the change, e.g. `"new_device_available"`.
        reason: String,
        /// Session involved, when one exists.
        session_id: Option<SessionId>,
        /// Id of the input now selected, when known.
        selected_input_id: Option<String>,
    },
    /// An audio-session interruption began or ended.
    Interruption {
        /// Session involved, when one exists.
        session_id: Option<SessionId>,
        /// Which phase of the interruption this is.
        phase: InterruptionPhase,
        /// On `Ended`, whether the platform suggests resuming.
        should_resume: Option<bool>,
    },
    /// An asynchronous failure.
    Error(ErrorEvent),
}

/// Callback invoked for every emitted event.
pub type EventCallback = Arc<dyn Fn(CaptureEvent) + Send + Sync>;

/// Wraps a closure as an [`EventCallback`].
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(CaptureEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_changed_serialization() {
        let event = CaptureEvent::StateChanged {
            state: CaptureState::Running,
            reason: "start_capture".to_string(),
            session_id: Some(SessionId::new("s1")),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "state_changed");
        assert_eq!(json["state"], "running");
        assert_eq!(json["reason"], "start_capture");
    }

    #[test]
    fn test_error_event_serialization() {
        let event = CaptureEvent::Error(ErrorEvent {
            code: ErrorCode::DeviceReset,
            message: "Audio device was reset.".to_string(),
            recoverable: true,
            session_id: None,
            native_detail: None,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["code"], "E_DEVICE_RESET");
        assert_eq!(json["recoverable"], true);
    }

    #[test]
    fn test_callback_invocation() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let callback = event_callback(move |_event| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        callback(CaptureEvent::Interruption {
            session_id: None,
            phase: InterruptionPhase::Began,
            should_resume: None,
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
