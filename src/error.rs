//! Error types for mic-capture.
//!
//! Every error carries an [`ErrorCode`] from a closed taxonomy plus a
//! `recoverable` flag: recoverable errors leave the session viable (the
//! caller may retry), non-recoverable errors mean the session was torn
//! down. Synchronous command failures are returned to the caller; failures
//! detected on the ingestion thread are surfaced as emitted error events.

use serde::Serialize;

/// Closed error taxonomy with explicit wire encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    /// Microphone permission was denied.
    #[serde(rename = "E_PERMISSION_DENIED")]
    PermissionDenied,
    /// Microphone access is restricted by policy.
    #[serde(rename = "E_PERMISSION_RESTRICTED")]
    PermissionRestricted,
    /// A capture session is already active.
    #[serde(rename = "E_ALREADY_RUNNING")]
    AlreadyRunning,
    /// No active session matches the request.
    #[serde(rename = "E_NOT_RUNNING")]
    NotRunning,
    /// The platform audio session could not be configured.
    #[serde(rename = "E_AUDIO_SESSION_CONFIG")]
    SessionConfigFailed,
    /// The capture engine failed to start.
    #[serde(rename = "E_ENGINE_START_FAILED")]
    EngineStartFailed,
    /// The capture engine failed to stop cleanly.
    #[serde(rename = "E_ENGINE_STOP_FAILED")]
    EngineStopFailed,
    /// Sample conversion failed.
    #[serde(rename = "E_CONVERTER_FAILED")]
    ConverterFailed,
    /// A route or input change could not be applied.
    #[serde(rename = "E_ROUTE_CHANGE_FAILED")]
    RouteChangeFailed,
    /// The audio session was interrupted.
    #[serde(rename = "E_INTERRUPTED")]
    Interrupted,
    /// The audio device or media services were reset.
    #[serde(rename = "E_DEVICE_RESET")]
    DeviceReset,
    /// Unexpected internal failure.
    #[serde(rename = "E_INTERNAL")]
    Internal,
}

impl ErrorCode {
    /// Returns the wire encoding of this code.
    #[must_use]
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "E_PERMISSION_DENIED",
            Self::PermissionRestricted => "E_PERMISSION_RESTRICTED",
            Self::AlreadyRunning => "E_ALREADY_RUNNING",
            Self::NotRunning => "E_NOT_RUNNING",
            Self::SessionConfigFailed => "E_AUDIO_SESSION_CONFIG",
            Self::EngineStartFailed => "E_ENGINE_START_FAILED",
            Self::EngineStopFailed => "E_ENGINE_STOP_FAILED",
            Self::ConverterFailed => "E_CONVERTER_FAILED",
            Self::RouteChangeFailed => "E_ROUTE_CHANGE_FAILED",
            Self::Interrupted => "E_INTERRUPTED",
            Self::DeviceReset => "E_DEVICE_RESET",
            Self::Internal => "E_INTERNAL",
        }
    }

    /// Parses a wire value. Unknown values return `None`.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "E_PERMISSION_DENIED" => Some(Self::PermissionDenied),
            "E_PERMISSION_RESTRICTED" => Some(Self::PermissionRestricted),
            "E_ALREADY_RUNNING" => Some(Self::AlreadyRunning),
            "E_NOT_RUNNING" => Some(Self::NotRunning),
            "E_AUDIO_SESSION_CONFIG" => Some(Self::SessionConfigFailed),
            "E_ENGINE_START_FAILED" => Some(Self::EngineStartFailed),
            "E_ENGINE_STOP_FAILED" => Some(Self::EngineStopFailed),
            "E_CONVERTER_FAILED" => Some(Self::ConverterFailed),
            "E_ROUTE_CHANGE_FAILED" => Some(Self::RouteChangeFailed),
            "E_INTERRUPTED" => Some(Self::Interrupted),
            "E_DEVICE_RESET" => Some(Self::DeviceReset),
            "E_INTERNAL" => Some(Self::Internal),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// A capture failure: taxonomy code, human-readable message, and whether
/// the session survived.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct CaptureError {
    /// Taxonomy code for this failure.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// `true` when the session is still viable and the caller may retry.
    pub recoverable: bool,
    /// Platform-specific detail, when a native layer supplied one.
    pub native_detail: Option<String>,
}

impl CaptureError {
    /// Creates an error with the given code, message, and recoverability.
    pub fn new(code: ErrorCode, message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            code,
            message: message.into(),
            recoverable,
            native_detail: None,
        }
    }

    /// Attaches a platform-specific detail string.
    #[must_use]
    pub fn with_native_detail(mut self, detail: impl Into<String>) -> Self {
        self.native_detail = Some(detail.into());
        self
    }

    /// A capture session is already active.
    pub fn already_running() -> Self {
        Self::new(ErrorCode::AlreadyRunning, "Capture is already running.", false)
    }

    /// No active session matches the given id.
    pub fn not_running(session_id: &str) -> Self {
        Self::new(
            ErrorCode::NotRunning,
            format!("No active capture matches {session_id}."),
            false,
        )
    }

    /// Invalid request or unexpected internal failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message, false)
    }

    /// The platform audio session could not be configured.
    pub fn session_config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SessionConfigFailed, message, false)
    }

    /// The capture engine failed to start.
    pub fn engine_start(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EngineStartFailed, message, false)
    }

    /// A route or input change could not be applied.
    pub fn route_change(message: impl Into<String>, recoverable: bool) -> Self {
        Self::new(ErrorCode::RouteChangeFailed, message, recoverable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CaptureError::not_running("abc-123");
        assert_eq!(err.to_string(), "E_NOT_RUNNING: No active capture matches abc-123.");
    }

    #[test]
    fn test_code_wire_round_trip() {
        let codes = [
            ErrorCode::PermissionDenied,
            ErrorCode::PermissionRestricted,
            ErrorCode::AlreadyRunning,
            ErrorCode::NotRunning,
            ErrorCode::SessionConfigFailed,
            ErrorCode::EngineStartFailed,
            ErrorCode::EngineStopFailed,
            ErrorCode::ConverterFailed,
            ErrorCode::RouteChangeFailed,
            ErrorCode::Interrupted,
            ErrorCode::DeviceReset,
            ErrorCode::Internal,
        ];
        for code in codes {
            assert_eq!(ErrorCode::from_wire(code.as_wire()), Some(code));
        }
        assert_eq!(ErrorCode::from_wire("E_UNKNOWN"), None);
    }

    #[test]
    fn test_recoverable_flag() {
        assert!(!CaptureError::already_running().recoverable);
        assert!(CaptureError::route_change("busy", true).recoverable);
    }

    #[test]
    fn test_native_detail() {
        let err = CaptureError::engine_start("boom").with_native_detail("-10851");
        assert_eq!(err.native_detail.as_deref(), Some("-10851"));
    }

    #[test]
    fn test_code_serde_encoding() {
        let json = serde_json::to_string(&ErrorCode::DeviceReset).unwrap();
        assert_eq!(json, "\"E_DEVICE_RESET\"");
    }
}
