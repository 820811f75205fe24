//! Real-time microphone capture with multi-rate PCM16 fan-out.
//!
//! A [`CaptureController`] runs at most one capture session at a time. The
//! session reads mono PCM from an [`AudioInput`](source::AudioInput) on a
//! dedicated thread, resamples it to each requested
//! [`OutputStream`](config::OutputStream), and emits fixed 20 ms chunks
//! plus optional loudness telemetry through a single event callback.
//!
//! Platform concerns sit behind two seams: [`AudioInputDriver`](source::AudioInputDriver)
//! opens devices and [`SessionConfig`](source::SessionConfig) applies
//! audio-session policy. The [`source::mock`] module implements both
//! without hardware, so the full pipeline is testable anywhere.
//!
//! ```no_run
//! use std::sync::Arc;
//! use mic_capture::{
//!     event_callback, CaptureController, CaptureEvent, CaptureOptions, MicProfile,
//!     OutputStream, SessionMode,
//! };
//! use mic_capture::source::mock::MockDriver;
//!
//! let (driver, mut feed) = MockDriver::new(48_000);
//! let controller = CaptureController::builder(driver)
//!     .on_event(event_callback(|event| {
//!         if let CaptureEvent::PcmChunk(chunk) = event {
//!             println!("{} seq={} {} bytes", chunk.stream.as_wire(), chunk.seq, chunk.payload.len());
//!         }
//!     }))
//!     .build();
//!
//! let options = CaptureOptions::new(
//!     MicProfile::Pipecat,
//!     SessionMode::VoiceChat,
//!     vec![OutputStream::Pcm16k, OutputStream::Pcm48k],
//! );
//! let outcome = controller.start(options).unwrap();
//! feed.push_sine(440.0, 100);
//! controller.stop(&outcome.session_id, None).unwrap();
//! ```

#![warn(missing_docs)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

pub mod chunk;
pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod format;
pub mod pipeline;
pub mod session;
pub mod source;

pub use chunk::PcmChunk;
pub use config::{
    CaptureOptions, CaptureState, MicProfile, OutputRoute, OutputStream, SessionMode,
    DEFAULT_AUDIO_LEVEL_INTERVAL_MS, DEFAULT_CHUNK_MS, DEFAULT_FLUSH_TIMEOUT_MS,
};
pub use controller::{CaptureController, CaptureControllerBuilder};
pub use error::{CaptureError, ErrorCode};
pub use event::{event_callback, AudioLevel, CaptureEvent, ErrorEvent, EventCallback, InterruptionPhase};
pub use session::{Diagnostics, SessionId, StartOutcome, StopOutcome, StreamTotals};
