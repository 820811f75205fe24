//! PCM chunk payloads emitted on the event callback.

use std::sync::Arc;

use serde::Serialize;

use crate::config::OutputStream;
use crate::session::SessionId;

/// One fixed-duration block of mono PCM16 audio for a single stream.
///
/// The payload is shared via `Arc` so fan-out to multiple consumers never
/// copies sample data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PcmChunk {
    /// Session this chunk belongs to.
    pub session_id: SessionId,
    /// Stream this chunk belongs to.
    pub stream: OutputStream,
    /// Sample rate of the payload in Hz.
    pub sample_rate: u32,
    /// Channel count. Always 1.
    pub channels: u16,
    /// Number of frames in the payload.
    pub frames: u32,
    /// Per-stream sequence number, starting at 0.
    pub seq: u64,
    /// Presentation timestamp of the first frame, in milliseconds.
    pub pts_ms: u64,
    /// Little-endian signed 16-bit PCM bytes, `frames * 2` long.
    pub payload: Arc<Vec<u8>>,
    /// `true` only on the last chunk of a stream at stop time.
    pub is_final: bool,
}

impl PcmChunk {
    /// Returns the chunk duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        u64::from(self.frames) * 1_000 / u64::from(self.sample_rate)
    }

    /// Decodes the payload back into samples.
    #[must_use]
    pub fn samples(&self) -> Vec<i16> {
        self.payload
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(frames: u32, sample_rate: u32, payload: Vec<u8>) -> PcmChunk {
        PcmChunk {
            session_id: SessionId::new("s1"),
            stream: OutputStream::Pcm16k,
            sample_rate,
            channels: 1,
            frames,
            seq: 0,
            pts_ms: 0,
            payload: Arc::new(payload),
            is_final: false,
        }
    }

    #[test]
    fn test_duration() {
        assert_eq!(chunk(320, 16_000, vec![0; 640]).duration_ms(), 20);
        assert_eq!(chunk(960, 48_000, vec![0; 1_920]).duration_ms(), 20);
    }

    #[test]
    fn test_samples_decode_little_endian() {
        let c = chunk(2, 16_000, vec![0x01, 0x00, 0xFF, 0x7F]);
        assert_eq!(c.samples(), vec![1, i16::MAX]);
    }

    #[test]
    fn test_serialization_shape() {
        let json = serde_json::to_value(chunk(1, 16_000, vec![0x00, 0x80])).unwrap();
        assert_eq!(json["stream"], "pcm16k_s16le");
        assert_eq!(json["sampleRate"], 16_000);
        assert_eq!(json["isFinal"], false);
    }
}
