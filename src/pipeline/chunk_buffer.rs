//! Sample accumulator that releases fixed-size chunks.

use std::collections::VecDeque;

/// Buffers PCM16 samples and yields them in exact fixed-size chunks.
///
/// Samples accumulate across appends of arbitrary size; `pop_chunk` only
/// fires once a full chunk is available, so emitted chunks are always the
/// same length regardless of the producer's block size.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    samples: VecDeque<i16>,
}

impl ChunkBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends samples to the tail of the buffer.
    pub fn append(&mut self, samples: &[i16]) {
        self.samples.extend(samples.iter().copied());
    }

    /// Removes and returns exactly `chunk_len` samples, or `None` when
    /// fewer are buffered.
    pub fn pop_chunk(&mut self, chunk_len: usize) -> Option<Vec<i16>> {
        if self.samples.len() < chunk_len {
            return None;
        }
        Some(self.samples.drain(..chunk_len).collect())
    }

    /// Drains whatever remains as one final chunk, zero-padded up to
    /// `chunk_len`. Returns `None` when the buffer is empty.
    pub fn pop_final_chunk(&mut self, chunk_len: usize) -> Option<Vec<i16>> {
        if self.samples.is_empty() {
            return None;
        }
        let mut chunk: Vec<i16> = self.samples.drain(..).collect();
        chunk.resize(chunk_len, 0);
        Some(chunk)
    }

    /// Number of buffered samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Discards all buffered samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
