//! One output stream: resampler, chunk assembly, and sequencing.

use crate::config::OutputStream;
use crate::format::convert::f32_slice_to_i16;
use crate::format::resample::LinearResampler;
use crate::pipeline::chunk_buffer::ChunkBuffer;

/// Per-stream state for converting input blocks into sequenced chunks.
///
/// Owns the resampler and pending-sample buffer for a single
/// [`OutputStream`]. Sequence numbers and emitted-frame totals advance only
/// through [`StreamPipeline::next_chunk_meta`], so presentation timestamps
/// stay derived from emitted frames rather than wall-clock time.
#[derive(Debug)]
pub struct StreamPipeline {
    stream: OutputStream,
    sample_rate: u32,
    chunk_frames: usize,
    resampler: LinearResampler,
    pending: ChunkBuffer,
    seq: u64,
    emitted_frames: u64,
}

impl StreamPipeline {
    /// Creates the pipeline for one stream given the input rate and chunk
    /// duration.
    #[must_use]
    pub fn new(stream: OutputStream, input_rate: u32, chunk_ms: u32) -> Self {
        let sample_rate = stream.sample_rate();
        Self {
            stream,
            sample_rate,
            chunk_frames: (sample_rate * chunk_ms / 1_000) as usize,
            resampler: LinearResampler::new(input_rate, sample_rate),
            pending: ChunkBuffer::new(),
            seq: 0,
            emitted_frames: 0,
        }
    }

    /// Resamples an input block and encodes the yield as PCM16.
    pub fn convert(&mut self, input: &[f32]) -> Vec<i16> {
        f32_slice_to_i16(&self.resampler.process(input))
    }

    /// Drains the resampler tail at end of stream.
    pub fn flush(&mut self) -> Vec<i16> {
        f32_slice_to_i16(&self.resampler.flush())
    }

    /// Queues converted samples for chunk assembly.
    pub fn append(&mut self, samples: &[i16]) {
        self.pending.append(samples);
    }

    /// Pops the next full chunk of samples, if one is ready.
    pub fn pop_chunk(&mut self) -> Option<Vec<i16>> {
        self.pending.pop_chunk(self.chunk_frames)
    }

    /// Pops whatever remains as a zero-padded terminal chunk, if anything
    /// is pending.
    pub fn pop_final_chunk(&mut self) -> Option<Vec<i16>> {
        self.pending.pop_final_chunk(self.chunk_frames)
    }

    /// Claims sequencing metadata for a chunk of `frames` frames: returns
    /// `(seq, pts_offset_ms)` and advances both counters.
    pub fn next_chunk_meta(&mut self, frames: u64) -> (u64, u64) {
        let seq = self.seq;
        let pts_offset_ms = self.emitted_frames * 1_000 / u64::from(self.sample_rate);
        self.seq += 1;
        self.emitted_frames += frames;
        (seq, pts_offset_ms)
    }

    /// The stream this pipeline produces.
    #[must_use]
    pub fn stream(&self) -> OutputStream {
        self.stream
    }

    /// Output sample rate in Hz.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames per chunk at the configured chunk duration.
    #[must_use]
    pub fn chunk_frames(&self) -> usize {
        self.chunk_frames
    }

    /// Total frames emitted so far.
    #[must_use]
    pub fn emitted_frames(&self) -> u64 {
        self.emitted_frames
    }
}
