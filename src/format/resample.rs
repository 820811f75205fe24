//! Streaming linear-interpolation resampler.
//!
//! Operates on mono float samples across successive blocks. Sample indices
//! are tracked in absolute input-stream positions so interpolation is
//! seamless across block boundaries: the last sample of each block is held
//! over and paired with the first sample of the next.
//!
//! Because the right-hand interpolation neighbor must exist, the resampler
//! cannot emit an output that lands exactly on the final input sample until
//! the next block arrives. [`LinearResampler::flush`] drains that remainder
//! at end of stream by repeating the held sample.

/// Converts a stream of mono samples from one fixed rate to another.
#[derive(Debug)]
pub struct LinearResampler {
    /// Input positions advanced per output sample.
    step: f64,
    /// Absolute input position of the next output sample.
    next_input_index: f64,
    /// Absolute input position of the first sample of the current block.
    chunk_start_index: f64,
    last_sample: f32,
    has_last_sample: bool,
}

impl LinearResampler {
    /// Creates a resampler converting `input_rate` Hz to `output_rate` Hz.
    #[must_use]
    pub fn new(input_rate: u32, output_rate: u32) -> Self {
        Self {
            step: f64::from(input_rate) / f64::from(output_rate),
            next_input_index: 0.0,
            chunk_start_index: 0.0,
            last_sample: 0.0,
            has_last_sample: false,
        }
    }

    /// Resamples one block of input, returning the output samples it yields.
    ///
    /// An empty block is a strict no-op: no state advances.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if input.is_empty() {
            return Vec::new();
        }
        let chunk_end = self.chunk_start_index + input.len() as f64 - 1.0;
        let mut output = Vec::with_capacity((input.len() as f64 / self.step).ceil() as usize + 1);
        while self.next_input_index <= chunk_end {
            let base = self.next_input_index.floor();
            let frac = self.next_input_index - base;
            let sample_a = if base < self.chunk_start_index {
                if !self.has_last_sample {
                    break;
                }
                self.last_sample
            } else {
                input[(base - self.chunk_start_index) as usize]
            };
            // The right-hand neighbor is in the next block; stop here and
            // pick this position up on the following call or at flush.
            if base + 1.0 > chunk_end {
                break;
            }
            let sample_b = input[(base + 1.0 - self.chunk_start_index) as usize];
            let value = f64::from(sample_a) + (f64::from(sample_b) - f64::from(sample_a)) * frac;
            output.push(value as f32);
            self.next_input_index += self.step;
        }
        self.chunk_start_index += input.len() as f64;
        self.last_sample = input[input.len() - 1];
        self.has_last_sample = true;
        output
    }

    /// Drains output positions at or before the final input sample by
    /// repeating the held last sample. Call once at end of stream.
    pub fn flush(&mut self) -> Vec<f32> {
        let mut output = Vec::new();
        if !self.has_last_sample {
            return output;
        }
        let last_index = self.chunk_start_index - 1.0;
        while self.next_input_index <= last_index {
            output.push(self.last_sample);
            self.next_input_index += self.step;
        }
        output
    }
}
