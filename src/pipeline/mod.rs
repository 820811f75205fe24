//! Per-stream processing: chunk assembly, resampling, and level metering.

pub mod chunk_buffer;
pub mod level;
pub mod stream;
