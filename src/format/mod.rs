//! Sample format conversion and sample-rate conversion.

pub mod convert;
pub mod resample;
