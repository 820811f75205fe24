//! Windowed loudness metering over the input stream.

/// dBFS floor reported for silence and clamp lower bound.
const DBFS_FLOOR: f64 = -90.0;

/// Voice-activity threshold in dBFS.
const VAD_THRESHOLD_DBFS: f64 = -45.0;

/// One completed measurement window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelReading {
    /// Root-mean-square amplitude over the window, in [0, 1].
    pub rms: f64,
    /// Peak absolute amplitude over the window, in [0, 1].
    pub peak: f32,
    /// RMS in decibels relative to full scale, clamped to [-90, 0].
    pub dbfs: f64,
    /// Whether the window exceeds the voice-activity threshold.
    pub vad: bool,
}

/// Accumulates float samples and yields a [`LevelReading`] once per
/// fixed-size window of frames.
#[derive(Debug)]
pub struct LevelMeter {
    interval_frames: u64,
    sum_squares: f64,
    peak: f32,
    frames: u64,
}

impl LevelMeter {
    /// Creates a meter that completes a window every `interval_frames`
    /// frames. Intervals below one frame are raised to one.
    #[must_use]
    pub fn new(interval_frames: u64) -> Self {
        Self {
            interval_frames: interval_frames.max(1),
            sum_squares: 0.0,
            peak: 0.0,
            frames: 0,
        }
    }

    /// Folds a block of samples into the current window. Returns a reading
    /// when the window completes, resetting for the next one.
    pub fn accumulate(&mut self, samples: &[f32]) -> Option<LevelReading> {
        for &sample in samples {
            self.sum_squares += f64::from(sample) * f64::from(sample);
            let magnitude = sample.abs();
            if magnitude > self.peak {
                self.peak = magnitude;
            }
        }
        self.frames += samples.len() as u64;
        if self.frames < self.interval_frames {
            return None;
        }
        let rms = (self.sum_squares / self.frames as f64).sqrt();
        let dbfs = if rms > 0.0 {
            (20.0 * rms.log10()).clamp(DBFS_FLOOR, 0.0)
        } else {
            DBFS_FLOOR
        };
        let reading = LevelReading {
            rms,
            peak: self.peak,
            dbfs,
            vad: dbfs > VAD_THRESHOLD_DBFS,
        };
        self.sum_squares = 0.0;
        self.peak = 0.0;
        self.frames = 0;
        Some(reading)
    }
}
