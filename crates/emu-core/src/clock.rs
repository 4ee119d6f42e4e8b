//! Master clock configuration.

use std::time::Duration;

/// CPU clock frequency of a machine.
///
/// Only drivers use this, to pace frame execution against wall-clock time.
/// The engine itself counts tacts and never looks at real time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterClock {
    /// CPU frequency in Hz (e.g. `3_500_000` for a 48K Spectrum).
    pub frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Wall-clock time taken by `tacts` clock cycles.
    #[must_use]
    pub fn duration_of(&self, tacts: u64) -> Duration {
        if self.frequency_hz == 0 {
            return Duration::ZERO;
        }
        let nanos = u128::from(tacts) * 1_000_000_000 / u128::from(self.frequency_hz);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Frames per second for a frame of `frame_tacts` clock cycles.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn frame_rate(&self, frame_tacts: u64) -> f64 {
        if frame_tacts == 0 {
            return 0.0;
        }
        self.frequency_hz as f64 / frame_tacts as f64
    }
}
