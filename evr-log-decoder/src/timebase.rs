//! Tick → seconds conversion
//!
//! The recorder timestamps every record with raw timer ticks. The tick
//! frequency is announced in-band by `EventRecorderInitialize` (0xFF00,
//! frequency in value2) and `EventRecorderClock` (0xFF03, frequency in
//! value1). Each announcement folds the time elapsed since the previous
//! mark into an accumulated offset, so later timestamps stay continuous.
//!
//! One time base lives for a whole pipeline run. A new pass calls
//! [`TimeBase::restart`], which rewinds the mark and offset but keeps the
//! last calibrated scale.

use crate::types::{RawRecord, ID_CLOCK, ID_INITIALIZE};

/// Tick period used until the stream announces a frequency (40 ns)
pub const DEFAULT_TICK_PERIOD: f64 = 4e-8;

/// Time base of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeBase {
    scale: f64,
    last_mark_ticks: u64,
    accumulated_offset: f64,
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeBase {
    pub fn new() -> Self {
        Self {
            scale: DEFAULT_TICK_PERIOD,
            last_mark_ticks: 0,
            accumulated_offset: 0.0,
        }
    }

    /// Builder method: seconds per tick before any calibration record
    pub fn with_tick_period(mut self, seconds: f64) -> Self {
        self.scale = seconds;
        self
    }

    /// Rewind to the start of the stream for another pass
    ///
    /// The scale is kept, so records before the first calibration mark use
    /// the frequency calibrated by the previous pass.
    pub fn restart(&mut self) {
        self.last_mark_ticks = 0;
        self.accumulated_offset = 0.0;
    }

    /// Seconds per tick currently in effect
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Apply `record` if it is a calibration record
    ///
    /// Returns true if the time base changed.
    pub fn observe(&mut self, record: &RawRecord) -> bool {
        let frequency = match record.id {
            ID_INITIALIZE => record.value(1),
            ID_CLOCK => record.value(0),
            _ => None,
        };

        match frequency.map(|f| f as u32) {
            Some(frequency) if frequency != 0 => {
                self.recalibrate(record.ticks, frequency);
                true
            }
            _ => false,
        }
    }

    /// Switch to `frequency` Hz at `ticks`
    pub fn recalibrate(&mut self, ticks: u64, frequency: u32) {
        self.accumulated_offset = self.seconds(ticks);
        self.last_mark_ticks = ticks;
        self.scale = 1.0 / frequency as f64;
        log::debug!(
            "Time base recalibrated at tick {}: {} Hz, offset {:.8}s",
            ticks,
            frequency,
            self.accumulated_offset
        );
    }

    /// Convert raw ticks to seconds since the start of the trace
    pub fn seconds(&self, ticks: u64) -> f64 {
        let elapsed = ticks as i128 - self.last_mark_ticks as i128;
        self.accumulated_offset + elapsed as f64 * self.scale
    }
}
