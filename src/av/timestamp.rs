//! Raw 90 kHz timestamp to microsecond conversion with counter rollover tracking.

/// Modulus of the tracked counter.
pub const WRAP_LEN: u64 = 1 << 32;

/// Converts microseconds back to the number of counter rollovers already
/// elapsed at that point of the timeline.
pub fn wrap_count_at(time_us: u64) -> u32 {
    let ticks = (time_us / 100) * 9;
    (ticks >> 32) as u32
}

/// Converts 90 kHz ticks to microseconds, rounding half up.
pub fn ticks_to_us(ticks: u64) -> u64 {
    ((ticks as u128 * 100 + 4) / 9) as u64
}

/// Rollover memory of the timestamp normalizer.
///
/// Each track owns exactly one. Seeking calls [`RolloverState::resync`] so the
/// first timestamp read after the jump is taken at face value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolloverState {
    last_value: Option<u64>,
    wrap_count: u32,
    base_offset: u64,
}

impl RolloverState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state whose timeline starts at `base_offset` raw ticks.
    pub fn with_offset(base_offset: u64) -> Self {
        Self {
            base_offset,
            ..Default::default()
        }
    }

    pub fn last_value(&self) -> Option<u64> {
        self.last_value
    }

    pub fn wrap_count(&self) -> u32 {
        self.wrap_count
    }

    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    pub fn set_base_offset(&mut self, base_offset: u64) {
        self.base_offset = base_offset;
    }

    /// Forgets everything but the calibration offset.
    pub fn reset(&mut self) {
        self.last_value = None;
        self.wrap_count = 0;
    }

    /// Drops the last seen value; `Some(n)` also restores the wrap count.
    pub fn resync(&mut self, wrap_count: Option<u32>) {
        self.last_value = None;
        if let Some(n) = wrap_count {
            self.wrap_count = n;
        }
    }

    /// Turns a raw counter value into a monotonic microsecond timestamp.
    ///
    /// Consecutive values more than half the counter range apart are read as
    /// a rollover: forward when the value dropped, undone when it jumped up
    /// while a rollover is pending.
    pub fn normalize(&mut self, raw: Option<u64>) -> Option<u64> {
        // Distance from the offset on the counter circle; PES values carry 33
        // bits so either side may sit above the modulus
        let x = raw?.wrapping_sub(self.base_offset) & (WRAP_LEN - 1);

        if let Some(last) = self.last_value {
            if last > x && last - x >= WRAP_LEN / 2 {
                self.wrap_count += 1;
            }
            if self.wrap_count > 0 && x > last && x - last > WRAP_LEN / 2 {
                self.wrap_count -= 1;
            }
        }
        self.last_value = Some(x);

        let x = x + WRAP_LEN * self.wrap_count as u64;
        Some(ticks_to_us(x))
    }
}
