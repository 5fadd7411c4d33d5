//! Counter register helpers
//!
//! Counters count upward and raise overflow when they wrap, so a sampling
//! interval of `n` events is armed by loading `-n`.

/// Value that makes the counter roll over after exactly `count` events
pub const fn preload_value(count: u64) -> u64 {
    count.wrapping_neg()
}

/// A preloaded counter keeps bit 31 set until it rolls over. Hardware
/// sometimes wraps without raising the CCCR overflow flag, so a clear bit 31
/// is treated as an overflow too.
pub const fn counter_overflowed(value: u64) -> bool {
    value & 0x8000_0000 == 0
}
