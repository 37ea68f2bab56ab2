//! Lock-free holder for the current usage estimate.

use std::sync::atomic::{AtomicI64, Ordering};

/// Raw value meaning "no measurement has happened yet".
pub const UNKNOWN: i64 = -1;

/// Thread-safe byte counter shared between callers and the refresh worker.
///
/// The internal value may be negative (the [`UNKNOWN`] sentinel, or a
/// transient result of negative increments); reads through [`get`] always
/// clamp at zero.
///
/// [`get`]: UsageCell::get
#[derive(Debug)]
pub struct UsageCell {
    used: AtomicI64,
}

impl UsageCell {
    /// Create a cell holding `bytes`.
    pub fn new(bytes: u64) -> Self {
        Self {
            used: AtomicI64::new(clamp_to_i64(bytes)),
        }
    }

    /// Create a cell holding the "not yet measured" sentinel.
    pub fn unknown() -> Self {
        Self {
            used: AtomicI64::new(UNKNOWN),
        }
    }

    /// Current estimate in bytes, never negative.
    pub fn get(&self) -> u64 {
        self.raw().max(0) as u64
    }

    /// Overwrite the estimate. Called by probes after a full measurement.
    pub fn set(&self, bytes: u64) {
        self.used.store(clamp_to_i64(bytes), Ordering::Release);
    }

    /// Add `delta` bytes (may be negative) and return the new raw value.
    pub fn increment(&self, delta: i64) -> i64 {
        self.used.fetch_add(delta, Ordering::AcqRel).wrapping_add(delta)
    }

    /// Whether the internal value is negative (unmeasured or driven below
    /// zero by increments).
    pub fn is_unknown(&self) -> bool {
        self.raw() < 0
    }

    /// Restore the "not yet measured" sentinel.
    pub(crate) fn mark_unknown(&self) {
        self.used.store(UNKNOWN, Ordering::Release);
    }

    /// The unclamped internal value.
    pub(crate) fn raw(&self) -> i64 {
        self.used.load(Ordering::Acquire)
    }
}

impl Default for UsageCell {
    fn default() -> Self {
        Self::unknown()
    }
}

fn clamp_to_i64(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn unknown_reads_as_zero() {
        let cell = UsageCell::unknown();
        assert!(cell.is_unknown());
        assert_eq!(cell.get(), 0);
    }

    #[test]
    fn set_overwrites() {
        let cell = UsageCell::new(10);
        cell.set(4096);
        assert_eq!(cell.get(), 4096);
        assert!(!cell.is_unknown());
    }

    #[test]
    fn increment_returns_new_value() {
        let cell = UsageCell::new(100);
        assert_eq!(cell.increment(50), 150);
        assert_eq!(cell.increment(-30), 120);
        assert_eq!(cell.get(), 120);
    }

    #[test]
    fn negative_total_clamps_to_zero() {
        let cell = UsageCell::new(10);
        cell.increment(-25);
        assert_eq!(cell.raw(), -15);
        assert_eq!(cell.get(), 0);
        assert!(cell.is_unknown());
    }

    #[test]
    fn set_saturates_above_i64_max() {
        let cell = UsageCell::new(0);
        cell.set(u64::MAX);
        assert_eq!(cell.get(), i64::MAX as u64);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let cell = Arc::new(UsageCell::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        cell.increment(3);
                        // Readers never observe a negative or torn value.
                        assert_eq!(cell.get() % 3, 0);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cell.get(), 8 * 1000 * 3);
    }
}
