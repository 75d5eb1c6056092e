use std::sync::Mutex;

use keepsake_types::wall_clock_ms;

/// Monotonic millisecond clock for asset version timestamps.
///
/// Version keys embed wall-clock milliseconds, but two uploads in the same
/// millisecond (or a clock stepping backwards) must still produce distinct,
/// increasing keys.
///
/// # Rules
///
/// - `tick = max(wall_clock, last + 1, floor + 1)`
/// - `floor` is the current pointer read from the store, so a version written
///   by another context with a later clock is still superseded.
pub struct VersionClock {
    last: Mutex<u64>,
    source: fn() -> u64,
}

impl VersionClock {
    /// A clock driven by the system wall clock.
    pub fn new() -> Self {
        Self::with_source(wall_clock_ms)
    }

    /// A clock driven by `source`, typically a fixed value in tests.
    pub fn with_source(source: fn() -> u64) -> Self {
        Self {
            last: Mutex::new(0),
            source,
        }
    }

    /// Next timestamp, strictly greater than every previous tick and than
    /// `floor`.
    pub fn tick(&self, floor: Option<u64>) -> u64 {
        let wall = (self.source)();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());

        let mut next = wall.max(last.saturating_add(1));
        if let Some(floor) = floor {
            next = next.max(floor.saturating_add(1));
        }

        *last = next;
        next
    }
}

impl Default for VersionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VersionClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let last = *self.last.lock().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("VersionClock").field("last", &last).finish()
    }
}
