use std::sync::Mutex;

use time::{Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Source of "now" in the competition's reference timezone.
pub trait Clock: Send + Sync {
    /// Current wall-clock time in the reference timezone.
    fn now(&self) -> PrimitiveDateTime;
}

/// Clock backed by the system time, shifted into a fixed offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    /// Build a clock reporting local time at `offset`.
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> PrimitiveDateTime {
        let now = OffsetDateTime::now_utc().to_offset(self.offset);
        PrimitiveDateTime::new(now.date(), now.time())
    }
}

/// Manually driven clock, handy for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<PrimitiveDateTime>,
}

impl FixedClock {
    /// Freeze time at `now`.
    pub fn new(now: PrimitiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Jump to `now`.
    pub fn set(&self, now: PrimitiveDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    /// Move forward by `step`.
    pub fn advance(&self, step: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += step;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> PrimitiveDateTime {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
