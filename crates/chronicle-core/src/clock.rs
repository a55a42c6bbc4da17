//! Time sources.
//!
//! Components that assign timestamps or expire cached data take an
//! `Arc<dyn Clock>` instead of calling `Utc::now()` directly, so tests can
//! drive time forward deterministically with a [`ManualClock`].

use std::sync::{PoisonError, RwLock};

use crate::types::Timestamp;

/// A source of the current time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// The current time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    current: RwLock<Timestamp>,
}

impl ManualClock {
    /// Create a clock frozen at the given instant.
    #[must_use]
    pub fn starting_at(start: Timestamp) -> Self {
        Self {
            current: RwLock::new(start),
        }
    }

    /// Move the clock forward (or backward, for a negative delta).
    ///
    /// Saturates at the current value if the result would overflow.
    pub fn advance(&self, delta: chrono::Duration) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(next) = current.checked_add(delta) {
            *current = next;
        }
    }

    /// Jump to a specific instant.
    pub fn set(&self, to: Timestamp) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(Timestamp::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_frozen() {
        let clock = ManualClock::default();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_manual_clock_advance() {
        let start = Timestamp::parse("2024-01-15T10:00:00Z").unwrap();
        let clock = ManualClock::starting_at(start);
        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(clock.now().to_rfc3339(), "2024-01-15T10:05:00.000000Z");
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::default();
        let target = Timestamp::parse("2030-06-01T00:00:00Z").unwrap();
        clock.set(target);
        assert_eq!(clock.now(), target);
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
