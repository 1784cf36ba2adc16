use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{Duration, FixedOffset, Local, NaiveDateTime, Utc};

/// Source of "now" in shop-local wall-clock time.
///
/// Every time comparison in the engine goes through one clock so there is a
/// single authoritative timezone.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock {
    offset: Option<FixedOffset>,
}

impl SystemClock {
    /// `None` uses the host's local timezone.
    pub fn new(offset: Option<FixedOffset>) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        match self.offset {
            Some(offset) => Utc::now().with_timezone(&offset).naive_local(),
            None => Local::now().naive_local(),
        }
    }
}

/// A clock that only moves when told to. Test support.
#[doc(hidden)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.lock() += by;
    }

    // A panic elsewhere while holding the lock cannot leave a half-written time.
    fn lock(&self) -> MutexGuard<'_, NaiveDateTime> {
        self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_manual_clock_set_and_advance() {
        let clock = ManualClock::new(dt("2024-05-10 10:00"));
        clock.advance(Duration::minutes(16));
        assert_eq!(clock.now(), dt("2024-05-10 10:16"));
        clock.set(dt("2024-06-01 09:00"));
        assert_eq!(clock.now(), dt("2024-06-01 09:00"));
    }

    #[test]
    fn test_manual_clock_survives_poisoned_lock() {
        let clock = std::sync::Arc::new(ManualClock::new(dt("2024-05-10 10:00")));
        let held = clock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = held.now.lock().unwrap();
            panic!("panicked while holding the clock");
        })
        .join();

        assert_eq!(clock.now(), dt("2024-05-10 10:00"));
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), dt("2024-05-10 10:05"));
    }

    #[test]
    fn test_system_clock_applies_offset() {
        let utc = SystemClock::new(FixedOffset::east_opt(0));
        let plus_three = SystemClock::new(FixedOffset::east_opt(3 * 3600));
        let diff = plus_three.now() - utc.now();
        assert!((diff - Duration::hours(3)).num_seconds().abs() <= 1);
    }
}
