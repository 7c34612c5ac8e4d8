//! Time source for scoring and correlation.
//!
//! Library code never reads the wall clock on its own: every operation takes
//! an explicit `now`, and binaries obtain it from a [`Clock`].

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const MS_PER_MINUTE: i64 = 60_000;
pub const MS_PER_DAY: i64 = 86_400_000;

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixedClock {
    pub at: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.at
    }
}

pub fn epoch_ms(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub fn from_epoch_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Signed distance `later - earlier` in milliseconds.
pub fn elapsed_ms(earlier: &DateTime<Utc>, later: &DateTime<Utc>) -> i64 {
    (*later - *earlier).num_milliseconds()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_after_epoch() {
        assert!(epoch_ms(&SystemClock.now()) > 0);
    }

    #[test]
    fn fixed_clock_round_trips_millis() {
        let clock = FixedClock::new(from_epoch_ms(1_700_000_000_123));
        assert_eq!(epoch_ms(&clock.now()), 1_700_000_000_123);
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn elapsed_is_signed() {
        let a = from_epoch_ms(0);
        let b = from_epoch_ms(MS_PER_DAY);
        assert_eq!(elapsed_ms(&a, &b), MS_PER_DAY);
        assert_eq!(elapsed_ms(&b, &a), -MS_PER_DAY);
    }
}
