//! Time source for day-boundary decisions
//!
//! The day boundary follows the host's local calendar date, not UTC.

use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Utc};

/// Source of the current instant in the host's local offset
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    /// Local calendar date
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.now().with_timezone(&Utc)
    }
}

/// Wall clock in the host's local time zone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Settable clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Clock at `hour:minute` local time on `date` in the given UTC offset
    ///
    /// Returns `None` for an out-of-range offset or time.
    pub fn at(date: NaiveDate, hour: u32, minute: u32, offset_hours: i32) -> Option<Self> {
        let offset = FixedOffset::east_opt(offset_hours * 3600)?;
        let naive = date.and_hms_opt(hour, minute, 0)?;
        let now = offset.from_local_datetime(&naive).single()?;
        Some(Self::new(now))
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = *guard + by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// First instant of the next local calendar day
pub fn next_local_midnight(now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let tomorrow = now
        .date_naive()
        .succ_opt()
        .map(|date| date.and_time(NaiveTime::MIN));

    tomorrow
        .and_then(|naive| now.offset().from_local_datetime(&naive).earliest())
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_manual_clock_today_uses_local_offset() {
        // 23:30 at UTC+8 is still 15:30 UTC on the same day,
        // but 00:30 at UTC+8 belongs to the next local day
        let clock = ManualClock::at(date(2026, 3, 1), 23, 30, 8).unwrap();
        assert_eq!(clock.today(), date(2026, 3, 1));

        clock.advance(Duration::hours(1));
        assert_eq!(clock.today(), date(2026, 3, 2));
        assert_eq!(clock.now_utc().date_naive(), date(2026, 3, 1));
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::at(date(2026, 3, 1), 9, 0, 0).unwrap();
        let later = ManualClock::at(date(2026, 3, 5), 9, 0, 0).unwrap().now();
        clock.set(later);
        assert_eq!(clock.today(), date(2026, 3, 5));
    }

    #[test]
    fn test_next_local_midnight() {
        let clock = ManualClock::at(date(2026, 12, 31), 18, 45, -5).unwrap();
        let midnight = next_local_midnight(clock.now());
        assert_eq!(midnight.date_naive(), date(2027, 1, 1));
        assert_eq!(midnight.hour(), 0);
        assert_eq!(midnight.minute(), 0);
        assert_eq!(midnight.offset(), clock.now().offset());
    }

    #[test]
    fn test_system_clock_today_matches_local() {
        let today = SystemClock.today();
        let local = Local::now().date_naive();
        // Allow the test to straddle midnight
        assert!(today == local || today.succ_opt() == Some(local));
    }
}
