//! Derived expiry state shared by the reminder and reclaim sweeps

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use std::sync::Mutex;

/// State of a resource relative to its deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryState {
    Active,
    ExpiringSoon,
    Expired,
}

/// Classify a deadline against `now`
///
/// Both boundaries are inclusive: a deadline equal to `now` is expired and a
/// deadline equal to `now + window` is expiring soon.
pub fn classify(deadline: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> ExpiryState {
    if deadline <= now {
        ExpiryState::Expired
    } else if deadline <= now + window {
        ExpiryState::ExpiringSoon
    } else {
        ExpiryState::Active
    }
}

/// Deadline for a domain created or renewed at `now`
///
/// Adds `retention` and moves the result to `notify_hour` o'clock on the same
/// calendar day in `offset`, so reminders land at a predictable time.
pub fn retention_deadline(
    now: DateTime<Utc>,
    retention: Duration,
    notify_hour: u32,
    offset: FixedOffset,
) -> DateTime<Utc> {
    let target = (now + retention).with_timezone(&offset);
    target
        .date_naive()
        .and_hms_opt(notify_hour, 0, 0)
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| target.with_timezone(&Utc))
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and dry runs
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
