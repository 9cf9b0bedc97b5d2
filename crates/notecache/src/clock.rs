//! Timestamp source for writes

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Source of `created_at` / `updated_at` stamps
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock that never repeats or goes backwards.
///
/// When the system time has not advanced past the previous stamp, the next
/// stamp is the previous one plus a microsecond.
#[derive(Debug)]
pub struct SystemClock {
    last: Mutex<DateTime<Utc>>,
}

impl SystemClock {
    /// Create a new clock
    pub fn new() -> Self {
        Self {
            last: Mutex::new(DateTime::UNIX_EPOCH),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock();
        let now = Utc::now();
        let next = if now > *last {
            now
        } else {
            *last + Duration::microseconds(1)
        };
        *last = next;
        next
    }
}
