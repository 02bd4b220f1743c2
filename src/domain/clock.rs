use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use super::timestamp::truncate_millis;

/// Source of every timestamp the stores stamp.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock truncated to milliseconds and forced strictly increasing, so two
/// stamps taken back to back (create then toggle) never compare equal.
#[derive(Default)]
pub struct SystemClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl SystemClock {
    pub fn new() -> Self { Self::default() }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let wall = truncate_millis(Utc::now());
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = match *last {
            Some(prev) if wall <= prev => prev + Duration::milliseconds(1),
            _ => wall,
        };
        *last = Some(next);
        next
    }
}

/// Deterministic clock that advances by a fixed step on every call.
pub struct StepClock {
    next: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl StepClock {
    pub fn starting_at(start: DateTime<Utc>, step: Duration) -> Self {
        Self { next: Mutex::new(start), step }
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = self.next.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let current = *next;
        *next = current + self.step;
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn system_clock_is_strictly_increasing() {
        let clock = SystemClock::new();
        let mut prev = clock.now();
        for _ in 0..1000 {
            let ts = clock.now();
            assert!(ts > prev);
            prev = ts;
        }
    }

    #[test]
    fn step_clock_advances_by_step() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let clock = StepClock::starting_at(start, Duration::minutes(1));
        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start + Duration::minutes(1));
    }
}
