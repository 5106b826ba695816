//! Time source for the harvest loop

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::NaiveDate;

/// Monotonic time, calendar date and sleeping, injectable for tests
pub trait Clock {
    /// Monotonic now, drives the promotion interval
    fn now(&self) -> Instant;
    /// Wall-clock calendar date, the bound for future-dated records
    fn today(&self) -> NaiveDate;
    fn sleep(&self, duration: Duration);
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn today(&self) -> NaiveDate {
        (**self).today()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Real clock: local calendar date, thread sleep
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Manually advanced clock. `sleep` advances time instead of blocking.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    elapsed: Mutex<Duration>,
    today: Mutex<NaiveDate>,
}

impl ManualClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            base: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            today: Mutex::new(today),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner()) += by;
    }

    pub fn set_today(&self, today: NaiveDate) {
        *self.today.lock().unwrap_or_else(|e| e.into_inner()) = today;
    }

    /// Total time advanced so far
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn today(&self) -> NaiveDate {
        *self.today.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_sleep_advances() {
        let clock = ManualClock::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let t0 = clock.now();
        clock.sleep(Duration::from_secs(5));
        assert_eq!(clock.now() - t0, Duration::from_secs(5));
        assert_eq!(clock.elapsed(), Duration::from_secs(5));
    }
}
