//! Source of "now" for every date computation. Commands read the clock once and
//! pass the resulting day down, so tests can pin it with [`FixedClock`].

use chrono::{DateTime, NaiveDate, Utc};

use crate::datetime::DayBoundary;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Canonical calendar day of the current instant under `boundary`.
    fn today(&self, boundary: &DayBoundary) -> NaiveDate {
        boundary.date_of(self.now())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
