use chrono::{Local, NaiveDate, NaiveDateTime};

/// Source of "now" for stamping weather records and scheduling the daily refresh.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Local wall-clock time.
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Always reports the same instant. Handy for tests and replaying a day.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: NaiveDateTime,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now }
    }

    /// Midnight of `date`.
    pub fn on(date: NaiveDate) -> Self {
        Self { now: date.and_time(chrono::NaiveTime::MIN) }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_reports_its_date() {
        let date = NaiveDate::from_ymd_opt(2022, 7, 27).unwrap();
        let clock: Box<dyn Clock> = Box::new(FixedClock::on(date));

        assert_eq!(clock.today(), date);
    }
}
