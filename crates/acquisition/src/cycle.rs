//! Model run cycles and 6-hourly stepping between them.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

/// Model run cycle (GFS and FNL both run 4x daily).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModelCycle {
    /// 00Z run
    Z00,
    /// 06Z run
    Z06,
    /// 12Z run
    Z12,
    /// 18Z run
    Z18,
}

impl ModelCycle {
    pub fn from_hour(hour: u32) -> Option<Self> {
        match hour {
            0 => Some(ModelCycle::Z00),
            6 => Some(ModelCycle::Z06),
            12 => Some(ModelCycle::Z12),
            18 => Some(ModelCycle::Z18),
            _ => None,
        }
    }

    pub fn hour(&self) -> u32 {
        match self {
            ModelCycle::Z00 => 0,
            ModelCycle::Z06 => 6,
            ModelCycle::Z12 => 12,
            ModelCycle::Z18 => 18,
        }
    }

    pub fn all_4x_daily() -> &'static [ModelCycle] {
        &[ModelCycle::Z00, ModelCycle::Z06, ModelCycle::Z12, ModelCycle::Z18]
    }

    /// Cycle whose start is exactly `instant`, if it is on the 6 h grid.
    pub fn at(instant: NaiveDateTime) -> Option<Self> {
        if instant.minute() != 0 || instant.second() != 0 || instant.nanosecond() != 0 {
            return None;
        }
        Self::from_hour(instant.hour())
    }
}

impl fmt::Display for ModelCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}z", self.hour())
    }
}

/// Run preceding `(date, cycle)`; 00Z rolls back to 18Z of the previous day.
pub fn previous_run(date: NaiveDate, cycle: ModelCycle) -> (NaiveDate, ModelCycle) {
    match cycle {
        ModelCycle::Z00 => (date - Duration::days(1), ModelCycle::Z18),
        ModelCycle::Z06 => (date, ModelCycle::Z00),
        ModelCycle::Z12 => (date, ModelCycle::Z06),
        ModelCycle::Z18 => (date, ModelCycle::Z12),
    }
}

/// Run following `(date, cycle)`; 18Z rolls over to 00Z of the next day.
pub fn next_run(date: NaiveDate, cycle: ModelCycle) -> (NaiveDate, ModelCycle) {
    match cycle {
        ModelCycle::Z00 => (date, ModelCycle::Z06),
        ModelCycle::Z06 => (date, ModelCycle::Z12),
        ModelCycle::Z12 => (date, ModelCycle::Z18),
        ModelCycle::Z18 => (date + Duration::days(1), ModelCycle::Z00),
    }
}

/// Start instant of a run.
pub fn run_instant(date: NaiveDate, cycle: ModelCycle) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN) + Duration::hours(cycle.hour() as i64)
}

/// First run starting at or after `instant`.
pub fn run_at_or_after(instant: NaiveDateTime) -> (NaiveDate, ModelCycle) {
    let date = instant.date();
    let mut run = (date, ModelCycle::Z00);
    while run_instant(run.0, run.1) < instant {
        run = next_run(run.0, run.1);
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_previous_rolls_over_date() {
        assert_eq!(
            previous_run(date(2022, 3, 1), ModelCycle::Z00),
            (date(2022, 2, 28), ModelCycle::Z18)
        );
        assert_eq!(
            previous_run(date(2022, 3, 1), ModelCycle::Z12),
            (date(2022, 3, 1), ModelCycle::Z06)
        );
    }

    #[test]
    fn test_next_rolls_over_date() {
        assert_eq!(
            next_run(date(2021, 12, 31), ModelCycle::Z18),
            (date(2022, 1, 1), ModelCycle::Z00)
        );
    }

    #[test]
    fn test_run_at_or_after() {
        let t = date(2022, 5, 26).and_hms_opt(7, 30, 0).unwrap();
        assert_eq!(run_at_or_after(t), (date(2022, 5, 26), ModelCycle::Z12));

        let t = date(2022, 5, 26).and_hms_opt(18, 0, 1).unwrap();
        assert_eq!(run_at_or_after(t), (date(2022, 5, 27), ModelCycle::Z00));

        let t = date(2022, 5, 26).and_hms_opt(6, 0, 0).unwrap();
        assert_eq!(run_at_or_after(t), (date(2022, 5, 26), ModelCycle::Z06));
    }

    #[test]
    fn test_cycle_display_and_instant() {
        assert_eq!(ModelCycle::Z06.to_string(), "06z");
        let instant = run_instant(date(2022, 5, 26), ModelCycle::Z18);
        assert_eq!(ModelCycle::at(instant), Some(ModelCycle::Z18));
        assert_eq!(ModelCycle::at(instant + Duration::hours(1)), None);
    }
}
