use chrono::{Local, NaiveDate};

use crate::models::{ScheduleStatus, ScheduleWindow, Severity};

/// Current calendar day on the local clock.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

pub fn total_days(from: NaiveDate, to: NaiveDate) -> i64 {
    days_between(from, to).max(0)
}

pub fn remaining_days(from: NaiveDate, to: NaiveDate, today: NaiveDate) -> i64 {
    days_between(today.max(from), to).max(0)
}

pub fn severity(remaining_days: i64, total_days: i64) -> Severity {
    // Same-day windows have no span to divide by and fall into the first arm.
    if remaining_days <= 1 || total_days <= 0 {
        return Severity::Critical;
    }
    if remaining_days as f64 / total_days as f64 <= 0.5 {
        Severity::Warning
    } else {
        Severity::Safe
    }
}

/// Derives the remaining/total day counts and severity for `window` as of `today`.
///
/// Only the calendar dates are used; the stored day counts are a snapshot from the
/// time of the commit and are ignored here.
pub fn status(window: &ScheduleWindow, today: NaiveDate) -> ScheduleStatus {
    let total_days = total_days(window.from, window.to);
    let remaining_days = remaining_days(window.from, window.to, today).min(total_days);
    ScheduleStatus {
        remaining_days,
        total_days,
        severity: severity(remaining_days, total_days),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn window(from: NaiveDate, to: NaiveDate) -> ScheduleWindow {
        ScheduleWindow {
            resource_id: "production-web-cluster".to_string(),
            from,
            to,
            total_days: total_days(from, to),
            remaining_days: total_days(from, to),
        }
    }

    #[test]
    fn midway_window_is_warning() {
        let w = window(date(2024, 1, 1), date(2024, 1, 8));
        let s = status(&w, date(2024, 1, 6));
        assert_eq!(s.total_days, 7);
        assert_eq!(s.remaining_days, 2);
        assert_eq!(s.severity, Severity::Warning);
    }

    #[test]
    fn last_day_is_critical_with_nothing_left() {
        let w = window(date(2024, 1, 1), date(2024, 1, 8));
        let s = status(&w, date(2024, 1, 8));
        assert_eq!(s.remaining_days, 0);
        assert_eq!(s.severity, Severity::Critical);
    }

    #[test]
    fn future_window_counts_from_its_start() {
        let w = window(date(2024, 3, 10), date(2024, 3, 20));
        let s = status(&w, date(2024, 3, 1));
        assert_eq!(s.remaining_days, 10);
        assert_eq!(s.total_days, 10);
        assert_eq!(s.severity, Severity::Safe);
    }

    #[test]
    fn expired_window_never_goes_negative() {
        let w = window(date(2024, 1, 1), date(2024, 1, 8));
        let s = status(&w, date(2024, 6, 1));
        assert_eq!(s.remaining_days, 0);
        assert_eq!(s.severity, Severity::Critical);
    }

    #[test]
    fn same_day_window_is_critical() {
        let w = window(date(2024, 5, 5), date(2024, 5, 5));
        let s = status(&w, date(2024, 5, 5));
        assert_eq!(s.total_days, 0);
        assert_eq!(s.remaining_days, 0);
        assert_eq!(s.severity, Severity::Critical);

        // Still critical when the same-day window lies in the future.
        let s = status(&w, date(2024, 5, 1));
        assert_eq!(s.total_days, 0);
        assert_eq!(s.severity, Severity::Critical);
    }

    #[test]
    fn one_day_left_is_critical_regardless_of_length() {
        let w = window(date(2024, 1, 1), date(2024, 12, 31));
        let s = status(&w, date(2024, 12, 30));
        assert_eq!(s.remaining_days, 1);
        assert_eq!(s.severity, Severity::Critical);
    }

    #[test]
    fn remaining_is_bounded_by_total() {
        let from = date(2024, 1, 1);
        let to = date(2024, 2, 15);
        let w = window(from, to);
        let mut day = date(2023, 12, 1);
        while day <= date(2024, 3, 31) {
            let s = status(&w, day);
            assert!(s.remaining_days >= 0);
            assert!(s.remaining_days <= s.total_days);
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn half_remaining_is_warning() {
        assert_eq!(severity(5, 10), Severity::Warning);
        assert_eq!(severity(6, 10), Severity::Safe);
        assert_eq!(severity(2, 2), Severity::Safe);
    }
}
