//! Completion trends anchored to today.
//!
//! These counts ignore the report's date range: they always describe the
//! previous calendar month, the current calendar month and the current
//! Monday-to-Sunday week.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::Serialize;

/// Completed-task counts for the calendar windows around today.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStats {
    pub completed_last_month: usize,
    pub completed_current_month: usize,
    pub completed_current_week: usize,
    /// `M/YYYY`, e.g. `6/2024`
    pub current_month: String,
}

/// Inclusive calendar window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first <= date && date <= self.last
    }

    /// The calendar month containing `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        let first = date.with_day(1).unwrap_or(date);
        let last = first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX);
        Self { first, last }
    }

    /// The calendar month before the one containing `date`.
    pub fn previous_month_of(date: NaiveDate) -> Self {
        let first_of_current = date.with_day(1).unwrap_or(date);
        let in_previous = first_of_current.pred_opt().unwrap_or(NaiveDate::MIN);
        Self::month_of(in_previous)
    }

    /// Monday through Sunday of the week containing `date`.
    ///
    /// A Sunday belongs to the week that started six days earlier.
    pub fn week_of(date: NaiveDate) -> Self {
        let back = u64::from(date.weekday().num_days_from_monday());
        let first = date.checked_sub_days(Days::new(back)).unwrap_or(NaiveDate::MIN);
        let last = first.checked_add_days(Days::new(6)).unwrap_or(NaiveDate::MAX);
        Self { first, last }
    }
}

impl MonthlyStats {
    /// Bucket completion dates into the windows around `today`.
    pub fn compute<I>(completion_dates: I, today: NaiveDate) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let last_month = DateWindow::previous_month_of(today);
        let current_month = DateWindow::month_of(today);
        let current_week = DateWindow::week_of(today);

        let mut stats = MonthlyStats {
            current_month: format!("{}/{}", today.month(), today.year()),
            ..Default::default()
        };

        for date in completion_dates {
            if last_month.contains(date) {
                stats.completed_last_month += 1;
            }
            if current_month.contains(date) {
                stats.completed_current_month += 1;
            }
            if current_week.contains(date) {
                stats.completed_current_week += 1;
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_month_windows() {
        let march = DateWindow::month_of(d(2024, 3, 17));
        assert_eq!(march.first, d(2024, 3, 1));
        assert_eq!(march.last, d(2024, 3, 31));

        let leap_feb = DateWindow::previous_month_of(d(2024, 3, 17));
        assert_eq!(leap_feb.first, d(2024, 2, 1));
        assert_eq!(leap_feb.last, d(2024, 2, 29));

        let december = DateWindow::previous_month_of(d(2025, 1, 1));
        assert_eq!(december.first, d(2024, 12, 1));
        assert_eq!(december.last, d(2024, 12, 31));
    }

    #[test]
    fn test_week_starts_on_monday() {
        // 2024-06-12 is a Wednesday
        let week = DateWindow::week_of(d(2024, 6, 12));
        assert_eq!(week.first, d(2024, 6, 10));
        assert_eq!(week.last, d(2024, 6, 16));

        // Monday is its own week start
        assert_eq!(DateWindow::week_of(d(2024, 6, 10)).first, d(2024, 6, 10));
    }

    #[test]
    fn test_sunday_belongs_to_preceding_monday() {
        // 2024-06-16 is a Sunday
        let today = d(2024, 6, 16);
        let week = DateWindow::week_of(today);
        assert_eq!(week.first, d(2024, 6, 10));
        assert_eq!(week.last, today);

        let dates = vec![d(2024, 6, 9), d(2024, 6, 10), d(2024, 6, 13), d(2024, 6, 16)];
        let stats = MonthlyStats::compute(dates, today);
        assert_eq!(stats.completed_current_week, 3);
    }

    #[test]
    fn test_compute_buckets() {
        let today = d(2024, 6, 12);
        let dates = vec![
            d(2024, 4, 30),
            d(2024, 5, 1),
            d(2024, 5, 31),
            d(2024, 6, 1),
            d(2024, 6, 11),
            d(2024, 6, 12),
            d(2024, 7, 1),
        ];

        let stats = MonthlyStats::compute(dates, today);
        assert_eq!(stats.completed_last_month, 2);
        assert_eq!(stats.completed_current_month, 3);
        assert_eq!(stats.completed_current_week, 2);
        assert_eq!(stats.current_month, "6/2024");
    }

    #[test]
    fn test_week_spanning_months_counts_in_both() {
        // 2024-07-02 is a Tuesday; its week starts Monday 2024-07-01,
        // and 2024-06-30 (Sunday) belongs to the previous week.
        let today = d(2024, 7, 2);
        let stats = MonthlyStats::compute(vec![d(2024, 6, 30), d(2024, 7, 1)], today);
        assert_eq!(stats.completed_last_month, 1);
        assert_eq!(stats.completed_current_month, 1);
        assert_eq!(stats.completed_current_week, 1);
        assert_eq!(stats.current_month, "7/2024");
    }

    #[test]
    fn test_serializes_camel_case() {
        let stats = MonthlyStats::compute(Vec::new(), d(2024, 11, 5));
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["completedLastMonth"], 0);
        assert_eq!(json["currentMonth"], "11/2024");
    }
}
