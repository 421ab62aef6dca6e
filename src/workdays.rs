use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Weekday};

pub fn is_workday(date: NaiveDate, holidays: &BTreeSet<NaiveDate>) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !holidays.contains(&date)
}

fn days_of_month(year: i32, month: u32) -> impl Iterator<Item = NaiveDate> {
    (1..=31).filter_map(move |day| NaiveDate::from_ymd_opt(year, month, day))
}

/// Weekdays of the month minus the supplied public holidays, in order.
pub fn workdays_in_month(
    year: i32,
    month: u32,
    holidays: &BTreeSet<NaiveDate>,
) -> Vec<NaiveDate> {
    days_of_month(year, month)
        .filter(|d| is_workday(*d, holidays))
        .collect()
}

/// Workdays of the month that have already passed, `today` inclusive.
pub fn workdays_elapsed(
    year: i32,
    month: u32,
    today: NaiveDate,
    holidays: &BTreeSet<NaiveDate>,
) -> usize {
    workdays_in_month(year, month, holidays)
        .into_iter()
        .filter(|d| *d <= today)
        .count()
}

/// The first `n` workdays of a month, used to truncate a prior period to
/// the same number of workdays as the current month-to-date window.
pub fn prior_workday_window(
    year: i32,
    month: u32,
    n: usize,
    holidays: &BTreeSet<NaiveDate>,
) -> BTreeSet<NaiveDate> {
    workdays_in_month(year, month, holidays)
        .into_iter()
        .take(n)
        .collect()
}

pub fn prior_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}
