use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

static COMPACT_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})([A-Za-z]+)(\d{4})$").unwrap());

fn month_from_name(name: &str) -> Option<u32> {
    let month = match name.to_ascii_lowercase().as_str() {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

/// Parses the date formats seen in scraped cells: `D/M/YYYY`, `D/M/YY`
/// (expanded to 20YY) and compact `1Jan2025` forms. Anything else is `None`;
/// callers count the row as skipped rather than failing the batch.
pub fn parse_date(date_text: &str) -> Option<NaiveDate> {
    let compact: String = date_text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    if let Some(caps) = COMPACT_DATE.captures(&compact) {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_from_name(&caps[2])?;
        let year: i32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let parts: Vec<&str> = compact.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let day: u32 = parts[0].parse().ok()?;
    let month: u32 = parts[1].parse().ok()?;
    let mut year: i32 = parts[2].parse().ok()?;
    if parts[2].len() <= 2 {
        year += 2000;
    }
    if !(1..=31).contains(&day) || !(1..=12).contains(&month) {
        return None;
    }
    // from_ymd_opt also rejects impossible combinations like 31/02.
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn iso_week_and_year(date: NaiveDate) -> (i32, u32) {
    let week = date.iso_week();
    (week.year(), week.week())
}

/// `"2025-W23"` style key, zero-padded, using ISO-8601 week numbering.
pub fn iso_week_key(date: NaiveDate) -> String {
    let (year, week) = iso_week_and_year(date);
    format!("{year}-W{week:02}")
}

pub fn month_key(date: NaiveDate) -> String {
    format!("{}-{:02}", date.year(), date.month())
}
