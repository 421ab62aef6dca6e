use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::count::{self, CountRule};
use crate::dates;
use crate::models::{DateRange, ExtractedRow, RawRow, ReduceOutcome};

static FULL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][a-z]+)\s+([A-Z][a-z]+)\b").unwrap());
static INITIALS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z]{2,3}\b").unwrap());

// Counts above this are recorded anyway but flagged for review.
const SUSPICIOUS_COUNT: u32 = 100;

/// Pulls an aggregation key out of a free-text name cell: a capitalised
/// "Firstname Lastname" pair if present, else a 2-3 letter initials token,
/// else the trimmed raw text.
pub fn extract_person(name_text: &str) -> Option<String> {
    if let Some(caps) = FULL_NAME.captures(name_text) {
        return Some(format!("{} {}", &caps[1], &caps[2]));
    }
    if let Some(m) = INITIALS.find(name_text) {
        return Some(m.as_str().to_string());
    }
    let trimmed = name_text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn extract_row(row: &RawRow) -> Option<ExtractedRow> {
    let date = match dates::parse_date(&row.date_text) {
        Some(date) => date,
        None => {
            debug!(date_text = %row.date_text, "skipping row with unparseable date");
            return None;
        }
    };
    let person = match extract_person(&row.name_text) {
        Some(person) => person,
        None => {
            debug!(%date, "skipping row with no person identifier");
            return None;
        }
    };

    let extraction = count::extract_count(&row.count_text);
    if extraction.count > SUSPICIOUS_COUNT {
        warn!(
            %person,
            %date,
            count = extraction.count,
            rule = extraction.rule.as_str(),
            "suspiciously large count recorded"
        );
    }

    Some(ExtractedRow {
        date,
        person,
        count: extraction.count,
        rule: extraction.rule,
    })
}

/// Folds one scrape session into per-person daily counts. Pure and
/// order-independent: multiple rows for the same person and date sum.
/// Bad rows are counted in `skipped`, never fatal.
pub fn reduce_rows(rows: &[RawRow]) -> ReduceOutcome {
    let mut person_data: BTreeMap<String, BTreeMap<_, u32>> = BTreeMap::new();
    let mut weeks: BTreeSet<String> = BTreeSet::new();
    let mut range: Option<DateRange> = None;
    let mut processed = 0usize;
    let mut skipped = 0usize;

    for row in rows {
        let Some(extracted) = extract_row(row) else {
            skipped += 1;
            continue;
        };

        if extracted.rule == CountRule::Default {
            debug!(
                person = %extracted.person,
                cell = %row.count_text,
                "row counted via default rule"
            );
        }

        *person_data
            .entry(extracted.person)
            .or_default()
            .entry(extracted.date)
            .or_insert(0) += extracted.count;

        weeks.insert(dates::iso_week_key(extracted.date));
        range = Some(match range {
            None => DateRange {
                earliest: extracted.date,
                latest: extracted.date,
            },
            Some(r) => DateRange {
                earliest: r.earliest.min(extracted.date),
                latest: r.latest.max(extracted.date),
            },
        });
        processed += 1;
    }

    ReduceOutcome {
        person_data,
        date_range: range,
        processed,
        skipped,
        weeks_covered: weeks.into_iter().collect(),
    }
}
