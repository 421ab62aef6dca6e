use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;

use crate::dates;
use crate::models::{TrendDataset, TrendSeries, TrendTableRow};
use crate::store::AggregateStore;

const CHART_SERIES_LIMIT: usize = 5;
const TABLE_SERIES_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TrendMode {
    People,
    Folders,
}

#[derive(Debug, Clone)]
pub struct TrendQuery {
    pub mode: TrendMode,
    /// `None` means everyone; an empty list means nobody.
    pub people: Option<Vec<String>>,
    pub folders: Option<Vec<String>>,
    pub show_total: bool,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub exclude_folders: BTreeSet<String>,
    pub granularity: Granularity,
    pub omit_empty_keys: bool,
}

fn included(filter: &Option<Vec<String>>, name: &str) -> bool {
    match filter {
        None => true,
        Some(names) => names.iter().any(|n| n == name),
    }
}

fn bucket_key(date: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Daily => date.to_string(),
        Granularity::Weekly => dates::iso_week_key(date),
        Granularity::Monthly => dates::month_key(date),
    }
}

fn bucket_label(date: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Daily => date.format("%d %b").to_string(),
        Granularity::Weekly => {
            let (year, week) = dates::iso_week_and_year(date);
            format!("W{week:02} {year}")
        }
        Granularity::Monthly => date.format("%b %Y").to_string(),
    }
}

/// The key axis for a range: every day, or the distinct ISO weeks/calendar
/// months touched by the range, in chronological order.
fn build_axis(start: NaiveDate, end: NaiveDate, granularity: Granularity) -> (Vec<String>, Vec<String>) {
    let mut keys = Vec::new();
    let mut labels = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();

    let mut date = start;
    while date <= end {
        let key = bucket_key(date, granularity);
        if seen.insert(key.clone()) {
            labels.push(bucket_label(date, granularity));
            keys.push(key);
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    (keys, labels)
}

pub fn build_trend_series(store: &AggregateStore, query: &TrendQuery) -> TrendSeries {
    if query.start > query.end {
        return TrendSeries::default();
    }

    let (keys, labels) = build_axis(query.start, query.end, query.granularity);
    let key_index: BTreeMap<&str, usize> =
        keys.iter().enumerate().map(|(i, k)| (k.as_str(), i)).collect();

    // entity -> per-key totals, aligned to the axis.
    let mut series: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    let mut totals: BTreeMap<String, u32> = BTreeMap::new();

    for (person, years) in &store.persons {
        if !included(&query.people, person) {
            continue;
        }
        for (&year, months) in years {
            if year < query.start.year() || year > query.end.year() {
                continue;
            }
            for folders in months.values() {
                for (folder, days) in folders {
                    if !included(&query.folders, folder)
                        || query.exclude_folders.contains(folder)
                    {
                        continue;
                    }
                    let entity = match query.mode {
                        TrendMode::People => person,
                        TrendMode::Folders => folder,
                    };
                    for (&date, &count) in days {
                        if date < query.start || date > query.end {
                            continue;
                        }
                        // Bucket membership follows the day's own week/month.
                        let key = bucket_key(date, query.granularity);
                        let Some(&idx) = key_index.get(key.as_str()) else {
                            continue;
                        };
                        series
                            .entry(entity.to_string())
                            .or_insert_with(|| vec![0; keys.len()])[idx] += count;
                        *totals.entry(entity.to_string()).or_insert(0) += count;
                    }
                }
            }
        }
    }

    // Rank by total, descending; name breaks ties deterministically.
    let mut ranked: Vec<(String, u32)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut keep = vec![true; keys.len()];
    if query.omit_empty_keys {
        let mut any_data = false;
        for (i, flag) in keep.iter_mut().enumerate() {
            let column: u32 = series.values().map(|data| data[i]).sum();
            *flag = column > 0;
            any_data |= column > 0;
        }
        // Never collapse the axis to nothing.
        if !any_data {
            keep = vec![true; keys.len()];
        }
    }

    let trim = |data: &[u32]| -> Vec<u32> {
        data.iter()
            .zip(&keep)
            .filter_map(|(&v, &k)| k.then_some(v))
            .collect()
    };

    let kept_keys: Vec<String> = keys
        .iter()
        .zip(&keep)
        .filter_map(|(k, &keep)| keep.then(|| k.clone()))
        .collect();
    let kept_labels: Vec<String> = labels
        .iter()
        .zip(&keep)
        .filter_map(|(l, &keep)| keep.then(|| l.clone()))
        .collect();

    let mut datasets: Vec<TrendDataset> = ranked
        .iter()
        .take(CHART_SERIES_LIMIT)
        .map(|(entity, _)| TrendDataset {
            label: entity.clone(),
            data: trim(&series[entity]),
        })
        .collect();

    if query.show_total {
        let mut total_data = vec![0u32; keys.len()];
        for data in series.values() {
            for (slot, &v) in total_data.iter_mut().zip(data) {
                *slot += v;
            }
        }
        datasets.push(TrendDataset {
            label: "Total".to_string(),
            data: trim(&total_data),
        });
    }

    let mut table_data: Vec<TrendTableRow> = ranked
        .iter()
        .take(TABLE_SERIES_LIMIT)
        .map(|(entity, total)| TrendTableRow {
            label: entity.clone(),
            values: trim(&series[entity]),
            total: *total,
        })
        .collect();

    let column_count = kept_keys.len();
    let mut column_sums = vec![0u32; column_count];
    let mut grand_total = 0u32;
    for row in &table_data {
        for (slot, &v) in column_sums.iter_mut().zip(&row.values) {
            *slot += v;
        }
        grand_total += row.total;
    }
    table_data.push(TrendTableRow {
        label: "Total".to_string(),
        values: column_sums,
        total: grand_total,
    });

    TrendSeries {
        labels: kept_labels,
        keys: kept_keys,
        datasets,
        table_data,
    }
}
