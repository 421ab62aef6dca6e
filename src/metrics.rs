//! Month-view metrics derived from the aggregate store.
//!
//! Everything here is a pure function of the store and a query; snapshots
//! are recomputed on demand and hold no references back into the store.
//! Traversal is over `BTreeMap`s, so "first encountered wins" tie-breaks are
//! deterministic: lexicographically-smallest person, earliest date.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};

use crate::models::{ActiveDays, KpiData, MetricsSnapshot, PeakPerformance};
use crate::store::AggregateStore;
use crate::workdays;

#[derive(Debug, Clone, Default)]
pub struct MetricsQuery {
    pub year: i32,
    pub month: u32,
    /// `None` means everyone; an empty list means nobody.
    pub people: Option<Vec<String>>,
    /// `None` means every folder; an empty list means none.
    pub folders: Option<Vec<String>>,
    /// Folders dropped from distribution/volume/breakdown totals. They still
    /// feed active-day bookkeeping, matching the dashboard's behaviour.
    pub exclude_folders: BTreeSet<String>,
    /// When set, only these dates contribute. Used for workday-matched
    /// month-to-date comparisons.
    pub workdays_to_include: Option<BTreeSet<NaiveDate>>,
    /// Enables the run-rate forecast and month-to-date comparisons.
    pub today: Option<NaiveDate>,
    pub holidays: BTreeSet<NaiveDate>,
}

fn included(filter: &Option<Vec<String>>, name: &str) -> bool {
    match filter {
        None => true,
        Some(names) => names.iter().any(|n| n == name),
    }
}

fn ordinal_day(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{day}{suffix}")
}

/// "Monday 2nd" style label for the busiest-day KPI.
fn weekday_ordinal(date: NaiveDate) -> String {
    format!("{} {}", date.format("%A"), ordinal_day(date.day()))
}

fn population_std_dev(values: &[u32]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    variance.sqrt()
}

pub fn compute_metrics(store: &AggregateStore, query: &MetricsQuery) -> MetricsSnapshot {
    let mut snapshot = MetricsSnapshot::default();
    let mut person_active: BTreeMap<&str, BTreeSet<NaiveDate>> = BTreeMap::new();
    let mut folder_active: BTreeMap<&str, BTreeSet<NaiveDate>> = BTreeMap::new();

    for (person, years) in &store.persons {
        if !included(&query.people, person) {
            continue;
        }
        let Some(folders) = years.get(&query.year).and_then(|m| m.get(&query.month)) else {
            continue;
        };
        for (folder, days) in folders {
            if !included(&query.folders, folder) {
                continue;
            }
            let excluded = query.exclude_folders.contains(folder);
            for (&date, &count) in days {
                if let Some(window) = &query.workdays_to_include {
                    if !window.contains(&date) {
                        continue;
                    }
                }

                // Excluded folders still mark the day active.
                person_active.entry(person.as_str()).or_default().insert(date);
                folder_active.entry(folder.as_str()).or_default().insert(date);
                if excluded {
                    continue;
                }

                *snapshot
                    .monthly_distribution
                    .entry(folder.clone())
                    .or_insert(0) += count;
                *snapshot
                    .volume_breakdown
                    .entry(person.clone())
                    .or_insert(0) += count;
                *snapshot
                    .person_daily_totals
                    .entry(person.clone())
                    .or_default()
                    .entry(date)
                    .or_insert(0) += count;
                *snapshot
                    .folder_daily_totals
                    .entry(folder.clone())
                    .or_default()
                    .entry(date)
                    .or_insert(0) += count;
                *snapshot
                    .person_folder_breakdown
                    .entry(person.clone())
                    .or_default()
                    .entry(folder.clone())
                    .or_insert(0) += count;
                *snapshot
                    .folder_person_breakdown
                    .entry(folder.clone())
                    .or_default()
                    .entry(person.clone())
                    .or_insert(0) += count;
            }
        }
    }

    snapshot.active_days = ActiveDays {
        people: person_active
            .iter()
            .map(|(p, days)| (p.to_string(), days.len() as u32))
            .collect(),
        folders: folder_active
            .iter()
            .map(|(f, days)| (f.to_string(), days.len() as u32))
            .collect(),
    };

    for (person, days) in &snapshot.person_daily_totals {
        let totals: Vec<u32> = days.values().copied().collect();
        snapshot
            .consistency_scores
            .insert(person.clone(), population_std_dev(&totals));
    }

    snapshot.kpi_data = compute_kpis(&snapshot, query);
    snapshot
}

fn compute_kpis(snapshot: &MetricsSnapshot, query: &MetricsQuery) -> KpiData {
    let total_processed: u32 = snapshot.volume_breakdown.values().sum();
    let people_with_activity = snapshot.volume_breakdown.len().max(1);
    let avg_per_person = total_processed as f64 / people_with_activity as f64;

    let mut top_performer: Option<(&String, u32)> = None;
    for (person, &total) in &snapshot.volume_breakdown {
        if top_performer.map_or(true, |(_, best)| total > best) {
            top_performer = Some((person, total));
        }
    }

    let mut day_totals: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    let mut day_contributors: BTreeMap<NaiveDate, BTreeSet<&String>> = BTreeMap::new();
    let mut peak: Option<PeakPerformance> = None;
    for (person, days) in &snapshot.person_daily_totals {
        for (&date, &count) in days {
            *day_totals.entry(date).or_insert(0) += count;
            day_contributors.entry(date).or_default().insert(person);
            if peak.as_ref().map_or(true, |p| count > p.count) {
                peak = Some(PeakPerformance {
                    person: person.clone(),
                    date,
                    count,
                });
            }
        }
    }

    let mut busiest: Option<(NaiveDate, u32)> = None;
    for (&date, &total) in &day_totals {
        if busiest.map_or(true, |(_, best)| total > best) {
            busiest = Some((date, total));
        }
    }

    let avg_daily_per_person = if day_totals.is_empty() {
        0.0
    } else {
        day_totals
            .iter()
            .map(|(date, &total)| {
                let contributors = day_contributors
                    .get(date)
                    .map_or(1, |set| set.len().max(1));
                total as f64 / contributors as f64
            })
            .sum::<f64>()
            / day_totals.len() as f64
    };

    let forecasted_total = query.today.and_then(|today| {
        forecast_total(
            total_processed,
            query.year,
            query.month,
            today,
            &query.holidays,
        )
    });

    KpiData {
        total_processed,
        avg_per_person,
        top_performer: top_performer.map(|(p, _)| p.clone()),
        busiest_day: busiest.map(|(date, _)| weekday_ordinal(date)),
        peak_performance: peak,
        avg_daily_per_person,
        forecasted_total,
    }
}

/// Run-rate projection: total so far scaled from workdays elapsed to the
/// full month's workdays. `None` until at least one workday has elapsed.
pub fn forecast_total(
    total_so_far: u32,
    year: i32,
    month: u32,
    today: NaiveDate,
    holidays: &BTreeSet<NaiveDate>,
) -> Option<f64> {
    let elapsed = workdays::workdays_elapsed(year, month, today, holidays);
    if elapsed == 0 {
        return None;
    }
    let total_workdays = workdays::workdays_in_month(year, month, holidays).len();
    Some(total_so_far as f64 / elapsed as f64 * total_workdays as f64)
}

/// Current month-to-date snapshot next to a prior-month snapshot truncated
/// to the same number of workdays, so the comparison is like for like.
/// Requires `query.today`; the prior month reuses the query's filters.
pub fn compute_month_comparison(
    store: &AggregateStore,
    query: &MetricsQuery,
) -> (MetricsSnapshot, Option<MetricsSnapshot>) {
    let current = compute_metrics(store, query);

    let Some(today) = query.today else {
        return (current, None);
    };
    let elapsed = workdays::workdays_elapsed(query.year, query.month, today, &query.holidays);
    if elapsed == 0 {
        return (current, None);
    }

    let (prior_year, prior_month) = workdays::prior_month(query.year, query.month);
    let window =
        workdays::prior_workday_window(prior_year, prior_month, elapsed, &query.holidays);
    let prior_query = MetricsQuery {
        year: prior_year,
        month: prior_month,
        people: query.people.clone(),
        folders: query.folders.clone(),
        exclude_folders: query.exclude_folders.clone(),
        workdays_to_include: Some(window),
        today: None,
        holidays: query.holidays.clone(),
    };
    let prior = compute_metrics(store, &prior_query);
    (current, Some(prior))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_store() -> AggregateStore {
        let mut store = AggregateStore::default();
        store.set_count("John Smith", "Audit Office", day(2025, 6, 2), 3);
        store.set_count("John Smith", "Audit Office", day(2025, 6, 3), 1);
        store
    }

    fn month_query(year: i32, month: u32) -> MetricsQuery {
        MetricsQuery {
            year,
            month,
            ..MetricsQuery::default()
        }
    }

    #[test]
    fn month_view_matches_the_store() {
        let snapshot = compute_metrics(&sample_store(), &month_query(2025, 6));

        assert_eq!(snapshot.volume_breakdown["John Smith"], 4);
        assert_eq!(snapshot.monthly_distribution["Audit Office"], 4);
        assert_eq!(snapshot.kpi_data.total_processed, 4);
        assert_eq!(
            snapshot.kpi_data.top_performer.as_deref(),
            Some("John Smith")
        );
        assert_eq!(snapshot.active_days.people["John Smith"], 2);
        assert_eq!(snapshot.active_days.folders["Audit Office"], 2);
    }

    #[test]
    fn missing_month_yields_an_empty_snapshot() {
        let snapshot = compute_metrics(&sample_store(), &month_query(2025, 7));
        assert_eq!(snapshot.kpi_data.total_processed, 0);
        assert!(snapshot.volume_breakdown.is_empty());
        assert!(snapshot.kpi_data.top_performer.is_none());
        assert!(snapshot.kpi_data.busiest_day.is_none());
    }

    #[test]
    fn empty_people_filter_means_nobody() {
        let mut query = month_query(2025, 6);
        query.people = Some(vec![]);
        let snapshot = compute_metrics(&sample_store(), &query);
        assert_eq!(snapshot.kpi_data.total_processed, 0);
        assert!(snapshot.volume_breakdown.is_empty());
    }

    #[test]
    fn filters_match_exact_names() {
        let mut store = sample_store();
        store.set_count("Ann Jones", "Registry", day(2025, 6, 2), 7);

        let mut query = month_query(2025, 6);
        query.people = Some(vec!["Ann Jones".to_string()]);
        let snapshot = compute_metrics(&store, &query);
        assert_eq!(snapshot.kpi_data.total_processed, 7);
        assert!(!snapshot.volume_breakdown.contains_key("John Smith"));

        let mut query = month_query(2025, 6);
        query.folders = Some(vec!["Registry".to_string()]);
        let snapshot = compute_metrics(&store, &query);
        assert_eq!(snapshot.monthly_distribution.len(), 1);
        assert_eq!(snapshot.monthly_distribution["Registry"], 7);
    }

    #[test]
    fn excluded_folders_drop_from_totals_but_stay_active() {
        let mut store = sample_store();
        store.set_count("John Smith", "Batch Sheets", day(2025, 6, 4), 10);

        let mut query = month_query(2025, 6);
        query.exclude_folders.insert("Batch Sheets".to_string());
        let snapshot = compute_metrics(&store, &query);

        assert_eq!(snapshot.kpi_data.total_processed, 4);
        assert!(!snapshot.monthly_distribution.contains_key("Batch Sheets"));
        assert!(!snapshot
            .person_folder_breakdown["John Smith"]
            .contains_key("Batch Sheets"));
        // The excluded folder still counts toward active days.
        assert_eq!(snapshot.active_days.people["John Smith"], 3);
        assert_eq!(snapshot.active_days.folders["Batch Sheets"], 1);
    }

    #[test]
    fn workday_window_restricts_totals() {
        let mut query = month_query(2025, 6);
        query.workdays_to_include = Some([day(2025, 6, 2)].into_iter().collect());
        let snapshot = compute_metrics(&sample_store(), &query);
        assert_eq!(snapshot.kpi_data.total_processed, 3);
        assert_eq!(snapshot.active_days.people["John Smith"], 1);
    }

    #[test]
    fn consistency_is_population_std_dev() {
        let snapshot = compute_metrics(&sample_store(), &month_query(2025, 6));
        // Daily totals 3 and 1: mean 2, population std dev 1.
        assert!((snapshot.consistency_scores["John Smith"] - 1.0).abs() < 1e-9);

        let mut store = AggregateStore::default();
        store.set_count("AB", "Registry", day(2025, 6, 2), 5);
        let snapshot = compute_metrics(&store, &month_query(2025, 6));
        assert_eq!(snapshot.consistency_scores["AB"], 0.0);
    }

    #[test]
    fn busiest_day_and_peak_use_deterministic_tie_breaks() {
        let mut store = sample_store();
        store.set_count("Ann Jones", "Registry", day(2025, 6, 3), 3);

        let snapshot = compute_metrics(&store, &month_query(2025, 6));
        // Day totals: June 2nd = 3, June 3rd = 1 + 3 = 4.
        assert_eq!(snapshot.kpi_data.busiest_day.as_deref(), Some("Tuesday 3rd"));

        // Peak count 3 is shared by Ann Jones (3rd) and John Smith (2nd);
        // the lexicographically-first person wins.
        let peak = snapshot.kpi_data.peak_performance.unwrap();
        assert_eq!(peak.person, "Ann Jones");
        assert_eq!(peak.count, 3);
    }

    #[test]
    fn avg_kpis_divide_by_contributors() {
        let mut store = sample_store();
        store.set_count("Ann Jones", "Registry", day(2025, 6, 2), 5);

        let snapshot = compute_metrics(&store, &month_query(2025, 6));
        // Totals: John 4, Ann 5 over two people.
        assert!((snapshot.kpi_data.avg_per_person - 4.5).abs() < 1e-9);
        // June 2: 8 across two contributors -> 4; June 3: 1 across one -> 1.
        assert!((snapshot.kpi_data.avg_daily_per_person - 2.5).abs() < 1e-9);
    }

    #[test]
    fn forecast_scales_by_remaining_workdays() {
        let holidays = BTreeSet::new();
        // 40 processed over the first 10 workdays of a 21-workday June.
        let forecast = forecast_total(40, 2025, 6, day(2025, 6, 13), &holidays).unwrap();
        assert!((forecast - 84.0).abs() < 1e-9);
        assert_eq!(forecast_total(40, 2025, 6, day(2025, 6, 1), &holidays), None);
    }

    #[test]
    fn forecast_is_attached_when_today_is_known() {
        let mut query = month_query(2025, 6);
        query.today = Some(day(2025, 6, 3));
        let snapshot = compute_metrics(&sample_store(), &query);
        // 4 items over 2 elapsed workdays, 21 in the month.
        let forecast = snapshot.kpi_data.forecasted_total.unwrap();
        assert!((forecast - 42.0).abs() < 1e-9);
    }

    #[test]
    fn comparison_truncates_the_prior_month() {
        let mut store = sample_store();
        // May activity: 2 on each of the first four workdays (1,2,5,6).
        for d in [1, 2, 5, 6] {
            store.set_count("John Smith", "Audit Office", day(2025, 5, d), 2);
        }

        let mut query = month_query(2025, 6);
        query.today = Some(day(2025, 6, 3));
        let (current, prior) = compute_month_comparison(&store, &query);
        let prior = prior.unwrap();

        assert_eq!(current.kpi_data.total_processed, 4);
        // Two elapsed workdays in June, so May is cut to its first two
        // workdays (May 1 and 2) rather than the full month.
        assert_eq!(prior.kpi_data.total_processed, 4);
    }

    #[test]
    fn ordinal_labels() {
        assert_eq!(weekday_ordinal(day(2025, 6, 2)), "Monday 2nd");
        assert_eq!(weekday_ordinal(day(2025, 6, 1)), "Sunday 1st");
        assert_eq!(weekday_ordinal(day(2025, 6, 11)), "Wednesday 11th");
        assert_eq!(weekday_ordinal(day(2025, 6, 13)), "Friday 13th");
        assert_eq!(weekday_ordinal(day(2025, 6, 23)), "Monday 23rd");
    }

    #[test]
    fn snapshot_serialises_with_camel_case_keys() {
        let snapshot = compute_metrics(&sample_store(), &month_query(2025, 6));
        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value.get("monthlyDistribution").is_some());
        assert!(value.get("kpiData").is_some());
        assert_eq!(value["kpiData"]["totalProcessed"], serde_json::json!(4));
    }
}
