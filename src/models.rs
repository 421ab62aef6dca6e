use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::count::CountRule;

/// One scraped table row, exactly as lifted from the source page.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRow {
    pub date_text: String,
    pub name_text: String,
    pub count_text: String,
}

/// A raw row after normalisation, kept around for audit logging only;
/// aggregation never branches on `rule`.
#[derive(Debug, Clone)]
pub struct ExtractedRow {
    pub date: NaiveDate,
    pub person: String,
    pub count: u32,
    pub rule: CountRule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub earliest: NaiveDate,
    pub latest: NaiveDate,
}

/// Output of folding one scrape session's rows.
#[derive(Debug, Default)]
pub struct ReduceOutcome {
    pub person_data: BTreeMap<String, BTreeMap<NaiveDate, u32>>,
    pub date_range: Option<DateRange>,
    pub processed: usize,
    pub skipped: usize,
    pub weeks_covered: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveDays {
    pub people: BTreeMap<String, u32>,
    pub folders: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakPerformance {
    pub person: String,
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiData {
    pub total_processed: u32,
    pub avg_per_person: f64,
    pub top_performer: Option<String>,
    pub busiest_day: Option<String>,
    pub peak_performance: Option<PeakPerformance>,
    pub avg_daily_per_person: f64,
    pub forecasted_total: Option<f64>,
}

/// Everything the dashboard needs for one year/month view. Recomputed on
/// demand from the store; never persisted.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub monthly_distribution: BTreeMap<String, u32>,
    pub volume_breakdown: BTreeMap<String, u32>,
    pub kpi_data: KpiData,
    pub active_days: ActiveDays,
    pub consistency_scores: BTreeMap<String, f64>,
    pub person_daily_totals: BTreeMap<String, BTreeMap<NaiveDate, u32>>,
    pub folder_daily_totals: BTreeMap<String, BTreeMap<NaiveDate, u32>>,
    pub person_folder_breakdown: BTreeMap<String, BTreeMap<String, u32>>,
    pub folder_person_breakdown: BTreeMap<String, BTreeMap<String, u32>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendDataset {
    pub label: String,
    pub data: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendTableRow {
    pub label: String,
    pub values: Vec<u32>,
    pub total: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSeries {
    pub labels: Vec<String>,
    pub keys: Vec<String>,
    pub datasets: Vec<TrendDataset>,
    pub table_data: Vec<TrendTableRow>,
}
