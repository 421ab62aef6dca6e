use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod count;
mod dates;
mod metrics;
mod models;
mod reduce;
mod report;
mod store;
mod trend;
mod workdays;

use metrics::MetricsQuery;
use store::AggregateStore;
use trend::{Granularity, TrendMode, TrendQuery};

#[derive(Parser)]
#[command(name = "ecm-throughput")]
#[command(about = "Folder throughput aggregation for Objective ECM scrapes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty aggregate store file
    InitStore {
        #[arg(long, default_value = "store.json")]
        store: PathBuf,
    },
    /// Ingest a CSV of scraped rows into the store for one folder
    Ingest {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        folder: String,
        #[arg(long, default_value = "store.json")]
        store: PathBuf,
        /// Expected period of the scrape, as a consistency check
        #[arg(long, requires = "month")]
        year: Option<i32>,
        #[arg(long, requires = "year")]
        month: Option<u32>,
    },
    /// Overwrite one person/folder/date count with a literal value
    Correct {
        #[arg(long, default_value = "store.json")]
        store: PathBuf,
        #[arg(long)]
        person: String,
        #[arg(long)]
        folder: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        count: u32,
    },
    /// Print the metrics snapshot for one month
    Metrics {
        #[arg(long, default_value = "store.json")]
        store: PathBuf,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
        #[arg(long = "person")]
        people: Option<Vec<String>>,
        #[arg(long = "folder")]
        folders: Option<Vec<String>>,
        #[arg(long = "exclude-folder")]
        exclude_folders: Vec<String>,
        /// JSON file with an array of ISO public-holiday dates
        #[arg(long)]
        holidays: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Print a trend table over a date range
    Trend {
        #[arg(long, default_value = "store.json")]
        store: PathBuf,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long, value_enum, default_value = "daily")]
        granularity: Granularity,
        #[arg(long, value_enum, default_value = "people")]
        mode: TrendMode,
        #[arg(long = "person")]
        people: Option<Vec<String>>,
        #[arg(long = "folder")]
        folders: Option<Vec<String>>,
        #[arg(long = "exclude-folder")]
        exclude_folders: Vec<String>,
        #[arg(long)]
        show_total: bool,
        #[arg(long)]
        omit_empty: bool,
    },
    /// Generate a markdown report for one month
    Report {
        #[arg(long, default_value = "store.json")]
        store: PathBuf,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
        #[arg(long)]
        holidays: Option<PathBuf>,
        #[arg(long = "exclude-folder")]
        exclude_folders: Vec<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn load_holidays(path: Option<&Path>) -> anyhow::Result<BTreeSet<NaiveDate>> {
    let Some(path) = path else {
        return Ok(BTreeSet::new());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read holidays file {}", path.display()))?;
    let dates: Vec<NaiveDate> = serde_json::from_str(&raw)
        .with_context(|| format!("holidays file {} is not a JSON date array", path.display()))?;
    Ok(dates.into_iter().collect())
}

fn read_rows(path: &Path) -> anyhow::Result<Vec<models::RawRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut rows = Vec::new();
    for result in reader.deserialize::<models::RawRow>() {
        rows.push(result.context("malformed CSV row")?);
    }
    Ok(rows)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitStore { store } => {
            AggregateStore::default().save(&store)?;
            println!("Empty store written to {}.", store.display());
        }
        Commands::Ingest {
            csv,
            folder,
            store: store_path,
            year,
            month,
        } => {
            let rows = read_rows(&csv)?;
            let outcome = reduce::reduce_rows(&rows);

            let mut store = if store_path.exists() {
                AggregateStore::load(&store_path)?
            } else {
                AggregateStore::default()
            };
            let default_period = year.zip(month);
            let merged =
                store.merge_scrape(&folder, &outcome.person_data, default_period, Utc::now());
            store.save(&store_path)?;

            println!(
                "Merged {merged} entries into \"{folder}\" ({} rows processed, {} skipped).",
                outcome.processed, outcome.skipped
            );
            if let Some(range) = outcome.date_range {
                println!(
                    "Dates {} to {} across weeks {}.",
                    range.earliest,
                    range.latest,
                    outcome.weeks_covered.join(", ")
                );
            }
        }
        Commands::Correct {
            store: store_path,
            person,
            folder,
            date,
            count,
        } => {
            let mut store = AggregateStore::load(&store_path)?;
            store.set_count(&person, &folder, date, count);
            store.save(&store_path)?;
            println!("Set {person} / {folder} / {date} to {count}.");
        }
        Commands::Metrics {
            store,
            year,
            month,
            people,
            folders,
            exclude_folders,
            holidays,
            json,
        } => {
            let store = AggregateStore::load(&store)?;
            let query = MetricsQuery {
                year,
                month,
                people,
                folders,
                exclude_folders: exclude_folders.into_iter().collect(),
                workdays_to_include: None,
                today: Some(Utc::now().date_naive()),
                holidays: load_holidays(holidays.as_deref())?,
            };
            let snapshot = metrics::compute_metrics(&store, &query);

            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                return Ok(());
            }

            let kpi = &snapshot.kpi_data;
            println!("Total processed: {}", kpi.total_processed);
            println!("Average per person: {:.1}", kpi.avg_per_person);
            if let Some(top) = &kpi.top_performer {
                println!("Top performer: {top}");
            }
            if let Some(busiest) = &kpi.busiest_day {
                println!("Busiest day: {busiest}");
            }
            if let Some(forecast) = kpi.forecasted_total {
                println!("Forecast to month end: {forecast:.0}");
            }
            println!("By folder:");
            for (folder, count) in &snapshot.monthly_distribution {
                println!("- {folder}: {count}");
            }
            println!("By person:");
            for (person, count) in &snapshot.volume_breakdown {
                println!("- {person}: {count}");
            }
        }
        Commands::Trend {
            store,
            from,
            to,
            granularity,
            mode,
            people,
            folders,
            exclude_folders,
            show_total,
            omit_empty,
        } => {
            let store = AggregateStore::load(&store)?;
            let query = TrendQuery {
                mode,
                people,
                folders,
                show_total,
                start: from,
                end: to,
                exclude_folders: exclude_folders.into_iter().collect(),
                granularity,
                omit_empty_keys: omit_empty,
            };
            let series = trend::build_trend_series(&store, &query);

            if series.keys.is_empty() {
                println!("No data in this range.");
                return Ok(());
            }

            println!("{}\tTotal", series.labels.join("\t"));
            for row in &series.table_data {
                let values: Vec<String> = row.values.iter().map(u32::to_string).collect();
                println!("{}\t{}\t{}", row.label, values.join("\t"), row.total);
            }
        }
        Commands::Report {
            store,
            year,
            month,
            holidays,
            exclude_folders,
            out,
        } => {
            let store = AggregateStore::load(&store)?;
            let query = MetricsQuery {
                year,
                month,
                people: None,
                folders: None,
                exclude_folders: exclude_folders.into_iter().collect(),
                workdays_to_include: None,
                today: Some(Utc::now().date_naive()),
                holidays: load_holidays(holidays.as_deref())?,
            };
            let (current, prior) = metrics::compute_month_comparison(&store, &query);
            let report = report::build_report(year, month, &current, prior.as_ref());
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
