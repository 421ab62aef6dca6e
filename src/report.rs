use std::fmt::Write;

use crate::models::MetricsSnapshot;

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "Unknown",
    }
}

fn delta_line(label: &str, current: f64, prior: f64) -> String {
    let diff = current - prior;
    let arrow = if diff > 0.0 {
        "up"
    } else if diff < 0.0 {
        "down"
    } else {
        "level"
    };
    format!("{label}: {current:.1} ({arrow} from {prior:.1} at the same point last month)")
}

pub fn build_report(
    year: i32,
    month: u32,
    snapshot: &MetricsSnapshot,
    prior: Option<&MetricsSnapshot>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Folder Throughput Report");
    let _ = writeln!(output, "Period: {} {}", month_name(month), year);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Folder Distribution");

    if snapshot.monthly_distribution.is_empty() {
        let _ = writeln!(output, "No items recorded for this period.");
    } else {
        let mut folders: Vec<(&String, &u32)> = snapshot.monthly_distribution.iter().collect();
        folders.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (folder, count) in folders {
            let days = snapshot.active_days.folders.get(folder).copied().unwrap_or(0);
            let _ = writeln!(output, "- {folder}: {count} items across {days} active days");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Volume by Person");

    if snapshot.volume_breakdown.is_empty() {
        let _ = writeln!(output, "No people with activity in this period.");
    } else {
        let mut people: Vec<(&String, &u32)> = snapshot.volume_breakdown.iter().collect();
        people.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (person, count) in people.iter().take(10) {
            let consistency = snapshot.consistency_scores.get(*person).copied().unwrap_or(0.0);
            let _ = writeln!(
                output,
                "- {person}: {count} items (consistency {consistency:.2})"
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Figures");

    let kpi = &snapshot.kpi_data;
    let _ = writeln!(output, "- Total processed: {}", kpi.total_processed);
    let _ = writeln!(output, "- Average per person: {:.1}", kpi.avg_per_person);
    let _ = writeln!(
        output,
        "- Average daily per person: {:.1}",
        kpi.avg_daily_per_person
    );
    if let Some(top) = &kpi.top_performer {
        let _ = writeln!(output, "- Top performer: {top}");
    }
    if let Some(busiest) = &kpi.busiest_day {
        let _ = writeln!(output, "- Busiest day: {busiest}");
    }
    if let Some(peak) = &kpi.peak_performance {
        let _ = writeln!(
            output,
            "- Peak single day: {} with {} on {}",
            peak.person, peak.count, peak.date
        );
    }
    if let Some(forecast) = kpi.forecasted_total {
        let _ = writeln!(output, "- Forecast to month end: {forecast:.0}");
    }

    if let Some(prior) = prior {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Versus Last Month (same workdays elapsed)");
        let _ = writeln!(
            output,
            "- {}",
            delta_line(
                "Total processed",
                kpi.total_processed as f64,
                prior.kpi_data.total_processed as f64
            )
        );
        let _ = writeln!(
            output,
            "- {}",
            delta_line(
                "Average per person",
                kpi.avg_per_person,
                prior.kpi_data.avg_per_person
            )
        );
    }

    output
}
