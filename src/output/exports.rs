use anyhow::Result;
use std::io::Write;

use crate::config::OutputFormat;
use crate::report::MetricsReport;

use super::summary::render_summary;

/// Writes the metrics report in the requested format.
///
/// - Summary: coloured tables for the terminal
/// - JSON: the full report including per-item details
/// - CSV: one row of aggregates per repository, for spreadsheets
pub fn export_report(
    report: &MetricsReport,
    format: OutputFormat,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Summary => {
            writeln!(output, "{}", render_summary(report))?;
            Ok(())
        }
        OutputFormat::Json => export_json(report, pretty, output),
        OutputFormat::Csv => export_csv(report, output),
    }
}

fn export_json(report: &MetricsReport, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

const CSV_HEADER: &str = "Repository,Deployments,Deployment Frequency (per day),Frequency Tier,\
Lead Time (h),Change Failure Rate (%),MTTR (h),Cycle Time Avg (h),Cycle Time Median (h),\
Issues In Production,Coding Time Avg (h),PR Cycle Time Avg (h),Time To First Review Avg (h),\
Review Duration Avg (h),Approval To Merge Avg (h),Additional Commits Avg,Force Push Rate (%),\
Lines Of Code Avg,Files Changed Avg,Health";

fn csv_value(value: Option<f64>) -> String {
    value.map_or_else(String::new, |v| format!("{v:.1}"))
}

fn csv_text(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

fn export_csv(report: &MetricsReport, output: &mut dyn Write) -> Result<()> {
    writeln!(output, "{CSV_HEADER}")?;

    for metrics in report.repositories.values() {
        let dora = &metrics.dora;
        let fields = [
            csv_text(&metrics.repository),
            dora.deployment_frequency.count.to_string(),
            format!("{:.2}", dora.deployment_frequency.frequency),
            dora.deployment_frequency.tier.as_str().to_string(),
            csv_value(dora.lead_time.hours),
            csv_value(dora.change_failure_rate.rate),
            csv_value(dora.mean_time_to_recovery.hours),
            csv_value(metrics.cycle_time.stats.avg),
            csv_value(metrics.cycle_time.stats.median),
            metrics.cycle_time.completed_count.to_string(),
            csv_value(metrics.coding_time.stats.avg),
            csv_value(metrics.pr_cycle_time.stats.avg),
            csv_value(metrics.review_efficiency.time_to_first_review.avg),
            csv_value(metrics.review_efficiency.review_duration.avg),
            csv_value(metrics.review_efficiency.time_to_merge.avg),
            csv_value(metrics.rework_rate.additional_commits.avg),
            csv_value(metrics.rework_rate.force_push_rate),
            csv_value(metrics.pr_size.lines_of_code.avg),
            csv_value(metrics.pr_size.files_changed.avg),
            metrics.health.overall.as_str().to_string(),
        ];
        writeln!(output, "{}", fields.join(","))?;
    }

    Ok(())
}
