use std::fmt::Write;

use comfy_table::{Cell, Color as TableColor};

use crate::metrics::{DataSource, HealthStatus};
use crate::report::{MetricsReport, RepositoryMetrics};

use super::styling::{bright, bright_yellow, cyan, dim, health};
use super::tables::{
    create_table, cyan_header, format_hours, format_number, format_percent, health_cell,
    stats_row, status_cell,
};

/// Issues listed in the cycle time table.
const TOP_ISSUES: usize = 10;

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn source_label(source: DataSource) -> &'static str {
    match source {
        DataSource::Deployments => "deployments",
        DataSource::WorkflowRuns => "workflow runs",
    }
}

/// Renders a human-readable summary of the metrics report.
///
/// For every repository:
/// - DORA: deployment frequency, lead time, change failure rate, MTTR
/// - Flow: cycle time, coding time, PR cycle time, review phases, rework, PR size
/// - Slowest issues with the PR chain that carried them to production
///
/// Values with a health threshold are coloured green, yellow or red.
pub(super) fn render_summary(report: &MetricsReport) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Overview");
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        dim("Repositories:"),
        bright_yellow(report.repositories.len()),
        dim("Period:"),
        bright_yellow(format!("{} days", report.period_days)),
        dim("Production branch pattern:"),
        cyan(&report.production_branch_pattern),
        dim("Generated:"),
        dim(report.generated_at.format("%Y-%m-%d %H:%M UTC")),
    );

    if report.repositories.is_empty() {
        let _ = writeln!(output, "{}", bright_yellow("No repository data found."));
        return output;
    }

    for metrics in report.repositories.values() {
        render_repository(&mut output, metrics);
    }

    output
}

fn render_repository(output: &mut String, metrics: &RepositoryMetrics) {
    let overall = metrics.health.overall;
    let _ = writeln!(
        output,
        "{} {}  {}\n",
        bright("📦"),
        cyan(&metrics.repository).bold(),
        health(format!("[{}]", overall.as_str()), overall),
    );

    render_dora(output, metrics);
    render_flow(output, metrics);
    render_cycle_time_issues(output, metrics);
}

fn render_dora(output: &mut String, metrics: &RepositoryMetrics) {
    let dora = &metrics.dora;
    let statuses = &metrics.health;

    add_section_header(output, "🚀", "DORA Metrics");

    let mut table = create_table();
    table.set_header(cyan_header(&["Metric", "Value", "Based on", "Health"]));

    let frequency = &dora.deployment_frequency;
    table.add_row(vec![
        Cell::new("Deployment frequency"),
        Cell::new(format!(
            "{} ({:.2}/day)",
            frequency.tier.as_str(),
            frequency.frequency
        )),
        Cell::new(format!(
            "{} {} in {} days",
            frequency.count,
            source_label(frequency.source),
            frequency.period_days
        )),
        Cell::new("-").fg(TableColor::DarkGrey),
    ]);

    table.add_row(vec![
        Cell::new("Lead time for changes"),
        health_cell(format_hours(dora.lead_time.hours), statuses.lead_time),
        Cell::new(format!("{} merged PRs", dora.lead_time.pr_count)),
        status_cell(statuses.lead_time),
    ]);

    let cfr = &dora.change_failure_rate;
    table.add_row(vec![
        Cell::new("Change failure rate"),
        health_cell(format_percent(cfr.rate), statuses.change_failure_rate),
        Cell::new(format!(
            "{}/{} {}",
            cfr.failed,
            cfr.total,
            source_label(cfr.source)
        )),
        status_cell(statuses.change_failure_rate),
    ]);

    let mttr = &dora.mean_time_to_recovery;
    table.add_row(vec![
        Cell::new("Mean time to recovery"),
        Cell::new(format_hours(mttr.hours)),
        Cell::new(format!(
            "{} recoveries from {}",
            mttr.recoveries,
            source_label(mttr.source)
        )),
        Cell::new("-").fg(TableColor::DarkGrey),
    ]);

    let _ = writeln!(output, "{table}\n");
}

fn render_flow(output: &mut String, metrics: &RepositoryMetrics) {
    add_section_header(output, "⏱️", "Flow Metrics");

    let mut table = create_table();
    table.set_header(cyan_header(&["Metric", "Count", "Avg", "Median", "Min", "Max"]));

    let mut cycle_row = stats_row(
        "Cycle time (issue → production)",
        metrics.cycle_time.completed_count,
        &metrics.cycle_time.stats,
        format_hours,
    );
    cycle_row[2] = health_cell(
        format_hours(metrics.cycle_time.stats.avg),
        metrics.health.cycle_time,
    );
    table.add_row(cycle_row);

    table.add_row(stats_row(
        "Coding time (issue → first PR)",
        metrics.coding_time.issue_count,
        &metrics.coding_time.stats,
        format_hours,
    ));
    table.add_row(stats_row(
        "PR cycle time (open → merge)",
        metrics.pr_cycle_time.merged_count,
        &metrics.pr_cycle_time.stats,
        format_hours,
    ));

    let review = &metrics.review_efficiency;
    let mut first_review_row = stats_row(
        "Time to first review",
        review.pr_count,
        &review.time_to_first_review,
        format_hours,
    );
    first_review_row[2] = health_cell(
        format_hours(review.time_to_first_review.avg),
        metrics.health.time_to_first_review,
    );
    table.add_row(first_review_row);
    table.add_row(stats_row(
        "Review duration",
        review.pr_count,
        &review.review_duration,
        format_hours,
    ));
    table.add_row(stats_row(
        "Approval to merge",
        review.pr_count,
        &review.time_to_merge,
        format_hours,
    ));

    let rework = &metrics.rework_rate;
    table.add_row(stats_row(
        "Additional commits per PR",
        rework.pr_count,
        &rework.additional_commits,
        format_number,
    ));

    let size = &metrics.pr_size;
    table.add_row(stats_row(
        "Lines of code per PR",
        size.pr_count,
        &size.lines_of_code,
        format_number,
    ));
    table.add_row(stats_row(
        "Files changed per PR",
        size.pr_count,
        &size.files_changed,
        format_number,
    ));

    let _ = writeln!(output, "{table}");
    let _ = writeln!(
        output,
        "  {} {} of {} PRs were force-pushed ({})\n",
        dim("Force pushes:"),
        bright_yellow(rework.prs_with_force_push),
        rework.pr_count,
        format_percent(rework.force_push_rate),
    );
}

fn render_cycle_time_issues(output: &mut String, metrics: &RepositoryMetrics) {
    let cycle_time = &metrics.cycle_time;
    if cycle_time.details.is_empty() && cycle_time.unresolved.is_empty() {
        return;
    }

    add_section_header(output, "🔗", "Slowest Issues to Production");

    let mut issues: Vec<_> = cycle_time.details.iter().collect();
    issues.sort_by(|a, b| {
        b.cycle_time_hours
            .partial_cmp(&a.cycle_time_hours)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut table = create_table();
    table.set_header(cyan_header(&["Issue", "Title", "Cycle Time", "PR Chain"]));

    for issue in issues.iter().take(TOP_ISSUES) {
        table.add_row(vec![
            Cell::new(format!("#{}", issue.issue_number)),
            Cell::new(&issue.title),
            Cell::new(format_hours(issue.cycle_time_hours)),
            Cell::new(&issue.pr_chain),
        ]);
    }

    if issues.len() > TOP_ISSUES {
        let mut row = vec![Cell::new(format!("... and {} more", issues.len() - TOP_ISSUES))
            .fg(TableColor::DarkGrey)];
        row.extend(vec![Cell::new(""); 3]);
        table.add_row(row);
    }

    let _ = writeln!(output, "{table}");

    if !cycle_time.unresolved.is_empty() {
        let _ = writeln!(
            output,
            "  {} {}",
            dim("Not yet in production:"),
            health(cycle_time.unresolved.len(), HealthStatus::Warning),
        );
    }
    let _ = writeln!(output);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::{Issue, PrState, PullRequest, Snapshot};
    use crate::report::build_report;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn merged_pr(number: u64, head: &str, base: &str, merged_at: DateTime<Utc>) -> PullRequest {
        PullRequest {
            number,
            title: format!("PR {number}"),
            author: "dev".into(),
            state: PrState::Closed,
            repository: "acme/api".into(),
            created_at: at(1, 0),
            merged_at: Some(merged_at),
            base_branch: Some(base.into()),
            head_branch: Some(head.into()),
            merge_commit_sha: None,
            commits: vec![],
            additions: Some(20),
            deletions: Some(4),
            changed_files: Some(2),
            force_push_count: 0,
            ready_for_review_at: None,
            first_review_at: None,
            approved_at: None,
        }
    }

    fn sample_report() -> MetricsReport {
        let snapshot = Snapshot {
            repository: "acme/api".into(),
            issues: vec![
                Issue {
                    number: 1,
                    title: "Checkout fails".into(),
                    repository: "acme/api".into(),
                    created_at: at(1, 0),
                    labels: vec![],
                    linked_prs: vec![10],
                },
                Issue {
                    number: 2,
                    title: "Slow search".into(),
                    repository: "acme/api".into(),
                    created_at: at(1, 0),
                    labels: vec![],
                    linked_prs: vec![20],
                },
            ],
            pull_requests: vec![
                merged_pr(10, "fix-checkout", "production", at(2, 0)),
                merged_pr(20, "search", "main", at(3, 0)),
            ],
            ..Snapshot::default()
        };

        build_report(vec![snapshot], &Config::default())
    }

    #[test]
    fn test_render_summary_without_repositories() {
        let report = build_report(vec![], &Config::default());

        let output = render_summary(&report);

        assert!(output.contains("Repositories:"));
        assert!(output.contains("No repository data found"));
    }

    #[test]
    fn test_render_summary_sections() {
        let output = render_summary(&sample_report());

        assert!(output.contains("acme/api"));
        assert!(output.contains("DORA Metrics"));
        assert!(output.contains("Deployment frequency"));
        assert!(output.contains("workflow runs"));
        assert!(output.contains("Flow Metrics"));
        assert!(output.contains("Lines of code per PR"));
    }

    #[test]
    fn test_render_summary_lists_issue_chains() {
        let output = render_summary(&sample_report());

        assert!(output.contains("Slowest Issues to Production"));
        assert!(output.contains("Checkout fails"));
        assert!(output.contains("24.0h"));
        assert!(output.contains("Not yet in production:"));
    }
}
