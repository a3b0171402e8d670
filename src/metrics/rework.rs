use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::PullRequest;

use super::stats::{calculate_stats, group_by_date, percentage, Stats};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrRework {
    pub pr_number: u64,
    pub title: String,
    pub repository: String,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub total_commits: usize,
    /// Commits authored after the PR was opened
    pub additional_commits: usize,
    pub force_push_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRework {
    pub date: String,
    pub pr_count: usize,
    pub additional_commits: Stats,
    pub avg_force_push_count: Option<f64>,
    pub force_push_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReworkRateMetrics {
    pub pr_count: usize,
    pub total_additional_commits: usize,
    pub additional_commits: Stats,
    pub total_force_pushes: u64,
    pub prs_with_force_push: usize,
    /// Percentage of PRs force-pushed at least once
    pub force_push_rate: Option<f64>,
    pub daily: Vec<DailyRework>,
    pub details: Vec<PrRework>,
}

fn pr_rework(pr: &PullRequest) -> PrRework {
    let additional_commits = pr
        .commits
        .iter()
        .filter(|c| c.committed_at.is_some_and(|at| at > pr.created_at))
        .count();

    PrRework {
        pr_number: pr.number,
        title: pr.title.clone(),
        repository: pr.repository.clone(),
        created_at: pr.created_at,
        merged_at: pr.merged_at,
        total_commits: pr.commits.len(),
        additional_commits,
        force_push_count: pr.force_push_count,
    }
}

#[allow(clippy::cast_precision_loss)]
fn additional_commit_values(rows: &[&PrRework]) -> Vec<f64> {
    rows.iter().map(|r| r.additional_commits as f64).collect()
}

fn force_pushed(rows: &[&PrRework]) -> usize {
    rows.iter().filter(|r| r.force_push_count > 0).count()
}

/// Rework indicators over every PR, open ones included.
///
/// The daily breakdown is keyed by merge date, so unmerged PRs only count
/// towards the totals.
pub fn calculate_rework_rate(pull_requests: &[PullRequest]) -> ReworkRateMetrics {
    let details: Vec<PrRework> = pull_requests.iter().map(pr_rework).collect();

    if details.is_empty() {
        return ReworkRateMetrics::default();
    }

    let rows: Vec<&PrRework> = details.iter().collect();
    let prs_with_force_push = force_pushed(&rows);

    let daily = group_by_date(&details, |row| row.merged_at)
        .into_iter()
        .map(|(date, rows)| {
            let force_pushes: Vec<f64> = rows
                .iter()
                .map(|r| f64::from(r.force_push_count))
                .collect();
            DailyRework {
                date,
                pr_count: rows.len(),
                additional_commits: calculate_stats(&additional_commit_values(&rows)),
                avg_force_push_count: calculate_stats(&force_pushes).avg,
                force_push_rate: percentage(force_pushed(&rows), rows.len()),
            }
        })
        .collect();

    ReworkRateMetrics {
        pr_count: details.len(),
        total_additional_commits: details.iter().map(|r| r.additional_commits).sum(),
        additional_commits: calculate_stats(&additional_commit_values(&rows)),
        total_force_pushes: details.iter().map(|r| u64::from(r.force_push_count)).sum(),
        prs_with_force_push,
        force_push_rate: percentage(prs_with_force_push, details.len()),
        daily,
        details,
    }
}
