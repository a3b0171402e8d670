use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::PullRequest;

use super::stats::{calculate_stats, group_by_date, Stats};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrSize {
    pub pr_number: u64,
    pub title: String,
    pub repository: String,
    pub merged_at: DateTime<Utc>,
    pub additions: u64,
    pub deletions: u64,
    pub lines_of_code: u64,
    pub files_changed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPrSize {
    pub date: String,
    pub pr_count: usize,
    pub lines_of_code: Stats,
    pub files_changed: Stats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrSizeMetrics {
    pub pr_count: usize,
    pub total_lines_of_code: u64,
    pub total_files_changed: u64,
    pub lines_of_code: Stats,
    pub files_changed: Stats,
    pub daily: Vec<DailyPrSize>,
    pub details: Vec<PrSize>,
}

/// Size of a merged PR. `None` for unmerged PRs and PRs without size data.
pub fn pr_size(pr: &PullRequest) -> Option<PrSize> {
    let merged_at = pr.merged_at?;
    let additions = pr.additions?;
    let deletions = pr.deletions?;

    Some(PrSize {
        pr_number: pr.number,
        title: pr.title.clone(),
        repository: pr.repository.clone(),
        merged_at,
        additions,
        deletions,
        lines_of_code: additions + deletions,
        files_changed: pr.changed_files.unwrap_or(0),
    })
}

#[allow(clippy::cast_precision_loss)]
fn size_stats<'a>(rows: impl IntoIterator<Item = &'a PrSize>) -> (Stats, Stats) {
    let (lines, files): (Vec<f64>, Vec<f64>) = rows
        .into_iter()
        .map(|r| (r.lines_of_code as f64, r.files_changed as f64))
        .unzip();
    (calculate_stats(&lines), calculate_stats(&files))
}

pub fn calculate_pr_size(pull_requests: &[PullRequest]) -> PrSizeMetrics {
    let details: Vec<PrSize> = pull_requests.iter().filter_map(pr_size).collect();

    if details.is_empty() {
        return PrSizeMetrics::default();
    }

    let daily = group_by_date(&details, |row| Some(row.merged_at))
        .into_iter()
        .map(|(date, rows)| {
            let (lines_of_code, files_changed) = size_stats(rows.iter().copied());
            DailyPrSize {
                date,
                pr_count: rows.len(),
                lines_of_code,
                files_changed,
            }
        })
        .collect();

    let (lines_of_code, files_changed) = size_stats(&details);

    PrSizeMetrics {
        pr_count: details.len(),
        total_lines_of_code: details.iter().map(|r| r.lines_of_code).sum(),
        total_files_changed: details.iter().map(|r| r.files_changed).sum(),
        lines_of_code,
        files_changed,
        daily,
        details,
    }
}
