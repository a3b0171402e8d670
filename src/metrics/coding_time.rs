use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Issue, PullRequest};

use super::stats::{calculate_stats, elapsed_hours, Stats};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueCodingTime {
    pub issue_number: u64,
    pub title: String,
    pub repository: String,
    pub issue_created_at: DateTime<Utc>,
    pub first_pr_number: u64,
    pub first_pr_created_at: DateTime<Utc>,
    /// Negative when the PR was opened before the issue
    pub coding_time_hours: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodingTimeMetrics {
    /// Issues whose coding time counts towards `stats`
    pub issue_count: usize,
    pub stats: Stats,
    pub details: Vec<IssueCodingTime>,
}

/// Time from issue creation to the earliest linked PR.
///
/// Negative coding times stay in `details` but are left out of `stats`.
pub fn calculate_coding_time(issues: &[Issue], pull_requests: &[PullRequest]) -> CodingTimeMetrics {
    let by_number: HashMap<u64, &PullRequest> =
        pull_requests.iter().map(|pr| (pr.number, pr)).collect();

    let details: Vec<IssueCodingTime> = issues
        .iter()
        .filter_map(|issue| {
            let first_pr = issue
                .linked_prs
                .iter()
                .filter_map(|number| by_number.get(number))
                .min_by_key(|pr| (pr.created_at, pr.number))?;

            Some(IssueCodingTime {
                issue_number: issue.number,
                title: issue.title.clone(),
                repository: issue.repository.clone(),
                issue_created_at: issue.created_at,
                first_pr_number: first_pr.number,
                first_pr_created_at: first_pr.created_at,
                coding_time_hours: elapsed_hours(issue.created_at, first_pr.created_at),
            })
        })
        .collect();

    let hours: Vec<f64> = details
        .iter()
        .map(|row| row.coding_time_hours)
        .filter(|h| *h >= 0.0)
        .collect();

    CodingTimeMetrics {
        issue_count: hours.len(),
        stats: calculate_stats(&hours),
        details,
    }
}
