use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Issue, PullRequest};

use super::stats::{calculate_stats, elapsed_hours, Stats};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrCycleTime {
    pub pr_number: u64,
    pub title: String,
    pub repository: String,
    pub created_at: DateTime<Utc>,
    pub merged_at: DateTime<Utc>,
    pub cycle_time_hours: f64,
    pub base_branch: Option<String>,
    pub linked_issue: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrCycleTimeMetrics {
    pub merged_count: usize,
    pub stats: Stats,
    pub details: Vec<PrCycleTime>,
}

/// PR creation to merge for every merged PR, linked to an issue or not.
pub fn calculate_pr_cycle_time(pull_requests: &[PullRequest], issues: &[Issue]) -> PrCycleTimeMetrics {
    let mut issue_of: HashMap<u64, u64> = HashMap::new();
    for issue in issues {
        for pr in &issue.linked_prs {
            issue_of.entry(*pr).or_insert(issue.number);
        }
    }

    let details: Vec<PrCycleTime> = pull_requests
        .iter()
        .filter_map(|pr| {
            let merged_at = pr.merged_at?;
            Some(PrCycleTime {
                pr_number: pr.number,
                title: pr.title.clone(),
                repository: pr.repository.clone(),
                created_at: pr.created_at,
                merged_at,
                cycle_time_hours: elapsed_hours(pr.created_at, merged_at),
                base_branch: pr.base_branch.clone(),
                linked_issue: issue_of.get(&pr.number).copied(),
            })
        })
        .collect();

    let hours: Vec<f64> = details.iter().map(|row| row.cycle_time_hours).collect();

    PrCycleTimeMetrics {
        merged_count: details.len(),
        stats: calculate_stats(&hours),
        details,
    }
}
