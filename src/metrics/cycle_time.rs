use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::Issue;
use crate::tracking::{select_best, track_to_production, PrFetcher};

use super::stats::{calculate_stats, elapsed_hours, Stats};

/// Cycle time of one issue: issue creation to the production merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueCycleTime {
    pub issue_number: u64,
    pub title: String,
    pub repository: String,
    pub issue_created_at: DateTime<Utc>,
    pub production_merged_at: Option<DateTime<Utc>>,
    pub cycle_time_hours: Option<f64>,
    /// Path taken by the winning chain, e.g. `#10 → #25 → #40`
    pub pr_chain: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleTimeMetrics {
    pub completed_count: usize,
    pub stats: Stats,
    /// Issues that reached production
    pub details: Vec<IssueCycleTime>,
    /// Issues with linked PRs that never reached production, kept for diagnostics
    pub unresolved: Vec<IssueCycleTime>,
}

/// Builds the detail row for one issue by tracking each linked PR and keeping
/// the chain that reached production first.
pub fn issue_cycle_time<F>(issue: &Issue, fetcher: &F, production_pattern: &str) -> IssueCycleTime
where
    F: PrFetcher + ?Sized,
{
    let results = issue.linked_prs.iter().map(|&number| {
        let result = track_to_production(fetcher, number, production_pattern);
        Some(result).filter(|r| !r.pr_chain.is_empty())
    });
    let best = select_best(results);

    if !best.reached_production() {
        debug!(
            "Issue #{} has not reached production (chain: {})",
            issue.number,
            best.chain_summary()
        );
    }

    IssueCycleTime {
        issue_number: issue.number,
        title: issue.title.clone(),
        repository: issue.repository.clone(),
        issue_created_at: issue.created_at,
        production_merged_at: best.production_merged_at,
        cycle_time_hours: best
            .production_merged_at
            .map(|merged_at| elapsed_hours(issue.created_at, merged_at)),
        pr_chain: best.chain_summary(),
    }
}

/// Cycle time across issues. Issues without linked PRs are skipped.
pub fn calculate_cycle_time<F>(issues: &[Issue], fetcher: &F, production_pattern: &str) -> CycleTimeMetrics
where
    F: PrFetcher + ?Sized,
{
    let (details, unresolved): (Vec<IssueCycleTime>, Vec<IssueCycleTime>) = issues
        .iter()
        .filter(|issue| !issue.linked_prs.is_empty())
        .map(|issue| issue_cycle_time(issue, fetcher, production_pattern))
        .partition(|row| row.cycle_time_hours.is_some());

    let hours: Vec<f64> = details.iter().filter_map(|row| row.cycle_time_hours).collect();

    CycleTimeMetrics {
        completed_count: details.len(),
        stats: calculate_stats(&hours),
        details,
        unresolved,
    }
}
