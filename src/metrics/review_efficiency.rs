use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::PullRequest;

use super::stats::{calculate_stats, elapsed_hours, Stats};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrReview {
    pub pr_number: u64,
    pub title: String,
    pub repository: String,
    pub created_at: DateTime<Utc>,
    pub ready_for_review_at: DateTime<Utc>,
    pub first_review_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub time_to_first_review_hours: Option<f64>,
    pub review_duration_hours: Option<f64>,
    pub time_to_merge_hours: Option<f64>,
    pub total_time_hours: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewEfficiencyMetrics {
    pub pr_count: usize,
    pub time_to_first_review: Stats,
    pub review_duration: Stats,
    pub time_to_merge: Stats,
    pub total_time: Stats,
    pub details: Vec<PrReview>,
}

fn phase(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<f64> {
    Some(elapsed_hours(start?, end?))
}

/// Review phase durations of one PR. Each phase needs only its own endpoints.
pub fn pr_review(pr: &PullRequest) -> PrReview {
    let ready_for_review_at = pr.ready_for_review_at.unwrap_or(pr.created_at);
    let ready = Some(ready_for_review_at);

    PrReview {
        pr_number: pr.number,
        title: pr.title.clone(),
        repository: pr.repository.clone(),
        created_at: pr.created_at,
        ready_for_review_at,
        first_review_at: pr.first_review_at,
        approved_at: pr.approved_at,
        merged_at: pr.merged_at,
        time_to_first_review_hours: phase(ready, pr.first_review_at),
        review_duration_hours: phase(pr.first_review_at, pr.approved_at),
        time_to_merge_hours: phase(pr.approved_at, pr.merged_at),
        total_time_hours: phase(ready, pr.merged_at),
    }
}

fn phase_stats(details: &[PrReview], field: impl Fn(&PrReview) -> Option<f64>) -> Stats {
    let values: Vec<f64> = details.iter().filter_map(field).collect();
    calculate_stats(&values)
}

pub fn calculate_review_efficiency(pull_requests: &[PullRequest]) -> ReviewEfficiencyMetrics {
    if pull_requests.is_empty() {
        return ReviewEfficiencyMetrics::default();
    }

    let details: Vec<PrReview> = pull_requests.iter().map(pr_review).collect();

    ReviewEfficiencyMetrics {
        pr_count: details.len(),
        time_to_first_review: phase_stats(&details, |r| r.time_to_first_review_hours),
        review_duration: phase_stats(&details, |r| r.review_duration_hours),
        time_to_merge: phase_stats(&details, |r| r.time_to_merge_hours),
        total_time: phase_stats(&details, |r| r.total_time_hours),
        details,
    }
}
