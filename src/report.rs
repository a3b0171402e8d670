use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::hash::Hash;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::metrics::{
    calculate_coding_time, calculate_cycle_time, calculate_dora, calculate_pr_cycle_time,
    calculate_pr_size, calculate_review_efficiency, calculate_rework_rate, evaluate_health,
    exclude_base_branches, filter_issues, CodingTimeMetrics, CycleTimeMetrics, DoraInputs,
    DoraMetrics, HealthInputs, HealthReport, PrCycleTimeMetrics, PrSizeMetrics,
    ReviewEfficiencyMetrics, ReworkRateMetrics,
};
use crate::model::Snapshot;
use crate::tracking::SnapshotFetcher;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub generated_at: DateTime<Utc>,
    pub period_days: u32,
    pub production_branch_pattern: String,
    /// Metrics per repository, in the order repositories were first seen
    pub repositories: IndexMap<String, RepositoryMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryMetrics {
    pub repository: String,
    pub dora: DoraMetrics,
    pub cycle_time: CycleTimeMetrics,
    pub coding_time: CodingTimeMetrics,
    pub pr_cycle_time: PrCycleTimeMetrics,
    pub rework_rate: ReworkRateMetrics,
    pub review_efficiency: ReviewEfficiencyMetrics,
    pub pr_size: PrSizeMetrics,
    pub health: HealthReport,
}

fn owner_of(record_repository: &str, fallback: &str) -> String {
    if record_repository.trim().is_empty() {
        fallback.to_string()
    } else {
        record_repository.to_string()
    }
}

fn bucket(grouped: &mut IndexMap<String, Snapshot>, repository: String) -> &mut Snapshot {
    grouped
        .entry(repository.clone())
        .or_insert_with(|| Snapshot {
            repository,
            ..Snapshot::default()
        })
}

/// Keeps the last record per key, at the position the key was first seen.
fn dedup_by_key<T, K, F>(records: Vec<T>, key: F) -> Vec<T>
where
    K: Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut unique: IndexMap<K, T> = IndexMap::with_capacity(records.len());
    for record in records {
        unique.insert(key(&record), record);
    }
    unique.into_values().collect()
}

fn dedup_records(snapshot: &mut Snapshot) {
    let before = snapshot.issues.len()
        + snapshot.pull_requests.len()
        + snapshot.deployments.len()
        + snapshot.workflow_runs.len();

    snapshot.issues = dedup_by_key(std::mem::take(&mut snapshot.issues), |i| i.number);
    snapshot.pull_requests =
        dedup_by_key(std::mem::take(&mut snapshot.pull_requests), |pr| pr.number);
    snapshot.deployments = dedup_by_key(std::mem::take(&mut snapshot.deployments), |d| {
        (d.environment.clone(), d.created_at)
    });
    snapshot.workflow_runs = dedup_by_key(std::mem::take(&mut snapshot.workflow_runs), |r| {
        (r.name.clone(), r.created_at)
    });

    let after = snapshot.issues.len()
        + snapshot.pull_requests.len()
        + snapshot.deployments.len()
        + snapshot.workflow_runs.len();
    if after < before {
        debug!(
            "[{}] dropped {} duplicate records",
            snapshot.repository,
            before - after
        );
    }
}

/// Regroups records by their own repository field.
///
/// Records without a repository belong to the snapshot they came from.
/// Snapshots for the same repository are merged. Issues and PRs are unique
/// by number, deployments by environment and creation time, workflow runs by
/// name and creation time; the last record seen wins.
pub fn partition_by_repository(snapshots: Vec<Snapshot>) -> IndexMap<String, Snapshot> {
    let mut grouped: IndexMap<String, Snapshot> = IndexMap::new();

    for snapshot in snapshots {
        let source = snapshot.repository;
        bucket(&mut grouped, source.clone());

        for issue in snapshot.issues {
            bucket(&mut grouped, owner_of(&issue.repository, &source))
                .issues
                .push(issue);
        }
        for pr in snapshot.pull_requests {
            bucket(&mut grouped, owner_of(&pr.repository, &source))
                .pull_requests
                .push(pr);
        }
        for deployment in snapshot.deployments {
            bucket(&mut grouped, owner_of(&deployment.repository, &source))
                .deployments
                .push(deployment);
        }
        for run in snapshot.workflow_runs {
            bucket(&mut grouped, owner_of(&run.repository, &source))
                .workflow_runs
                .push(run);
        }
    }

    for snapshot in grouped.values_mut() {
        dedup_records(snapshot);
    }

    grouped
}

/// Computes every metric for one repository's records.
pub fn calculate_repository_metrics(snapshot: &Snapshot, config: &Config) -> RepositoryMetrics {
    let metrics = &config.metrics;
    let excluded = &config.exclude_branches;
    let prs = &snapshot.pull_requests;

    debug!(
        "[{}] {} issues, {} PRs, {} deployments, {} workflow runs",
        snapshot.repository,
        snapshot.issues.len(),
        prs.len(),
        snapshot.deployments.len(),
        snapshot.workflow_runs.len()
    );

    let dora = calculate_dora(&DoraInputs {
        pull_requests: prs,
        deployments: &snapshot.deployments,
        workflow_runs: &snapshot.workflow_runs,
        period_days: config.github.days,
        production_environment: &metrics.production_environment,
        deploy_workflow_patterns: &metrics.deploy_workflow_patterns,
    });

    let fetcher = SnapshotFetcher::new(prs);
    let cycle_issues = filter_issues(
        &snapshot.issues,
        prs,
        &metrics.exclude_metrics_labels,
        &excluded.cycle_time,
    );
    let cycle_time = calculate_cycle_time(&cycle_issues, &fetcher, &metrics.production_branch_pattern);

    let coding_issues = filter_issues(
        &snapshot.issues,
        prs,
        &metrics.exclude_metrics_labels,
        &excluded.coding_time,
    );
    let coding_time = calculate_coding_time(&coding_issues, prs);

    let pr_cycle_time = calculate_pr_cycle_time(prs, &snapshot.issues);
    let rework_rate = calculate_rework_rate(&exclude_base_branches(prs, &excluded.rework_rate));
    let review_efficiency =
        calculate_review_efficiency(&exclude_base_branches(prs, &excluded.review_efficiency));
    let pr_size = calculate_pr_size(&exclude_base_branches(prs, &excluded.pr_size));

    let health = evaluate_health(
        &HealthInputs {
            lead_time_hours: dora.lead_time.hours,
            change_failure_rate: dora.change_failure_rate.rate,
            cycle_time_hours: cycle_time.stats.avg,
            time_to_first_review_hours: review_efficiency.time_to_first_review.avg,
        },
        &config.health,
    );

    RepositoryMetrics {
        repository: snapshot.repository.clone(),
        dora,
        cycle_time,
        coding_time,
        pr_cycle_time,
        rework_rate,
        review_efficiency,
        pr_size,
        health,
    }
}

pub fn build_report(snapshots: Vec<Snapshot>, config: &Config) -> MetricsReport {
    let repositories: IndexMap<String, RepositoryMetrics> = partition_by_repository(snapshots)
        .into_iter()
        .map(|(name, snapshot)| {
            let metrics = calculate_repository_metrics(&snapshot, config);
            info!(
                "[{name}] computed metrics: {} issues reached production, health {}",
                metrics.cycle_time.completed_count,
                metrics.health.overall.as_str()
            );
            (name, metrics)
        })
        .collect();

    MetricsReport {
        generated_at: Utc::now(),
        period_days: config.github.days,
        production_branch_pattern: config.metrics.production_branch_pattern.clone(),
        repositories,
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::metrics::{DataSource, HealthStatus};
    use crate::model::{
        Commit, Deployment, DeploymentStatus, Issue, PrState, PullRequest, WorkflowRun,
    };
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn pr(repository: &str, number: u64, head: &str, base: &str, merged_at: DateTime<Utc>) -> PullRequest {
        PullRequest {
            number,
            title: format!("PR {number}"),
            author: "dev".into(),
            state: PrState::Closed,
            repository: repository.into(),
            created_at: at(1, 0),
            merged_at: Some(merged_at),
            base_branch: Some(base.into()),
            head_branch: Some(head.into()),
            merge_commit_sha: Some(format!("merge{number}")),
            commits: vec![],
            additions: Some(10),
            deletions: Some(5),
            changed_files: Some(2),
            force_push_count: 0,
            ready_for_review_at: None,
            first_review_at: Some(at(1, 2)),
            approved_at: None,
        }
    }

    fn issue(number: u64, labels: &[&str], linked_prs: Vec<u64>) -> Issue {
        Issue {
            number,
            title: format!("Issue {number}"),
            repository: "acme/api".into(),
            created_at: at(1, 0),
            labels: labels.iter().map(|l| (*l).to_string()).collect(),
            linked_prs,
        }
    }

    fn sample_snapshot() -> Snapshot {
        let mut release = pr("acme/api", 11, "main", "production", at(2, 0));
        release.commits.push(Commit {
            sha: "merge10".into(),
            committed_at: Some(at(1, 4)),
        });

        Snapshot {
            repository: "acme/api".into(),
            issues: vec![issue(1, &[], vec![10]), issue(2, &["exclude-metrics"], vec![10])],
            pull_requests: vec![
                pr("acme/api", 10, "feature", "main", at(1, 5)),
                release,
                pr("acme/api", 12, "docs", "docs-site", at(1, 6)),
            ],
            deployments: vec![Deployment {
                environment: "production".into(),
                created_at: at(2, 1),
                status: Some(DeploymentStatus::Success),
                repository: String::new(),
            }],
            workflow_runs: vec![],
        }
    }

    #[test]
    fn computes_all_metrics_for_a_repository() {
        let mut config = Config::default();
        config.exclude_branches.pr_size = vec!["docs".into()];

        let metrics = calculate_repository_metrics(&sample_snapshot(), &config);

        assert_eq!(metrics.dora.deployment_frequency.count, 1);
        assert_eq!(metrics.dora.deployment_frequency.source, DataSource::Deployments);
        assert_eq!(metrics.cycle_time.completed_count, 1);
        assert_eq!(metrics.cycle_time.details[0].cycle_time_hours, Some(24.0));
        assert_eq!(metrics.cycle_time.details[0].pr_chain, "#10 → #11");
        assert_eq!(metrics.coding_time.issue_count, 1);
        assert_eq!(metrics.pr_cycle_time.merged_count, 3);
        assert_eq!(metrics.pr_size.pr_count, 2);
        assert_eq!(metrics.review_efficiency.time_to_first_review.avg, Some(2.0));
        assert_eq!(metrics.health.cycle_time, Some(HealthStatus::Good));
    }

    #[test]
    fn partitions_records_by_repository_in_first_seen_order() {
        let mut snapshot = sample_snapshot();
        snapshot
            .pull_requests
            .push(pr("acme/web", 1, "feature", "main", at(3, 0)));
        snapshot.workflow_runs.push(WorkflowRun {
            name: "deploy".into(),
            created_at: at(3, 0),
            conclusion: None,
            repository: "acme/web".into(),
        });

        let grouped = partition_by_repository(vec![snapshot]);

        let names: Vec<&String> = grouped.keys().collect();
        assert_eq!(names, vec!["acme/api", "acme/web"]);
        assert_eq!(grouped["acme/api"].pull_requests.len(), 3);
        assert_eq!(grouped["acme/api"].deployments.len(), 1);
        assert_eq!(grouped["acme/web"].pull_requests.len(), 1);
        assert_eq!(grouped["acme/web"].workflow_runs.len(), 1);
    }

    #[test]
    fn merges_snapshots_of_the_same_repository() {
        let grouped = partition_by_repository(vec![sample_snapshot(), sample_snapshot()]);

        assert_eq!(grouped.len(), 1);
        let merged = &grouped["acme/api"];
        assert_eq!(merged.issues.len(), 2);
        assert_eq!(merged.pull_requests.len(), 3);
        assert_eq!(merged.deployments.len(), 1);
    }

    #[test]
    fn overlapping_snapshots_count_each_record_once() {
        let config = Config::default();
        let single = build_report(vec![sample_snapshot()], &config);
        let doubled = build_report(vec![sample_snapshot(), sample_snapshot()], &config);

        let single = &single.repositories["acme/api"];
        let doubled = &doubled.repositories["acme/api"];
        assert_eq!(doubled.dora.deployment_frequency.count, 1);
        assert_eq!(
            doubled.dora.deployment_frequency.frequency,
            single.dora.deployment_frequency.frequency
        );
        assert_eq!(doubled.pr_cycle_time.merged_count, 3);
        assert_eq!(doubled.cycle_time.completed_count, 1);
        assert_eq!(doubled.cycle_time.details.len(), 1);
    }

    #[test]
    fn later_snapshot_wins_for_duplicate_records() {
        let mut newer = sample_snapshot();
        newer.pull_requests[0].title = "Renamed".into();
        newer.workflow_runs.push(WorkflowRun {
            name: "deploy".into(),
            created_at: at(3, 0),
            conclusion: None,
            repository: String::new(),
        });

        let grouped = partition_by_repository(vec![sample_snapshot(), newer]);
        let merged = &grouped["acme/api"];

        let numbers: Vec<u64> = merged.pull_requests.iter().map(|pr| pr.number).collect();
        assert_eq!(numbers, vec![10, 11, 12]);
        assert_eq!(merged.pull_requests[0].title, "Renamed");
        assert_eq!(merged.workflow_runs.len(), 1);
    }

    #[test]
    fn empty_snapshot_gives_no_data_metrics() {
        let snapshot = Snapshot {
            repository: "acme/empty".into(),
            ..Snapshot::default()
        };

        let report = build_report(vec![snapshot], &Config::default());
        let metrics = &report.repositories["acme/empty"];

        assert!(metrics.dora.lead_time.hours.is_none());
        assert!(metrics.dora.change_failure_rate.rate.is_none());
        assert!(metrics.dora.mean_time_to_recovery.hours.is_none());
        assert!(metrics.cycle_time.stats.avg.is_none());
        assert!(metrics.pr_size.details.is_empty());
        assert_eq!(metrics.health.overall, HealthStatus::Good);
    }

    #[test]
    fn same_snapshot_gives_same_metrics() {
        let config = Config::default();
        let first = calculate_repository_metrics(&sample_snapshot(), &config);
        let second = calculate_repository_metrics(&sample_snapshot(), &config);
        assert_eq!(first, second);
    }
}
