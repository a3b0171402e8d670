use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::{Deployment, DeploymentStatus, PullRequest, RunConclusion, WorkflowRun};

use super::stats::{hours_between, percentage, round_one_decimal};

/// A deployment observed within this window after a merge is attributed to it.
const LEAD_TIME_DEPLOY_WINDOW_HOURS: i64 = 24;

/// Where a DORA figure was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Deployments,
    WorkflowRuns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyTier {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl FrequencyTier {
    /// Classifies a deploys-per-day ratio.
    pub fn classify(frequency: f64) -> Self {
        if frequency >= 1.0 {
            Self::Daily
        } else if frequency >= 1.0 / 7.0 {
            Self::Weekly
        } else if frequency >= 1.0 / 30.0 {
            Self::Monthly
        } else {
            Self::Yearly
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentFrequency {
    pub count: usize,
    pub period_days: u32,
    /// Deploys per day, unrounded
    pub frequency: f64,
    pub tier: FrequencyTier,
    pub source: DataSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadTimeSource {
    /// Merge to the first successful deployment after it
    Deployment,
    /// PR creation to merge
    PullRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadTimeDetail {
    pub pr_number: u64,
    pub repository: String,
    pub merged_at: DateTime<Utc>,
    pub deployed_at: Option<DateTime<Utc>>,
    pub hours: f64,
    pub source: LeadTimeSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadTime {
    pub pr_count: usize,
    pub hours: Option<f64>,
    pub details: Vec<LeadTimeDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeFailureRate {
    pub total: usize,
    pub failed: usize,
    /// Percentage of failed deployments, `None` when nothing was deployed
    pub rate: Option<f64>,
    pub source: DataSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanTimeToRecovery {
    pub recoveries: usize,
    pub hours: Option<f64>,
    pub source: DataSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoraMetrics {
    pub deployment_frequency: DeploymentFrequency,
    pub lead_time: LeadTime,
    pub change_failure_rate: ChangeFailureRate,
    pub mean_time_to_recovery: MeanTimeToRecovery,
}

/// Inputs shared by the four DORA calculators.
#[derive(Debug, Clone, Copy)]
pub struct DoraInputs<'a> {
    pub pull_requests: &'a [PullRequest],
    pub deployments: &'a [Deployment],
    pub workflow_runs: &'a [WorkflowRun],
    pub period_days: u32,
    pub production_environment: &'a str,
    pub deploy_workflow_patterns: &'a [String],
}

pub fn calculate_dora(inputs: &DoraInputs<'_>) -> DoraMetrics {
    DoraMetrics {
        deployment_frequency: calculate_deployment_frequency(
            inputs.deployments,
            inputs.workflow_runs,
            inputs.deploy_workflow_patterns,
            inputs.period_days,
        ),
        lead_time: calculate_lead_time(inputs.pull_requests, inputs.deployments),
        change_failure_rate: calculate_change_failure_rate(
            inputs.deployments,
            inputs.workflow_runs,
            inputs.production_environment,
            inputs.deploy_workflow_patterns,
        ),
        mean_time_to_recovery: calculate_mttr(
            inputs.deployments,
            inputs.workflow_runs,
            inputs.production_environment,
            inputs.deploy_workflow_patterns,
        ),
    }
}

/// Case-insensitive substring match against any non-empty pattern.
pub fn is_deploy_workflow(name: &str, patterns: &[String]) -> bool {
    let name = name.to_lowercase();
    patterns
        .iter()
        .filter(|p| !p.is_empty())
        .any(|p| name.contains(&p.to_lowercase()))
}

fn deploy_runs<'a>(
    runs: &'a [WorkflowRun],
    patterns: &'a [String],
) -> impl Iterator<Item = &'a WorkflowRun> {
    runs.iter().filter(move |run| is_deploy_workflow(&run.name, patterns))
}

/// Deployments into the production environment that finished with a definite outcome.
fn production_deployments<'a>(
    deployments: &'a [Deployment],
    production_environment: &str,
) -> Vec<&'a Deployment> {
    let environment = production_environment.to_lowercase();
    deployments
        .iter()
        .filter(|d| !environment.is_empty() && d.environment.to_lowercase().contains(&environment))
        .filter(|d| {
            matches!(
                d.status,
                Some(DeploymentStatus::Success | DeploymentStatus::Failure | DeploymentStatus::Error)
            )
        })
        .collect()
}

/// Successful deployments per day.
///
/// Workflow runs are only consulted when no deployment succeeded.
#[allow(clippy::cast_precision_loss)]
pub fn calculate_deployment_frequency(
    deployments: &[Deployment],
    runs: &[WorkflowRun],
    deploy_workflow_patterns: &[String],
    period_days: u32,
) -> DeploymentFrequency {
    let successful = deployments
        .iter()
        .filter(|d| d.status == Some(DeploymentStatus::Success))
        .count();

    let (count, source) = if successful > 0 {
        (successful, DataSource::Deployments)
    } else {
        let from_runs = deploy_runs(runs, deploy_workflow_patterns)
            .filter(|run| run.conclusion == Some(RunConclusion::Success))
            .count();
        debug!("No successful deployments, counted {from_runs} deploy workflow runs instead");
        (from_runs, DataSource::WorkflowRuns)
    };

    let period_days = period_days.max(1);
    let frequency = count as f64 / f64::from(period_days);

    DeploymentFrequency {
        count,
        period_days,
        frequency,
        tier: FrequencyTier::classify(frequency),
        source,
    }
}

/// Average hours from merge to production for merged PRs.
///
/// A PR uses merge to the first successful deployment when that deployment
/// happens within 24 hours of the merge, and its creation to merge otherwise.
#[allow(clippy::cast_precision_loss)]
pub fn calculate_lead_time(pull_requests: &[PullRequest], deployments: &[Deployment]) -> LeadTime {
    let mut successful: Vec<DateTime<Utc>> = deployments
        .iter()
        .filter(|d| d.status == Some(DeploymentStatus::Success))
        .map(|d| d.created_at)
        .collect();
    successful.sort_unstable();

    let window = Duration::hours(LEAD_TIME_DEPLOY_WINDOW_HOURS);
    let mut raw_hours = Vec::new();
    let mut details = Vec::new();

    for pr in pull_requests {
        let Some(merged_at) = pr.merged_at else {
            continue;
        };

        let first_deploy = successful
            .iter()
            .copied()
            .find(|deployed_at| *deployed_at >= merged_at)
            .filter(|deployed_at| *deployed_at - merged_at <= window);

        let (hours, source) = match first_deploy {
            Some(deployed_at) => (hours_between(merged_at, deployed_at), LeadTimeSource::Deployment),
            None => (hours_between(pr.created_at, merged_at), LeadTimeSource::PullRequest),
        };

        raw_hours.push(hours);
        details.push(LeadTimeDetail {
            pr_number: pr.number,
            repository: pr.repository.clone(),
            merged_at,
            deployed_at: first_deploy,
            hours: round_one_decimal(hours),
            source,
        });
    }

    if raw_hours.is_empty() {
        return LeadTime::default();
    }

    let avg = raw_hours.iter().sum::<f64>() / raw_hours.len() as f64;
    LeadTime {
        pr_count: raw_hours.len(),
        hours: Some(round_one_decimal(avg)),
        details,
    }
}

/// Share of failed production deployments.
///
/// Falls back to deploy workflow runs when no production deployment exists.
pub fn calculate_change_failure_rate(
    deployments: &[Deployment],
    runs: &[WorkflowRun],
    production_environment: &str,
    deploy_workflow_patterns: &[String],
) -> ChangeFailureRate {
    let production = production_deployments(deployments, production_environment);

    if !production.is_empty() {
        let failed = production
            .iter()
            .filter(|d| d.status.is_some_and(DeploymentStatus::is_failure))
            .count();
        return ChangeFailureRate {
            total: production.len(),
            failed,
            rate: percentage(failed, production.len()),
            source: DataSource::Deployments,
        };
    }

    let runs: Vec<&WorkflowRun> = deploy_runs(runs, deploy_workflow_patterns).collect();
    let failed = runs
        .iter()
        .filter(|run| run.conclusion == Some(RunConclusion::Failure))
        .count();

    ChangeFailureRate {
        total: runs.len(),
        failed,
        rate: percentage(failed, runs.len()),
        source: DataSource::WorkflowRuns,
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Outcome {
    Success,
    Failure,
    Neutral,
}

/// Average hours from a failure to the next success.
///
/// A later failure before any success restarts the open window. Windows that
/// never close are ignored; `hours` is `None` when none closed.
#[allow(clippy::cast_precision_loss)]
pub fn calculate_mttr(
    deployments: &[Deployment],
    runs: &[WorkflowRun],
    production_environment: &str,
    deploy_workflow_patterns: &[String],
) -> MeanTimeToRecovery {
    let production = production_deployments(deployments, production_environment);

    let (mut events, source): (Vec<(DateTime<Utc>, Outcome)>, DataSource) = if production.is_empty() {
        let events = deploy_runs(runs, deploy_workflow_patterns)
            .map(|run| {
                let outcome = match run.conclusion {
                    Some(RunConclusion::Success) => Outcome::Success,
                    Some(RunConclusion::Failure) => Outcome::Failure,
                    _ => Outcome::Neutral,
                };
                (run.created_at, outcome)
            })
            .collect();
        (events, DataSource::WorkflowRuns)
    } else {
        let events = production
            .iter()
            .map(|d| {
                let outcome = match d.status {
                    Some(DeploymentStatus::Success) => Outcome::Success,
                    Some(status) if status.is_failure() => Outcome::Failure,
                    _ => Outcome::Neutral,
                };
                (d.created_at, outcome)
            })
            .collect();
        (events, DataSource::Deployments)
    };

    // Stable sort keeps input order for simultaneous events
    events.sort_by_key(|(at, _)| *at);

    let mut recovery_hours = Vec::new();
    let mut open_failure: Option<DateTime<Utc>> = None;

    for (at, outcome) in events {
        match outcome {
            Outcome::Failure => open_failure = Some(at),
            Outcome::Success => {
                if let Some(failed_at) = open_failure.take() {
                    recovery_hours.push(hours_between(failed_at, at));
                }
            }
            Outcome::Neutral => {}
        }
    }

    let hours = if recovery_hours.is_empty() {
        None
    } else {
        let avg = recovery_hours.iter().sum::<f64>() / recovery_hours.len() as f64;
        Some(round_one_decimal(avg))
    };

    MeanTimeToRecovery {
        recoveries: recovery_hours.len(),
        hours,
        source,
    }
}
