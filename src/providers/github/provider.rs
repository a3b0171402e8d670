use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};

use crate::auth::Token;
use crate::error::{DoraLensError, Result};
use crate::model::{Commit, Deployment, Issue, PrState, PullRequest, Snapshot, WorkflowRun};

use super::cache::PrCache;
use super::client::{GitHubClient, RetryPolicy};
use super::types::{
    GitHubCommit, GitHubDeployment, GitHubDeploymentStatus, GitHubIssue, GitHubPullRequest,
    GitHubReview, GitHubTimelineEvent, WorkflowRunsPage,
};

/// Concurrent detail requests per repository.
const MAX_CONCURRENT_REQUESTS: usize = 8;

/// What to fetch for one repository.
#[derive(Debug, Clone)]
pub struct FetchOptions<'a> {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    /// Only fetch issues carrying all of these labels
    pub labels: &'a [String],
    pub production_environment: &'a str,
}

impl FetchOptions<'_> {
    fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.since && at <= self.until
    }
}

/// Review timeline facts gathered from the PR's timeline and reviews.
#[derive(Debug, Default)]
struct ReviewActivity {
    ready_for_review_at: Option<DateTime<Utc>>,
    force_push_count: u32,
    first_review_at: Option<DateTime<Utc>>,
    approved_at: Option<DateTime<Utc>>,
}

/// Collects a [`Snapshot`] of one GitHub repository.
///
/// Pull request details (commits, reviews, timeline) need several requests
/// per PR; those of closed PRs are served from [`PrCache`] when unchanged.
pub struct GitHubProvider {
    client: GitHubClient,
    repository: String,
    cache: PrCache,
}

impl GitHubProvider {
    /// Creates a provider for `repository` (`owner/repo`).
    ///
    /// # Errors
    ///
    /// Returns an error if the repository is not in `owner/repo` form, the
    /// base URL is invalid, or the cache directory cannot be created.
    pub fn new(
        base_url: &str,
        repository: &str,
        token: Option<Token>,
        retry: RetryPolicy,
        use_cache: bool,
    ) -> Result<Self> {
        let parts: Vec<&str> = repository.split('/').collect();
        if parts.len() != 2 || parts.iter().any(|p| p.trim().is_empty()) {
            return Err(DoraLensError::Config(format!(
                "Repository '{repository}' must be in format 'owner/repo'"
            )));
        }

        Ok(Self {
            client: GitHubClient::new(base_url, token, retry)?,
            repository: repository.to_string(),
            cache: PrCache::new(repository, use_cache)?,
        })
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Fetches issues, pull requests, deployments and workflow runs for the period.
    ///
    /// # Errors
    ///
    /// Returns an error if a listing request fails after retries. Failures on
    /// per-PR detail requests are logged and the PR is kept with partial data.
    pub async fn fetch_snapshot(&self, options: &FetchOptions<'_>) -> Result<Snapshot> {
        info!("[{}] Fetching data since {}", self.repository, options.since.date_naive());

        let pull_requests = self.fetch_pull_requests(options).await?;
        let issues = self.fetch_issues(options).await?;
        let deployments = self.fetch_deployments(options).await?;
        let workflow_runs = self.fetch_workflow_runs(options).await?;

        info!(
            "[{}] {} issues, {} PRs, {} deployments, {} workflow runs",
            self.repository,
            issues.len(),
            pull_requests.len(),
            deployments.len(),
            workflow_runs.len()
        );

        Ok(Snapshot {
            repository: self.repository.clone(),
            issues,
            pull_requests,
            deployments,
            workflow_runs,
        })
    }

    async fn fetch_pull_requests(&self, options: &FetchOptions<'_>) -> Result<Vec<PullRequest>> {
        let url = self.client.repo_url(
            &self.repository,
            "pulls",
            &[("state", "all"), ("sort", "updated"), ("direction", "desc")],
        )?;

        // Sorted by last update, so everything after a stale page is older
        let since = options.since;
        let listed = self
            .client
            .get_pages::<Vec<GitHubPullRequest>, _>(&url, |page| {
                page.last().is_some_and(|pr| pr.updated_at < since)
            })
            .await?;

        let in_period: Vec<GitHubPullRequest> = listed
            .into_iter()
            .filter(|pr| {
                options.contains(pr.created_at) || pr.merged_at.is_some_and(|m| options.contains(m))
            })
            .collect();

        info!(
            "[{}] Fetching details for {} pull requests...",
            self.repository,
            in_period.len()
        );

        let detailed: Vec<(DateTime<Utc>, PullRequest)> = stream::iter(in_period)
            .map(|listing| async move {
                let updated_at = listing.updated_at;
                let pr = match self.cache.get(listing.number, updated_at) {
                    Some(cached) => cached,
                    None => self.fetch_pull_request_details(listing).await,
                };
                (updated_at, pr)
            })
            .buffered(MAX_CONCURRENT_REQUESTS)
            .collect()
            .await;

        if let Err(e) = self.cache.save(&detailed) {
            warn!("[{}] Failed to save pull request cache: {e}", self.repository);
        }

        Ok(detailed.into_iter().map(|(_, pr)| pr).collect())
    }

    async fn fetch_pull_request_details(&self, listing: GitHubPullRequest) -> PullRequest {
        let number = listing.number;

        let (detail, commits, activity) = futures::join!(
            self.fetch_pull_request(number),
            self.fetch_commits(number),
            self.fetch_review_activity(number),
        );

        let pr = detail.unwrap_or_else(|e| {
            warn!("[{}] Failed to fetch PR #{number}: {e}", self.repository);
            listing
        });

        let commits = commits.unwrap_or_else(|e| {
            warn!("[{}] Failed to fetch commits for PR #{number}: {e}", self.repository);
            Vec::new()
        });

        self.to_pull_request(pr, commits, activity)
    }

    async fn fetch_pull_request(&self, number: u64) -> Result<GitHubPullRequest> {
        let url = self
            .client
            .repo_url(&self.repository, &format!("pulls/{number}"), &[])?;
        self.client.get_json(&url).await
    }

    async fn fetch_commits(&self, number: u64) -> Result<Vec<Commit>> {
        let url = self
            .client
            .repo_url(&self.repository, &format!("pulls/{number}/commits"), &[])?;
        let commits = self
            .client
            .get_pages::<Vec<GitHubCommit>, _>(&url, |_| false)
            .await?;

        Ok(commits
            .into_iter()
            .map(|c| Commit {
                committed_at: c.committed_at(),
                sha: c.sha,
            })
            .collect())
    }

    async fn fetch_reviews(&self, number: u64) -> Result<Vec<GitHubReview>> {
        let url = self
            .client
            .repo_url(&self.repository, &format!("pulls/{number}/reviews"), &[])?;
        self.client
            .get_pages::<Vec<GitHubReview>, _>(&url, |_| false)
            .await
    }

    /// Timeline of an issue or pull request.
    async fn fetch_timeline(&self, number: u64) -> Result<Vec<GitHubTimelineEvent>> {
        let url = self
            .client
            .repo_url(&self.repository, &format!("issues/{number}/timeline"), &[])?;
        self.client
            .get_pages::<Vec<GitHubTimelineEvent>, _>(&url, |_| false)
            .await
    }

    async fn fetch_review_activity(&self, number: u64) -> ReviewActivity {
        let (reviews, timeline) =
            futures::join!(self.fetch_reviews(number), self.fetch_timeline(number));

        let mut activity = ReviewActivity::default();

        match reviews {
            Ok(reviews) => {
                let (first_review_at, approved_at) = review_times(&reviews);
                activity.first_review_at = first_review_at;
                activity.approved_at = approved_at;
            }
            Err(e) => warn!(
                "[{}] Failed to fetch reviews for PR #{number}: {e}",
                self.repository
            ),
        }

        match timeline {
            Ok(events) => {
                activity.ready_for_review_at = events
                    .iter()
                    .filter(|e| e.event.as_deref() == Some("ready_for_review"))
                    .filter_map(|e| e.created_at)
                    .max();
                activity.force_push_count = count_u32(
                    events
                        .iter()
                        .filter(|e| e.event.as_deref() == Some("head_ref_force_pushed"))
                        .count(),
                );
            }
            Err(e) => warn!(
                "[{}] Failed to fetch timeline for PR #{number}: {e}",
                self.repository
            ),
        }

        activity
    }

    fn to_pull_request(
        &self,
        pr: GitHubPullRequest,
        commits: Vec<Commit>,
        activity: ReviewActivity,
    ) -> PullRequest {
        PullRequest {
            number: pr.number,
            title: pr.title,
            author: pr.user.map_or_else(|| "unknown".to_string(), |u| u.login),
            state: if pr.state == "open" {
                PrState::Open
            } else {
                PrState::Closed
            },
            repository: self.repository.clone(),
            ready_for_review_at: activity.ready_for_review_at.or(Some(pr.created_at)),
            created_at: pr.created_at,
            merged_at: pr.merged_at,
            base_branch: Some(pr.base.ref_),
            head_branch: Some(pr.head.ref_),
            merge_commit_sha: pr.merge_commit_sha,
            commits,
            additions: pr.additions,
            deletions: pr.deletions,
            changed_files: pr.changed_files,
            force_push_count: activity.force_push_count,
            first_review_at: activity.first_review_at,
            approved_at: activity.approved_at,
        }
    }

    async fn fetch_issues(&self, options: &FetchOptions<'_>) -> Result<Vec<Issue>> {
        let since = options.since.to_rfc3339();
        let labels = options.labels.join(",");
        let mut query = vec![("state", "all"), ("since", since.as_str())];
        if !labels.is_empty() {
            query.push(("labels", labels.as_str()));
        }

        let url = self.client.repo_url(&self.repository, "issues", &query)?;
        let listed = self
            .client
            .get_pages::<Vec<GitHubIssue>, _>(&url, |_| false)
            .await?;

        // The issues endpoint also lists pull requests
        let issues: Vec<GitHubIssue> = listed
            .into_iter()
            .filter(|issue| issue.pull_request.is_none() && options.contains(issue.created_at))
            .collect();

        debug!(
            "[{}] Resolving linked PRs for {} issues",
            self.repository,
            issues.len()
        );

        let issues: Vec<Issue> = stream::iter(issues)
            .map(|issue| async move {
                let linked_prs = self.fetch_linked_prs(issue.number).await.unwrap_or_else(|e| {
                    warn!(
                        "[{}] Failed to fetch timeline for issue #{}: {e}",
                        self.repository, issue.number
                    );
                    Vec::new()
                });

                Issue {
                    number: issue.number,
                    title: issue.title,
                    repository: self.repository.clone(),
                    created_at: issue.created_at,
                    labels: issue.labels.into_iter().map(|l| l.name).collect(),
                    linked_prs,
                }
            })
            .buffered(MAX_CONCURRENT_REQUESTS)
            .collect()
            .await;

        Ok(issues)
    }

    async fn fetch_linked_prs(&self, issue_number: u64) -> Result<Vec<u64>> {
        let events = self.fetch_timeline(issue_number).await?;
        Ok(linked_pr_numbers(&events, &self.repository))
    }

    async fn fetch_deployments(&self, options: &FetchOptions<'_>) -> Result<Vec<Deployment>> {
        let url = self.client.repo_url(
            &self.repository,
            "deployments",
            &[("environment", options.production_environment)],
        )?;

        // Deployments are listed newest first
        let since = options.since;
        let listed = self
            .client
            .get_pages::<Vec<GitHubDeployment>, _>(&url, |page| {
                page.last().is_some_and(|d| d.created_at < since)
            })
            .await?;

        let in_period: Vec<GitHubDeployment> = listed
            .into_iter()
            .filter(|d| options.contains(d.created_at))
            .collect();

        debug!(
            "[{}] Fetching status for {} deployments",
            self.repository,
            in_period.len()
        );

        let deployments: Vec<Deployment> = stream::iter(in_period)
            .map(|deployment| async move {
                let latest = self.fetch_latest_status(deployment.id).await.unwrap_or_else(|e| {
                    warn!(
                        "[{}] Failed to fetch status for deployment {}: {e}",
                        self.repository, deployment.id
                    );
                    None
                });
                deployment.into_deployment(&self.repository, latest.as_ref())
            })
            .buffered(MAX_CONCURRENT_REQUESTS)
            .collect()
            .await;

        Ok(deployments)
    }

    async fn fetch_latest_status(&self, deployment_id: u64) -> Result<Option<GitHubDeploymentStatus>> {
        let url = self.client.repo_url(
            &self.repository,
            &format!("deployments/{deployment_id}/statuses"),
            &[("per_page", "1")],
        )?;
        let statuses: Vec<GitHubDeploymentStatus> = self.client.get_json(&url).await?;
        Ok(statuses.into_iter().next())
    }

    async fn fetch_workflow_runs(&self, options: &FetchOptions<'_>) -> Result<Vec<WorkflowRun>> {
        let created = format!(">={}", options.since.format("%Y-%m-%d"));
        let url = self
            .client
            .repo_url(&self.repository, "actions/runs", &[("created", created.as_str())])?;

        let runs = self
            .client
            .get_pages::<WorkflowRunsPage, _>(&url, |_| false)
            .await?;

        Ok(runs
            .into_iter()
            .filter(|run| options.contains(run.created_at))
            .map(|run| run.into_workflow_run(&self.repository))
            .collect())
    }
}

/// First submitted review and first approval, in submission order.
fn review_times(reviews: &[GitHubReview]) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let mut submitted: Vec<(&str, DateTime<Utc>)> = reviews
        .iter()
        .filter_map(|r| r.submitted_at.map(|at| (r.state.as_str(), at)))
        .collect();
    submitted.sort_by_key(|(_, at)| *at);

    let first_review_at = submitted.first().map(|(_, at)| *at);
    let approved_at = submitted
        .iter()
        .find(|(state, _)| *state == "APPROVED")
        .map(|(_, at)| *at);

    (first_review_at, approved_at)
}

/// Pull requests of `repository` cross-referenced from an issue timeline.
fn linked_pr_numbers(events: &[GitHubTimelineEvent], repository: &str) -> Vec<u64> {
    let mut numbers: Vec<u64> = events
        .iter()
        .filter(|e| e.event.as_deref() == Some("cross-referenced"))
        .filter_map(|e| e.source.as_ref()?.issue.as_ref())
        .filter(|issue| issue.pull_request.is_some())
        .filter(|issue| {
            issue
                .repository
                .as_ref()
                .map_or(true, |r| r.full_name.eq_ignore_ascii_case(repository))
        })
        .map(|issue| issue.number)
        .collect();

    numbers.sort_unstable();
    numbers.dedup();
    numbers
}

fn count_u32(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}
