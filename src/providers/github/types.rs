use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::model::{Deployment, DeploymentStatus, RunConclusion, WorkflowRun};

/// A page body that yields a list of items.
pub trait PageItems: DeserializeOwned {
    type Item;

    fn into_items(self) -> Vec<Self::Item>;
}

impl<T: DeserializeOwned> PageItems for Vec<T> {
    type Item = T;

    fn into_items(self) -> Vec<T> {
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubBranchRef {
    #[serde(rename = "ref")]
    pub ref_: String,
}

/// Pull request as returned by the list and detail endpoints.
///
/// Size fields are only present on the detail endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubPullRequest {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub user: Option<GitHubUser>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub base: GitHubBranchRef,
    pub head: GitHubBranchRef,
    pub merge_commit_sha: Option<String>,
    #[serde(default)]
    pub additions: Option<u64>,
    #[serde(default)]
    pub deletions: Option<u64>,
    #[serde(default)]
    pub changed_files: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubGitActor {
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommitData {
    pub author: Option<GitHubGitActor>,
    pub committer: Option<GitHubGitActor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommit {
    pub sha: String,
    pub commit: GitHubCommitData,
}

impl GitHubCommit {
    /// Committer date, falling back to the author date.
    pub fn committed_at(&self) -> Option<DateTime<Utc>> {
        self.commit
            .committer
            .as_ref()
            .and_then(|c| c.date)
            .or_else(|| self.commit.author.as_ref().and_then(|a| a.date))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubReview {
    pub state: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubLabel {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepositoryRef {
    pub full_name: String,
}

/// Issue or pull request referenced from a timeline event.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubReferencedIssue {
    pub number: u64,
    /// Present only when the referenced issue is a pull request
    pub pull_request: Option<serde_json::Value>,
    pub repository: Option<GitHubRepositoryRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubEventSource {
    pub issue: Option<GitHubReferencedIssue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubTimelineEvent {
    pub event: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub source: Option<GitHubEventSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubIssue {
    pub number: u64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub labels: Vec<GitHubLabel>,
    /// Set when the "issue" is actually a pull request
    pub pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubDeployment {
    pub id: u64,
    pub environment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubDeploymentStatus {
    pub state: String,
}

impl GitHubDeployment {
    pub fn into_deployment(self, repository: &str, latest: Option<&GitHubDeploymentStatus>) -> Deployment {
        Deployment {
            environment: self.environment,
            created_at: self.created_at,
            status: latest.map(|s| deployment_status(&s.state)),
            repository: repository.to_string(),
        }
    }
}

fn deployment_status(state: &str) -> DeploymentStatus {
    match state {
        "success" => DeploymentStatus::Success,
        "failure" => DeploymentStatus::Failure,
        "error" => DeploymentStatus::Error,
        _ => DeploymentStatus::Other,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubWorkflowRun {
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub conclusion: Option<String>,
}

impl GitHubWorkflowRun {
    pub fn into_workflow_run(self, repository: &str) -> WorkflowRun {
        WorkflowRun {
            name: self.name.unwrap_or_default(),
            created_at: self.created_at,
            conclusion: self.conclusion.as_deref().map(|c| match c {
                "success" => RunConclusion::Success,
                "failure" => RunConclusion::Failure,
                _ => RunConclusion::Other,
            }),
            repository: repository.to_string(),
        }
    }
}

/// Response from GitHub API for workflow runs.
#[derive(Debug, Deserialize)]
pub struct WorkflowRunsPage {
    pub workflow_runs: Vec<GitHubWorkflowRun>,
}

impl PageItems for WorkflowRunsPage {
    type Item = GitHubWorkflowRun;

    fn into_items(self) -> Vec<GitHubWorkflowRun> {
        self.workflow_runs
    }
}
