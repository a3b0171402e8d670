use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{DoraLensError, Result};

/// An issue that work is tracked against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    /// Repository in `owner/repo` form
    pub repository: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Numbers of pull requests linked to (closing or referencing) this issue
    #[serde(default)]
    pub linked_prs: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Closed,
}

/// A commit contained in a pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub committed_at: Option<DateTime<Utc>>,
}

/// A pull request snapshot as produced by a data source adapter.
///
/// Carries the branch/merge data needed for chain tracking plus the activity
/// data consumed by the extended metrics (commits, size, review timeline).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub state: PrState,
    pub repository: String,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub base_branch: Option<String>,
    pub head_branch: Option<String>,
    pub merge_commit_sha: Option<String>,
    #[serde(default)]
    pub commits: Vec<Commit>,
    #[serde(default)]
    pub additions: Option<u64>,
    #[serde(default)]
    pub deletions: Option<u64>,
    #[serde(default)]
    pub changed_files: Option<u64>,
    #[serde(default)]
    pub force_push_count: u32,
    /// When the PR left draft state; adapters fall back to `created_at`
    #[serde(default)]
    pub ready_for_review_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub first_review_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }

    /// The minimal view used by chain tracking.
    pub fn to_ref(&self) -> PullRequestRef {
        PullRequestRef {
            number: self.number,
            base_branch: self.base_branch.clone(),
            head_branch: self.head_branch.clone(),
            merged_at: self.merged_at,
            merge_commit_id: self.merge_commit_sha.clone(),
        }
    }
}

/// Branch and merge information of a single pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub number: u64,
    pub base_branch: Option<String>,
    pub head_branch: Option<String>,
    pub merged_at: Option<DateTime<Utc>>,
    pub merge_commit_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Success,
    Failure,
    Error,
    #[serde(other)]
    Other,
}

impl DeploymentStatus {
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failure | Self::Error)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub environment: String,
    pub created_at: DateTime<Utc>,
    pub status: Option<DeploymentStatus>,
    #[serde(default)]
    pub repository: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunConclusion {
    Success,
    Failure,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub conclusion: Option<RunConclusion>,
    #[serde(default)]
    pub repository: String,
}

/// Everything fetched for one repository and one period.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub repository: String,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub pull_requests: Vec<PullRequest>,
    #[serde(default)]
    pub deployments: Vec<Deployment>,
    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRun>,
}

impl Snapshot {
    /// Reads a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid snapshot.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&contents)?;

        if snapshot.repository.trim().is_empty() {
            return Err(DoraLensError::InvalidSnapshot(format!(
                "{} has no repository name",
                path.display()
            )));
        }

        Ok(snapshot)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
