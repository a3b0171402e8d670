use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{PullRequest, PullRequestRef};

use super::fetcher::PrFetcher;

/// [`PrFetcher`] over pull requests that were already fetched.
///
/// Commit lookups use each PR's commit list: PR B "contains" a commit when
/// the commit appears in B's commits.
///
/// PR numbers must be unique within `pull_requests`; with duplicates, lookups
/// by number see only the last one.
pub struct SnapshotFetcher<'a> {
    pull_requests: &'a [PullRequest],
    by_number: HashMap<u64, &'a PullRequest>,
    by_commit: HashMap<&'a str, Vec<&'a PullRequest>>,
}

impl<'a> SnapshotFetcher<'a> {
    pub fn new(pull_requests: &'a [PullRequest]) -> Self {
        let by_number = pull_requests.iter().map(|pr| (pr.number, pr)).collect();

        let mut by_commit: HashMap<&'a str, Vec<&'a PullRequest>> = HashMap::new();
        for pr in pull_requests {
            for commit in &pr.commits {
                by_commit.entry(commit.sha.as_str()).or_default().push(pr);
            }
        }

        Self {
            pull_requests,
            by_number,
            by_commit,
        }
    }
}

impl PrFetcher for SnapshotFetcher<'_> {
    fn get_pr(&self, number: u64) -> Result<Option<PullRequestRef>> {
        Ok(self.by_number.get(&number).map(|pr| pr.to_ref()))
    }

    fn find_pr_by_commit(&self, commit_id: &str, exclude_pr: u64) -> Result<Option<u64>> {
        let Some(candidates) = self.by_commit.get(commit_id) else {
            return Ok(None);
        };

        // Merged PRs first, earliest merge first; unmerged ones only as a last resort
        let best = candidates
            .iter()
            .filter(|pr| pr.number != exclude_pr)
            .min_by_key(|pr| (pr.merged_at.is_none(), pr.merged_at, pr.number));

        Ok(best.map(|pr| pr.number))
    }

    fn supports_branch_fallback(&self) -> bool {
        true
    }

    fn find_next_pr_by_branch(
        &self,
        head_branch: &str,
        merged_after: DateTime<Utc>,
    ) -> Result<Option<PullRequestRef>> {
        let next = self
            .pull_requests
            .iter()
            .filter(|pr| pr.head_branch.as_deref() == Some(head_branch))
            .filter_map(|pr| pr.merged_at.map(|merged_at| (merged_at, pr)))
            .filter(|(merged_at, _)| *merged_at >= merged_after)
            .min_by_key(|(merged_at, pr)| (*merged_at, pr.number));

        Ok(next.map(|(_, pr)| pr.to_ref()))
    }
}
