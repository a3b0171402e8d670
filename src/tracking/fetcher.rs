use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::PullRequestRef;

/// Pull request lookups needed to follow a change across merges.
///
/// Implementations own their transport (in-memory snapshot, REST, GraphQL);
/// chain tracking depends only on this trait. Every call is blocking and is
/// issued strictly one at a time.
pub trait PrFetcher {
    /// Looks up a pull request by number.
    ///
    /// Returns `Ok(None)` when the PR does not exist. Errors are reserved for
    /// transport or parse failures.
    fn get_pr(&self, number: u64) -> Result<Option<PullRequestRef>>;

    /// Finds a pull request whose history contains `commit_id`.
    ///
    /// Implementations must never return `exclude_pr`.
    fn find_pr_by_commit(&self, commit_id: &str, exclude_pr: u64) -> Result<Option<u64>>;

    /// Whether [`PrFetcher::find_next_pr_by_branch`] is backed by a real lookup.
    fn supports_branch_fallback(&self) -> bool {
        false
    }

    /// Finds the earliest PR merged at or after `merged_after` whose head
    /// branch equals `head_branch`.
    fn find_next_pr_by_branch(
        &self,
        _head_branch: &str,
        _merged_after: DateTime<Utc>,
    ) -> Result<Option<PullRequestRef>> {
        Ok(None)
    }
}
