use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::model::PullRequestRef;

use super::fetcher::PrFetcher;

/// Maximum number of pull requests followed from a starting PR.
pub const MAX_CHAIN_DEPTH: usize = 5;

/// One pull request visited while tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrChainItem {
    pub pr_number: u64,
    pub base_branch: Option<String>,
    pub head_branch: Option<String>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl From<&PullRequestRef> for PrChainItem {
    fn from(pr: &PullRequestRef) -> Self {
        Self {
            pr_number: pr.number,
            base_branch: pr.base_branch.clone(),
            head_branch: pr.head_branch.clone(),
            merged_at: pr.merged_at,
        }
    }
}

/// Outcome of tracking one starting PR.
///
/// `pr_chain` is the visited path, oldest first. When `production_merged_at`
/// is set, the last chain item is the production merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackResult {
    pub production_merged_at: Option<DateTime<Utc>>,
    pub pr_chain: Vec<PrChainItem>,
}

impl TrackResult {
    pub fn reached_production(&self) -> bool {
        self.production_merged_at.is_some()
    }

    /// Human-readable path, e.g. `#10 → #25 → #40`.
    pub fn chain_summary(&self) -> String {
        self.pr_chain
            .iter()
            .map(|item| format!("#{}", item.pr_number))
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

#[derive(Clone, Copy)]
enum TrackState {
    Tracking(u64),
    FoundProduction(DateTime<Utc>),
    DeadEnd,
}

/// Case-insensitive substring match. An empty pattern never matches.
pub fn is_production_branch(branch: &str, production_pattern: &str) -> bool {
    if production_pattern.is_empty() {
        return false;
    }
    branch
        .to_lowercase()
        .contains(&production_pattern.to_lowercase())
}

/// Follows a change from `start_pr` until it is merged into a branch matching
/// `production_pattern`, the chain dead-ends, or [`MAX_CHAIN_DEPTH`] PRs have
/// been visited.
///
/// The next PR is found first through the merge commit, then through the
/// optional branch fallback. Fetch failures end the chain; the partial chain
/// is still returned.
pub fn track_to_production<F>(fetcher: &F, start_pr: u64, production_pattern: &str) -> TrackResult
where
    F: PrFetcher + ?Sized,
{
    let mut pr_chain = Vec::with_capacity(MAX_CHAIN_DEPTH);
    let mut state = TrackState::Tracking(start_pr);

    for _ in 0..MAX_CHAIN_DEPTH {
        let TrackState::Tracking(current) = state else {
            break;
        };
        state = track_step(fetcher, current, production_pattern, &mut pr_chain);
    }

    match state {
        TrackState::FoundProduction(merged_at) => TrackResult {
            production_merged_at: Some(merged_at),
            pr_chain,
        },
        TrackState::Tracking(next) => {
            debug!("Stopped at depth {MAX_CHAIN_DEPTH} before PR #{next} (started at #{start_pr})");
            TrackResult {
                production_merged_at: None,
                pr_chain,
            }
        }
        TrackState::DeadEnd => TrackResult {
            production_merged_at: None,
            pr_chain,
        },
    }
}

fn track_step<F>(
    fetcher: &F,
    current: u64,
    production_pattern: &str,
    pr_chain: &mut Vec<PrChainItem>,
) -> TrackState
where
    F: PrFetcher + ?Sized,
{
    let pr = match fetcher.get_pr(current) {
        Ok(Some(pr)) => pr,
        Ok(None) => {
            warn!("PR #{current} not found, chain ends");
            return TrackState::DeadEnd;
        }
        Err(e) => {
            warn!("Failed to fetch PR #{current}: {e}");
            return TrackState::DeadEnd;
        }
    };

    pr_chain.push(PrChainItem::from(&pr));

    let Some(merged_at) = pr.merged_at else {
        debug!("PR #{current} is not merged, chain ends");
        return TrackState::DeadEnd;
    };

    if pr
        .base_branch
        .as_deref()
        .is_some_and(|base| is_production_branch(base, production_pattern))
    {
        info!(
            "Found production merge: PR #{} → {} at {merged_at}",
            pr.number,
            pr.base_branch.as_deref().unwrap_or_default()
        );
        return TrackState::FoundProduction(merged_at);
    }

    match find_next_pr(fetcher, &pr, merged_at) {
        Some(next) => TrackState::Tracking(next),
        None => TrackState::DeadEnd,
    }
}

fn find_next_pr<F>(fetcher: &F, pr: &PullRequestRef, merged_at: DateTime<Utc>) -> Option<u64>
where
    F: PrFetcher + ?Sized,
{
    if let Some(commit_id) = pr.merge_commit_id.as_deref() {
        match fetcher.find_pr_by_commit(commit_id, pr.number) {
            Ok(Some(next)) if next != pr.number => {
                debug!("PR #{} → PR #{next} via merge commit {commit_id}", pr.number);
                return Some(next);
            }
            Ok(_) => {}
            Err(e) => warn!("Commit lookup for PR #{} failed: {e}", pr.number),
        }
    }

    if !fetcher.supports_branch_fallback() {
        return None;
    }
    let base_branch = pr.base_branch.as_deref()?;

    debug!(
        "Commit tracking failed for PR #{}, trying branch fallback: head=\"{base_branch}\"",
        pr.number
    );
    match fetcher.find_next_pr_by_branch(base_branch, merged_at) {
        Ok(Some(next)) if next.number != pr.number => {
            debug!(
                "PR #{} → PR #{} via branch fallback ({})",
                pr.number,
                next.number,
                next.base_branch.as_deref().unwrap_or("unknown")
            );
            Some(next.number)
        }
        Ok(_) => None,
        Err(e) => {
            warn!("Branch lookup for PR #{} failed: {e}", pr.number);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DoraLensError, Result};
    use chrono::TimeZone;
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn pr(number: u64, head: &str, base: &str, merged_day: Option<u32>) -> PullRequestRef {
        PullRequestRef {
            number,
            base_branch: Some(base.to_string()),
            head_branch: Some(head.to_string()),
            merged_at: merged_day.map(at),
            merge_commit_id: Some(format!("sha{number}")),
        }
    }

    #[derive(Default)]
    struct StubFetcher {
        prs: HashMap<u64, PullRequestRef>,
        commit_to_pr: HashMap<String, u64>,
        branch_prs: HashMap<String, PullRequestRef>,
        branch_fallback: bool,
        failing_prs: HashSet<u64>,
        commit_lookup_fails: bool,
        calls: RefCell<Vec<String>>,
    }

    impl StubFetcher {
        fn with_prs(prs: Vec<PullRequestRef>) -> Self {
            Self {
                prs: prs.into_iter().map(|p| (p.number, p)).collect(),
                ..Self::default()
            }
        }

        fn link_commit(mut self, from: u64, to: u64) -> Self {
            self.commit_to_pr.insert(format!("sha{from}"), to);
            self
        }

        fn link_branch(mut self, head: &str, to: u64) -> Self {
            self.branch_fallback = true;
            let target = self.prs[&to].clone();
            self.branch_prs.insert(head.to_string(), target);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl PrFetcher for StubFetcher {
        fn get_pr(&self, number: u64) -> Result<Option<PullRequestRef>> {
            self.calls.borrow_mut().push(format!("get:{number}"));
            if self.failing_prs.contains(&number) {
                return Err(DoraLensError::Api {
                    status: 502,
                    message: "bad gateway".into(),
                });
            }
            Ok(self.prs.get(&number).cloned())
        }

        fn find_pr_by_commit(&self, commit_id: &str, exclude_pr: u64) -> Result<Option<u64>> {
            self.calls.borrow_mut().push(format!("commit:{commit_id}"));
            if self.commit_lookup_fails {
                return Err(DoraLensError::Api {
                    status: 500,
                    message: "boom".into(),
                });
            }
            Ok(self
                .commit_to_pr
                .get(commit_id)
                .copied()
                .filter(|n| *n != exclude_pr))
        }

        fn supports_branch_fallback(&self) -> bool {
            self.branch_fallback
        }

        fn find_next_pr_by_branch(
            &self,
            head_branch: &str,
            _merged_after: DateTime<Utc>,
        ) -> Result<Option<PullRequestRef>> {
            self.calls.borrow_mut().push(format!("branch:{head_branch}"));
            Ok(self.branch_prs.get(head_branch).cloned())
        }
    }

    mod is_production_branch {
        use super::*;

        #[test]
        fn matches_case_insensitive_substring() {
            assert!(is_production_branch("Production", "production"));
            assert!(is_production_branch("production_server_east", "PRODUCTION"));
        }

        #[test]
        fn substring_match_accepts_look_alike_names() {
            assert!(is_production_branch("non-production-test", "production"));
        }

        #[test]
        fn empty_pattern_never_matches() {
            assert!(!is_production_branch("production", ""));
        }

        #[test]
        fn unrelated_branch_does_not_match() {
            assert!(!is_production_branch("main", "production"));
        }
    }

    mod track_to_production {
        use super::*;

        #[test]
        fn direct_production_merge() {
            let fetcher = StubFetcher::with_prs(vec![pr(100, "feature", "production", Some(2))]);

            let result = track_to_production(&fetcher, 100, "production");

            assert_eq!(result.production_merged_at, Some(at(2)));
            assert_eq!(result.pr_chain.len(), 1);
            assert_eq!(result.chain_summary(), "#100");
        }

        #[test]
        fn follows_merge_commits() {
            let fetcher = StubFetcher::with_prs(vec![
                pr(100, "feature", "develop", Some(2)),
                pr(101, "develop", "production", Some(3)),
            ])
            .link_commit(100, 101);

            let result = track_to_production(&fetcher, 100, "production");

            assert_eq!(result.production_merged_at, Some(at(3)));
            let numbers: Vec<u64> = result.pr_chain.iter().map(|i| i.pr_number).collect();
            assert_eq!(numbers, vec![100, 101]);
        }

        #[test]
        fn chain_of_five_reaches_production() {
            let fetcher = StubFetcher::with_prs(vec![
                pr(1, "feature", "develop", Some(1)),
                pr(2, "develop", "qa", Some(2)),
                pr(3, "qa", "staging", Some(3)),
                pr(4, "staging", "release", Some(4)),
                pr(5, "release", "production", Some(5)),
            ])
            .link_commit(1, 2)
            .link_commit(2, 3)
            .link_commit(3, 4)
            .link_commit(4, 5);

            let result = track_to_production(&fetcher, 1, "production");

            assert_eq!(result.production_merged_at, Some(at(5)));
            assert_eq!(result.pr_chain.len(), 5);
            assert_eq!(result.chain_summary(), "#1 → #2 → #3 → #4 → #5");
        }

        #[test]
        fn stops_at_depth_limit() {
            let fetcher = StubFetcher::with_prs(vec![
                pr(1, "a", "b", Some(1)),
                pr(2, "b", "c", Some(2)),
                pr(3, "c", "d", Some(3)),
                pr(4, "d", "e", Some(4)),
                pr(5, "e", "f", Some(5)),
                pr(6, "f", "production", Some(6)),
            ])
            .link_commit(1, 2)
            .link_commit(2, 3)
            .link_commit(3, 4)
            .link_commit(4, 5)
            .link_commit(5, 6);

            let result = track_to_production(&fetcher, 1, "production");

            assert!(result.production_merged_at.is_none());
            assert_eq!(result.pr_chain.len(), MAX_CHAIN_DEPTH);
            assert!(!fetcher.calls().contains(&"get:6".to_string()));
        }

        #[test]
        fn cyclic_links_are_bounded() {
            let fetcher = StubFetcher::with_prs(vec![
                pr(1, "a", "b", Some(1)),
                pr(2, "b", "a", Some(2)),
            ])
            .link_commit(1, 2)
            .link_commit(2, 1);

            let result = track_to_production(&fetcher, 1, "production");

            assert!(result.production_merged_at.is_none());
            assert_eq!(result.pr_chain.len(), MAX_CHAIN_DEPTH);
        }

        #[test]
        fn unmerged_pr_is_dead_end() {
            let fetcher = StubFetcher::with_prs(vec![pr(100, "feature", "main", None)]);

            let result = track_to_production(&fetcher, 100, "production");

            assert!(result.production_merged_at.is_none());
            assert_eq!(result.pr_chain.len(), 1);
            assert_eq!(fetcher.calls(), vec!["get:100"]);
        }

        #[test]
        fn unmerged_pr_into_production_is_dead_end() {
            let fetcher = StubFetcher::with_prs(vec![pr(100, "main", "production", None)]);

            let result = track_to_production(&fetcher, 100, "production");

            assert!(result.production_merged_at.is_none());
            assert_eq!(result.pr_chain.len(), 1);
        }

        #[test]
        fn missing_start_pr_gives_empty_chain() {
            let fetcher = StubFetcher::default();

            let result = track_to_production(&fetcher, 42, "production");

            assert_eq!(result, TrackResult::default());
        }

        #[test]
        fn fetch_failure_keeps_partial_chain() {
            let mut fetcher = StubFetcher::with_prs(vec![
                pr(100, "feature", "develop", Some(2)),
                pr(101, "develop", "production", Some(3)),
            ])
            .link_commit(100, 101);
            fetcher.failing_prs.insert(101);

            let result = track_to_production(&fetcher, 100, "production");

            assert!(result.production_merged_at.is_none());
            assert_eq!(result.pr_chain.len(), 1);
            assert_eq!(result.pr_chain[0].pr_number, 100);
        }

        #[test]
        fn branch_fallback_recovers_squash_merges() {
            let fetcher = StubFetcher::with_prs(vec![
                pr(100, "feature", "master", Some(2)),
                pr(101, "master", "production_server_east", Some(3)),
            ])
            .link_branch("master", 101);

            let result = track_to_production(&fetcher, 100, "production");

            assert_eq!(result.production_merged_at, Some(at(3)));
            assert_eq!(result.pr_chain.len(), 2);
        }

        #[test]
        fn three_hop_chain_through_branch_fallback() {
            let fetcher = StubFetcher::with_prs(vec![
                pr(100, "feature", "master", Some(2)),
                pr(101, "master", "staging_east", Some(3)),
                pr(102, "staging_east", "production_east", Some(4)),
            ])
            .link_branch("master", 101)
            .link_branch("staging_east", 102);

            let result = track_to_production(&fetcher, 100, "production");

            assert_eq!(result.production_merged_at, Some(at(4)));
            assert_eq!(result.chain_summary(), "#100 → #101 → #102");
        }

        #[test]
        fn branch_fallback_only_runs_when_commit_lookup_is_empty() {
            let fetcher = StubFetcher::with_prs(vec![
                pr(100, "feature", "main", Some(2)),
                pr(101, "main", "production", Some(3)),
                pr(102, "main", "production", Some(4)),
            ])
            .link_commit(100, 101)
            .link_branch("main", 102);

            let result = track_to_production(&fetcher, 100, "production");

            assert_eq!(result.production_merged_at, Some(at(3)));
            assert!(!fetcher.calls().iter().any(|c| c.starts_with("branch:")));
        }

        #[test]
        fn failing_commit_lookup_matches_absent_commit_lookup() {
            let prs = vec![
                pr(100, "feature", "main", Some(2)),
                pr(101, "main", "production", Some(3)),
            ];
            let mut failing = StubFetcher::with_prs(prs.clone()).link_branch("main", 101);
            failing.commit_lookup_fails = true;
            let absent = StubFetcher::with_prs(prs).link_branch("main", 101);

            let from_failing = track_to_production(&failing, 100, "production");
            let from_absent = track_to_production(&absent, 100, "production");

            assert_eq!(from_failing, from_absent);
            assert_eq!(from_failing.production_merged_at, Some(at(3)));
        }

        #[test]
        fn dead_end_when_no_strategy_finds_next_pr() {
            let fetcher = StubFetcher::with_prs(vec![pr(100, "feature", "main", Some(2))])
                .link_branch("other", 100);

            let result = track_to_production(&fetcher, 100, "production");

            assert!(result.production_merged_at.is_none());
            assert_eq!(result.pr_chain.len(), 1);
            assert_eq!(fetcher.calls(), vec!["get:100", "commit:sha100", "branch:main"]);
        }

        #[test]
        fn branch_fallback_returning_same_pr_is_ignored() {
            let fetcher = StubFetcher::with_prs(vec![pr(100, "main", "main", Some(2))])
                .link_branch("main", 100);

            let result = track_to_production(&fetcher, 100, "production");

            assert_eq!(result.pr_chain.len(), 1);
        }

        #[test]
        fn empty_pattern_never_finds_production() {
            let fetcher = StubFetcher::with_prs(vec![pr(100, "feature", "production", Some(2))]);

            let result = track_to_production(&fetcher, 100, "");

            assert!(result.production_merged_at.is_none());
        }
    }
}
