use std::collections::HashMap;

use crate::model::{Issue, PullRequest};

/// Case-insensitive partial match of `branch` against any non-empty pattern.
pub fn matches_any_branch(branch: &str, patterns: &[String]) -> bool {
    let branch = branch.to_lowercase();
    patterns
        .iter()
        .filter(|p| !p.is_empty())
        .any(|p| branch.contains(&p.to_lowercase()))
}

fn is_excluded_base(pr: &PullRequest, patterns: &[String]) -> bool {
    pr.base_branch
        .as_deref()
        .is_some_and(|base| matches_any_branch(base, patterns))
}

/// PRs whose base branch does not match any exclusion pattern.
pub fn exclude_base_branches(pull_requests: &[PullRequest], patterns: &[String]) -> Vec<PullRequest> {
    pull_requests
        .iter()
        .filter(|pr| !is_excluded_base(pr, patterns))
        .cloned()
        .collect()
}

pub fn has_excluded_label(issue: &Issue, labels: &[String]) -> bool {
    issue
        .labels
        .iter()
        .any(|label| labels.iter().any(|l| l.eq_ignore_ascii_case(label)))
}

/// Issues without any excluded label, with linked PRs into excluded base
/// branches removed.
///
/// Linked PRs missing from `pull_requests` are kept; their base branch is unknown.
pub fn filter_issues(
    issues: &[Issue],
    pull_requests: &[PullRequest],
    excluded_labels: &[String],
    excluded_branches: &[String],
) -> Vec<Issue> {
    let by_number: HashMap<u64, &PullRequest> =
        pull_requests.iter().map(|pr| (pr.number, pr)).collect();

    issues
        .iter()
        .filter(|issue| !has_excluded_label(issue, excluded_labels))
        .map(|issue| {
            let mut issue = issue.clone();
            issue.linked_prs.retain(|number| {
                by_number
                    .get(number)
                    .map_or(true, |pr| !is_excluded_base(pr, excluded_branches))
            });
            issue
        })
        .collect()
}
