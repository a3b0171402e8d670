use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{DoraLensError, Result};
use crate::model::{PrState, PullRequest};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedPullRequest {
    /// `updated_at` of the listing the details were fetched for
    updated_at: DateTime<Utc>,
    pull_request: PullRequest,
}

/// Pull request detail cache.
///
/// Closed pull requests rarely change, so their commits, reviews and timeline
/// are kept between runs. Entries are invalidated when GitHub reports a newer
/// `updated_at`. One file per repository:
/// - Linux: `~/.cache/doralens/github/{owner-repo}.json`
/// - macOS: `~/Library/Caches/doralens/github/{owner-repo}.json`
pub struct PrCache {
    cache_file: PathBuf,
    entries: HashMap<u64, CachedPullRequest>,
    enabled: bool,
}

impl PrCache {
    /// Loads the cache for `repository` (`owner/repo`).
    ///
    /// # Errors
    ///
    /// Returns error if the cache directory cannot be determined or created.
    pub fn new(repository: &str, enabled: bool) -> Result<Self> {
        if !enabled {
            debug!("Pull request cache disabled");
            return Ok(Self::disabled());
        }

        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| DoraLensError::Cache("No cache directory found".into()))?
            .join("doralens")
            .join("github");

        let cache = Self::load_from_dir(cache_dir, repository)?;
        info!("Pull request cache enabled at: {}", cache.cache_file.display());
        Ok(cache)
    }

    fn disabled() -> Self {
        Self {
            cache_file: PathBuf::new(),
            entries: HashMap::new(),
            enabled: false,
        }
    }

    fn load_from_dir(cache_dir: PathBuf, repository: &str) -> Result<Self> {
        fs::create_dir_all(&cache_dir)?;

        let cache_file = cache_dir.join(repository.replace('/', "-") + ".json");

        let entries = if cache_file.exists() {
            fs::read_to_string(&cache_file)
                .ok()
                .and_then(|content| serde_json::from_str(&content).ok())
                .inspect(|_| debug!("Loaded cache from: {}", cache_file.display()))
                .unwrap_or_else(|| {
                    warn!("Failed to load cache, starting with empty cache");
                    HashMap::new()
                })
        } else {
            HashMap::new()
        };

        Ok(Self {
            cache_file,
            entries,
            enabled: true,
        })
    }

    /// Cached details of PR `number`, if they were fetched at `updated_at`.
    pub fn get(&self, number: u64, updated_at: DateTime<Utc>) -> Option<PullRequest> {
        if !self.enabled {
            return None;
        }

        self.entries
            .get(&number)
            .filter(|cached| cached.updated_at == updated_at)
            .map(|cached| {
                debug!("Cache hit for PR #{number}");
                cached.pull_request.clone()
            })
    }

    /// Replaces the cache file with the closed PRs among `pull_requests`.
    ///
    /// Each item pairs the details with the `updated_at` they were fetched at.
    pub fn save(&self, pull_requests: &[(DateTime<Utc>, PullRequest)]) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let cache: HashMap<u64, CachedPullRequest> = pull_requests
            .iter()
            .filter(|(_, pr)| pr.state == PrState::Closed)
            .map(|(updated_at, pr)| {
                (
                    pr.number,
                    CachedPullRequest {
                        updated_at: *updated_at,
                        pull_request: pr.clone(),
                    },
                )
            })
            .collect();

        let content = serde_json::to_string(&cache)?;
        fs::write(&self.cache_file, content)?;

        debug!(
            "Saved {} pull requests to cache: {}",
            cache.len(),
            self.cache_file.display()
        );

        Ok(())
    }
}
