use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::auth::Token;
use crate::error::{DoraLensError, Result};

use super::types::PageItems;

const PER_PAGE: usize = 100;
const MAX_PAGES: usize = 50;

/// Retry behaviour for rate-limited and failing requests.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            delay: Duration::from_secs(10),
        }
    }
}

/// GitHub REST API client.
pub struct GitHubClient {
    client: Client,
    api_url: Url,
    token: Option<Token>,
    retry: RetryPolicy,
}

impl GitHubClient {
    pub fn new(base_url: &str, token: Option<Token>, retry: RetryPolicy) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        let client = Client::builder()
            .user_agent("DoraLens/0.3.0")
            .default_headers(headers)
            .build()
            .map_err(|e| DoraLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        // Url::join drops the last path segment unless the base ends with '/'
        let api_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| DoraLensError::Config(format!("Invalid base URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            token,
            retry,
        })
    }

    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    /// URL of `path` under `repos/{repository}/`, with query parameters.
    pub fn repo_url(&self, repository: &str, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .api_url
            .join(&format!("repos/{repository}/{path}"))
            .map_err(|e| DoraLensError::Config(format!("Invalid repository URL: {e}")))?;

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// GET a JSON document with retry on network errors, rate limits and server errors.
    pub async fn get_json<T>(&self, url: &Url) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let max_retries = self.retry.max_retries;
        let delay = self.retry.delay;
        let mut retry_count = 0;

        loop {
            let request = self.auth_request(self.client.get(url.clone()));

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
                    if retry_count >= max_retries {
                        return Err(e.into());
                    }
                    warn!(
                        "Network error ({e}), retrying in {}s ({}/{max_retries})...",
                        delay.as_secs(),
                        retry_count + 1,
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status == 429 || status.is_server_error() || is_secondary_rate_limit(&response) {
                if retry_count >= max_retries {
                    return Err(DoraLensError::ApiErrorAfterRetries {
                        status: status.as_u16(),
                        retries: max_retries,
                    });
                }

                warn!(
                    "GitHub API error (status {status}). Waiting {} seconds before retry {}/{max_retries}...",
                    delay.as_secs(),
                    retry_count + 1,
                );

                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(DoraLensError::Api {
                    status: status.as_u16(),
                    message: error_text,
                });
            }

            return Ok(response.json().await?);
        }
    }

    /// Fetch pages of `url` until a short page, `is_done` returns true, or
    /// the page cap is reached.
    pub async fn get_pages<P, F>(&self, url: &Url, mut is_done: F) -> Result<Vec<P::Item>>
    where
        P: PageItems,
        F: FnMut(&[P::Item]) -> bool,
    {
        let mut items = Vec::new();

        for page in 1..=MAX_PAGES {
            let mut page_url = url.clone();
            page_url
                .query_pairs_mut()
                .append_pair("per_page", &PER_PAGE.to_string())
                .append_pair("page", &page.to_string());

            let batch = self.get_json::<P>(&page_url).await?.into_items();
            let len = batch.len();
            let done = is_done(&batch);
            items.extend(batch);

            debug!("Fetched page {page} of {url} ({len} items)");

            if len < PER_PAGE || done {
                break;
            }
        }

        Ok(items)
    }
}

/// GitHub signals secondary rate limits with 403 and an exhausted quota header.
fn is_secondary_rate_limit(response: &reqwest::Response) -> bool {
    response.status() == 403
        && response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            == Some("0")
}
