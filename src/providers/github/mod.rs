mod cache;
mod client;
mod provider;
mod types;

pub use client::RetryPolicy;
pub use provider::{FetchOptions, GitHubProvider};
