mod github;

pub use github::{FetchOptions, GitHubProvider, RetryPolicy};
