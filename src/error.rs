use thiserror::Error;

#[derive(Error, Debug)]
pub enum DoraLensError {
    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("API request failed with status {status} after {retries} retries")]
    ApiErrorAfterRetries { status: u16, retries: u32 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

pub type Result<T> = std::result::Result<T, DoraLensError>;
