use thiserror::Error;

/// Why a feed fetch did not produce a document.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to HTTP GET feed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Feed responded with HTTP status {0}")]
    Status(u16),

    #[error("Failed to read feed response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("Failed to parse feed JSON: {0}")]
    Parse(#[from] serde_json::Error),
}
