//! GitHub client error types.

/// Unified error type for the GitHub client.
#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    /// The repository reference could not be parsed.
    #[error("invalid repository `{input}`: expected owner/name or a GitHub URL")]
    InvalidRepository { input: String },

    /// The request never completed.
    #[error("GitHub API request `{operation}` failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// GitHub answered with a non-success status.
    #[error("GitHub API returned {status} for `{operation}`: {message}")]
    Api {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// The response body was not the expected JSON.
    #[error("failed to parse GitHub API response for `{operation}`: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the GitHub crate.
pub type Result<T> = std::result::Result<T, GitHubError>;
