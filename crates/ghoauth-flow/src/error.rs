//! Error types for the OAuth web flow crate.
//!
//! Every fallible step of the flow surfaces through [`AuthError`]. Variants
//! are grouped by the stage that failed so callers can tell a configuration
//! problem from a network failure or a malformed provider response.
//!
//! Rejected callback requests (forged state, favicon requests, missing code)
//! are deliberately absent here: the listener answers them and logs them,
//! but they never reach the orchestrator. See
//! [`CallbackRejection`](crate::callback::CallbackRejection).

/// Unified error type for the OAuth web flow.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Configuration is missing or malformed.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// A request to the provider could not be constructed.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// Why the request could not be built.
        reason: String,
    },

    /// An HTTP exchange with the provider failed at the transport level.
    #[error("failed to {stage}: {source}")]
    Transport {
        /// The step that failed, e.g. `send access token request`.
        stage: &'static str,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The token endpoint answered with a body that is not a token response.
    #[error("failed to decode access token response: {source}")]
    Decode {
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The provider rejected the authorization code.
    #[error("invalid grant: {reason}")]
    InvalidGrant {
        /// Explanation from the provider.
        reason: String,
    },

    /// The callback listener stopped before delivering a code.
    #[error("callback listener closed before an authorization code arrived")]
    ListenerClosed,

    /// No valid callback arrived before the deadline.
    #[error("callback timed out after {timeout_secs} seconds")]
    CallbackTimeout {
        /// How many seconds we waited before giving up.
        timeout_secs: u64,
    },

    /// The system random number generator failed.
    #[error("system random number generator failed")]
    Random,

    /// I/O error (e.g. from the callback TCP listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthError {
    /// Whether the failure happened on the wire rather than in the payload.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Whether the provider answered with something we could not decode.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
