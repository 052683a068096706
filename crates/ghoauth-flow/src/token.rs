//! Authorization code to access token exchange.
//!
//! GitHub answers the token endpoint with HTTP 200 even when it rejects the
//! code, putting `error` / `error_description` in the JSON body instead. The
//! granted scopes come back as one comma-delimited string.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AuthError, Result};

/// Delimiter GitHub uses in the `scope` field of a token response.
pub const SCOPE_DELIMITER: char = ',';

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Form body of the token exchange. Built once, sent once.
#[derive(Clone, Serialize)]
pub struct AccessTokenRequest {
    client_id: String,
    client_secret: String,
    code: String,
    redirect_uri: String,
    state: String,
}

impl AccessTokenRequest {
    /// Assemble the form fields of one exchange.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        code: impl Into<String>,
        redirect_uri: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            code: code.into(),
            redirect_uri: redirect_uri.into(),
            state: state.into(),
        }
    }
}

impl fmt::Debug for AccessTokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenRequest")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("code", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("state", &self.state)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Successful token endpoint response.
///
/// `scopes` is derived from `raw_scope` while decoding and there is no way
/// to change one without the other.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawAccessTokenResponse")]
pub struct AccessTokenResponse {
    access_token: String,
    raw_scope: String,
    scopes: Vec<String>,
    token_type: String,
}

#[derive(Deserialize)]
struct RawAccessTokenResponse {
    access_token: String,
    #[serde(default)]
    scope: String,
    #[serde(default)]
    token_type: String,
}

impl From<RawAccessTokenResponse> for AccessTokenResponse {
    fn from(raw: RawAccessTokenResponse) -> Self {
        Self::new(raw.access_token, raw.scope, raw.token_type)
    }
}

impl AccessTokenResponse {
    /// Build a response, splitting `raw_scope` into [`scopes`](Self::scopes).
    pub fn new(
        access_token: impl Into<String>,
        raw_scope: impl Into<String>,
        token_type: impl Into<String>,
    ) -> Self {
        let raw_scope = raw_scope.into();
        Self {
            access_token: access_token.into(),
            scopes: split_scopes(&raw_scope),
            raw_scope,
            token_type: token_type.into(),
        }
    }

    /// The granted access token.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// The `scope` field exactly as the provider sent it.
    pub fn raw_scope(&self) -> &str {
        &self.raw_scope
    }

    /// Granted scopes in the order the provider listed them.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Token type, usually `bearer`. Empty if the provider omitted it.
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Move out the token, its type and the granted scopes.
    pub fn into_parts(self) -> (String, String, Vec<String>) {
        (self.access_token, self.token_type, self.scopes)
    }
}

impl fmt::Debug for AccessTokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenResponse")
            .field("access_token", &"<redacted>")
            .field("raw_scope", &self.raw_scope)
            .field("scopes", &self.scopes)
            .field("token_type", &self.token_type)
            .finish()
    }
}

fn split_scopes(raw: &str) -> Vec<String> {
    raw.split(SCOPE_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Error shape GitHub uses for rejected exchanges.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

impl TokenErrorResponse {
    fn reason(self) -> String {
        match self.error_description {
            Some(description) => format!("{}: {description}", self.error),
            None => self.error,
        }
    }
}

/// Decode a token endpoint body.
///
/// # Errors
///
/// - [`AuthError::InvalidGrant`] if the body is a provider error object.
/// - [`AuthError::Decode`] if the body is neither an error nor a token.
pub fn decode_response(body: &str) -> Result<AccessTokenResponse> {
    if let Ok(error) = serde_json::from_str::<TokenErrorResponse>(body) {
        return Err(AuthError::InvalidGrant {
            reason: error.reason(),
        });
    }
    serde_json::from_str(body).map_err(|source| AuthError::Decode { source })
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Sends [`AccessTokenRequest`]s to the provider token endpoint.
#[derive(Debug, Clone)]
pub struct TokenExchangeClient {
    token_url: Url,
    client: reqwest::Client,
}

impl TokenExchangeClient {
    /// Create a client posting to `token_url` through `client`.
    pub fn new(token_url: Url, client: reqwest::Client) -> Self {
        Self { token_url, client }
    }

    /// Exchange the authorization code. Never retried: the code is single-use.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidRequest`] if the request cannot be built.
    /// - [`AuthError::Transport`] if sending or reading fails.
    /// - [`AuthError::InvalidGrant`] if the provider rejects the code.
    /// - [`AuthError::Decode`] if the body is not a token response.
    pub async fn send(&self, request: &AccessTokenRequest) -> Result<AccessTokenResponse> {
        tracing::debug!(token_url = %self.token_url, "exchanging authorization code");

        let http_request = self
            .client
            .post(self.token_url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(request)
            .build()
            .map_err(|e| AuthError::InvalidRequest {
                reason: format!("failed to build access token request: {e}"),
            })?;

        let response = self
            .client
            .execute(http_request)
            .await
            .map_err(|source| AuthError::Transport {
                stage: "send access token request",
                source,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| AuthError::Transport {
            stage: "read access token response",
            source,
        })?;

        if !status.is_success() {
            let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(error) => error.reason(),
                Err(_) => format!("HTTP {status}: {body}"),
            };
            return Err(AuthError::InvalidGrant { reason });
        }

        let token = decode_response(&body)?;
        tracing::info!(scopes = ?token.scopes(), token_type = token.token_type(), "access token granted");
        Ok(token)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
