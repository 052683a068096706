//! GitHub REST API v3 client.
//!
//! Only what provisioning a deploy key needs. Supports both github.com and
//! GitHub Enterprise via a configurable base URL.

use ghoauth_flow::Credential;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{GitHubError, Result};
use crate::repo::RepoRef;

/// Default GitHub API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// API version pinned in every request.
const API_VERSION: &str = "2022-11-28";

/// A deploy key to add to a repository.
#[derive(Debug, Clone, Serialize)]
pub struct DeployKey {
    /// Label shown in the repository settings.
    pub title: String,
    /// The public key, e.g. `ssh-ed25519 AAAA...`.
    pub key: String,
    /// Whether the key only grants read access.
    pub read_only: bool,
}

/// A deploy key as GitHub reports it after creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedKey {
    pub id: u64,
    pub title: String,
    pub read_only: bool,
    #[serde(default)]
    pub url: Option<String>,
}

/// Authenticated GitHub API client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    credential: Credential,
    base_url: String,
    client: reqwest::Client,
}

impl GitHubClient {
    /// Create a client for api.github.com.
    pub fn new(credential: Credential) -> Self {
        Self::with_base_url(credential, DEFAULT_BASE_URL)
    }

    /// Create a client for a GitHub Enterprise instance.
    pub fn with_base_url(credential: Credential, base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ghoauth/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            credential,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Add a deploy key to `repo`.
    ///
    /// # Errors
    ///
    /// - [`GitHubError::Transport`] if the request cannot be sent or read.
    /// - [`GitHubError::Api`] if GitHub rejects it (e.g. 422 for a key that
    ///   is already in use).
    /// - [`GitHubError::Decode`] if the response is not a key object.
    pub async fn add_deploy_key(&self, repo: &RepoRef, key: &DeployKey) -> Result<CreatedKey> {
        const OPERATION: &str = "add_deploy_key";

        let url = self.api_url(&format!("/repos/{}/{}/keys", repo.owner(), repo.name()));
        debug!(url = %url, title = %key.title, read_only = key.read_only, "adding deploy key");

        let request = self.post_request(&url).json(key);
        let body = self.send_request(request, OPERATION).await?;

        let created: CreatedKey = serde_json::from_value(body)
            .map_err(|source| GitHubError::Decode { operation: OPERATION, source })?;
        info!(repository = %repo, id = created.id, title = %created.title, "deploy key added");
        Ok(created)
    }

    // -----------------------------------------------------------------------
    // HTTP helpers
    // -----------------------------------------------------------------------

    /// Build a POST request with standard GitHub headers.
    fn post_request(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", self.credential.bearer())
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Send a request and parse the JSON response.
    async fn send_request(
        &self,
        request: reqwest::RequestBuilder,
        operation: &'static str,
    ) -> Result<Value> {
        let response = request
            .send()
            .await
            .map_err(|source| GitHubError::Transport { operation, source })?;

        let status = response.status();

        let rate_remaining = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if let Some(remaining) = rate_remaining
            && remaining < 10
        {
            warn!(remaining = remaining, operation = operation, "GitHub API rate limit is low");
        }

        let body_text = response
            .text()
            .await
            .map_err(|source| GitHubError::Transport { operation, source })?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body_text)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or(body_text);
            return Err(GitHubError::Api {
                operation,
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body_text).map_err(|source| GitHubError::Decode { operation, source })
    }

    /// Build a full API URL from a path segment.
    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
