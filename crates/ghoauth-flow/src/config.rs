//! Flow configuration read once at process start.
//!
//! The GitHub application identity comes from the environment (`CLIENT_ID`,
//! `CLIENT_SECRET`). Endpoint URLs default to github.com and can be
//! overridden for GitHub Enterprise or for tests.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{AuthError, Result};

/// Default GitHub authorize endpoint.
pub const DEFAULT_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";

/// Default GitHub token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";

/// Scope requested when none is configured.
pub const DEFAULT_SCOPE: &str = "repo";

/// Default time to wait for the browser callback (5 minutes).
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;

/// Environment variable names.
pub mod vars {
    pub const CLIENT_ID: &str = "CLIENT_ID";
    pub const CLIENT_SECRET: &str = "CLIENT_SECRET";
    pub const AUTHORIZE_URL: &str = "GHOAUTH_AUTHORIZE_URL";
    pub const TOKEN_URL: &str = "GHOAUTH_TOKEN_URL";
    pub const SCOPE: &str = "GHOAUTH_SCOPE";
    pub const CALLBACK_TIMEOUT_SECS: &str = "GHOAUTH_CALLBACK_TIMEOUT_SECS";
    pub const NO_BROWSER: &str = "GHOAUTH_NO_BROWSER";
}

/// Configuration for one OAuth web flow.
#[derive(Clone)]
pub struct FlowConfig {
    /// The OAuth application client ID.
    pub client_id: String,

    /// The OAuth application client secret.
    pub client_secret: String,

    /// The provider authorize endpoint.
    pub authorize_url: Url,

    /// The provider token endpoint.
    pub token_url: Url,

    /// Scope requested from the user.
    pub scope: String,

    /// How long to wait for the browser callback. `None` waits forever.
    pub callback_timeout: Option<Duration>,

    /// Whether to try launching a browser on the authorize URL.
    pub open_browser: bool,
}

impl FlowConfig {
    /// Build a configuration for the given client credentials with the
    /// default GitHub endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if either credential is empty.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Result<Self> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        require_non_empty(vars::CLIENT_ID, &client_id)?;
        require_non_empty(vars::CLIENT_SECRET, &client_secret)?;

        Ok(Self {
            client_id,
            client_secret,
            authorize_url: parse_endpoint(vars::AUTHORIZE_URL, DEFAULT_AUTHORIZE_URL)?,
            token_url: parse_endpoint(vars::TOKEN_URL, DEFAULT_TOKEN_URL)?,
            scope: DEFAULT_SCOPE.to_string(),
            callback_timeout: Some(Duration::from_secs(DEFAULT_CALLBACK_TIMEOUT_SECS)),
            open_browser: true,
        })
    }

    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if a required variable is missing
    /// or any value is malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if a required variable is missing
    /// or any value is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::new(
            get(vars::CLIENT_ID).unwrap_or_default(),
            get(vars::CLIENT_SECRET).unwrap_or_default(),
        )?;

        if let Some(raw) = get(vars::AUTHORIZE_URL) {
            config.authorize_url = parse_endpoint(vars::AUTHORIZE_URL, &raw)?;
        }
        if let Some(raw) = get(vars::TOKEN_URL) {
            config.token_url = parse_endpoint(vars::TOKEN_URL, &raw)?;
        }
        if let Some(scope) = get(vars::SCOPE) {
            config.scope = scope;
        }
        if let Some(raw) = get(vars::CALLBACK_TIMEOUT_SECS) {
            let secs: u64 = raw.parse().map_err(|_| AuthError::InvalidConfig {
                reason: format!(
                    "{} must be a number of seconds, got {raw:?}",
                    vars::CALLBACK_TIMEOUT_SECS
                ),
            })?;
            config.callback_timeout = timeout_from_secs(secs);
        }
        if let Some(raw) = get(vars::NO_BROWSER) {
            config.open_browser = !is_truthy(&raw);
        }

        Ok(config)
    }
}

impl fmt::Debug for FlowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authorize_url", &self.authorize_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("scope", &self.scope)
            .field("callback_timeout", &self.callback_timeout)
            .field("open_browser", &self.open_browser)
            .finish()
    }
}

/// Convert a timeout in seconds, where `0` means no deadline.
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn require_non_empty(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AuthError::InvalidConfig {
            reason: format!("{name} is not set"),
        });
    }
    Ok(())
}

fn parse_endpoint(name: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| AuthError::InvalidConfig {
        reason: format!("{name} is not a valid URL ({raw:?}): {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AuthError::InvalidConfig {
            reason: format!("{name} must be an http(s) URL, got {raw:?}"),
        });
    }
    Ok(url)
}

fn is_truthy(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn from_lookup_defaults() {
        let config =
            FlowConfig::from_lookup(lookup(&[("CLIENT_ID", "cid"), ("CLIENT_SECRET", "csec")]))
                .unwrap();
        assert_eq!(config.client_id, "cid");
        assert_eq!(config.client_secret, "csec");
        assert_eq!(config.authorize_url.as_str(), DEFAULT_AUTHORIZE_URL);
        assert_eq!(config.token_url.as_str(), DEFAULT_TOKEN_URL);
        assert_eq!(config.scope, "repo");
        assert_eq!(config.callback_timeout, Some(Duration::from_secs(300)));
        assert!(config.open_browser);
    }

    #[test]
    fn from_lookup_missing_client_id() {
        let err = FlowConfig::from_lookup(lookup(&[("CLIENT_SECRET", "csec")])).unwrap_err();
        assert!(matches!(err, AuthError::InvalidConfig { .. }));
        assert!(err.to_string().contains("CLIENT_ID"));
    }

    #[test]
    fn from_lookup_blank_secret() {
        let err = FlowConfig::from_lookup(lookup(&[("CLIENT_ID", "cid"), ("CLIENT_SECRET", "  ")]))
            .unwrap_err();
        assert!(err.to_string().contains("CLIENT_SECRET"));
    }

    #[test]
    fn from_lookup_overrides() {
        let config = FlowConfig::from_lookup(lookup(&[
            ("CLIENT_ID", "cid"),
            ("CLIENT_SECRET", "csec"),
            ("GHOAUTH_AUTHORIZE_URL", "https://ghe.example.com/login/oauth/authorize"),
            ("GHOAUTH_TOKEN_URL", "https://ghe.example.com/login/oauth/access_token"),
            ("GHOAUTH_SCOPE", "repo,gist"),
            ("GHOAUTH_CALLBACK_TIMEOUT_SECS", "0"),
            ("GHOAUTH_NO_BROWSER", "true"),
        ]))
        .unwrap();
        assert_eq!(config.authorize_url.host_str(), Some("ghe.example.com"));
        assert_eq!(config.token_url.path(), "/login/oauth/access_token");
        assert_eq!(config.scope, "repo,gist");
        assert_eq!(config.callback_timeout, None);
        assert!(!config.open_browser);
    }

    #[test]
    fn from_lookup_rejects_bad_endpoint() {
        let err = FlowConfig::from_lookup(lookup(&[
            ("CLIENT_ID", "cid"),
            ("CLIENT_SECRET", "csec"),
            ("GHOAUTH_TOKEN_URL", "not a url"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("GHOAUTH_TOKEN_URL"));

        let err = FlowConfig::from_lookup(lookup(&[
            ("CLIENT_ID", "cid"),
            ("CLIENT_SECRET", "csec"),
            ("GHOAUTH_AUTHORIZE_URL", "ftp://github.com/authorize"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("http(s)"));
    }

    #[test]
    fn from_lookup_rejects_bad_timeout() {
        let err = FlowConfig::from_lookup(lookup(&[
            ("CLIENT_ID", "cid"),
            ("CLIENT_SECRET", "csec"),
            ("GHOAUTH_CALLBACK_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AuthError::InvalidConfig { .. }));
    }

    #[test]
    fn debug_redacts_secret() {
        let config = FlowConfig::new("cid", "super-secret").unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
