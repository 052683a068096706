//! The OAuth web flow orchestrator.
//!
//! One run moves through a fixed sequence: generate a state token, bind the
//! callback listener, present the authorize URL, wait for the code, exchange
//! it, and return a [`Credential`]. Nothing is retried. A failed run has to
//! start over with a fresh state token and a fresh code.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::authorize::AuthorizationRequest;
use crate::browser::{self, Launcher};
use crate::callback::CallbackListener;
use crate::config::FlowConfig;
use crate::error::{AuthError, Result};
use crate::random::{STATE_LEN, random_string};
use crate::token::{AccessTokenRequest, TokenExchangeClient};

/// Timeout applied to the token exchange HTTP call.
const TOKEN_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent sent to the provider.
const USER_AGENT: &str = concat!("ghoauth/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// A bearer credential for subsequent provider API calls.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    token_type: String,
    scopes: Vec<String>,
}

impl Credential {
    /// Wrap a raw access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "bearer".to_string(),
            scopes: Vec::new(),
        }
    }

    /// The raw access token.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Token type as reported by the provider, usually `bearer`.
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Scopes the provider granted.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("scopes", &self.scopes)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// OAuthWebFlow
// ---------------------------------------------------------------------------

/// Runs the authorization code web flow against a loopback redirect.
#[derive(Debug)]
pub struct OAuthWebFlow {
    config: FlowConfig,
    exchange: TokenExchangeClient,
    launchers: &'static [Launcher<'static>],
}

impl OAuthWebFlow {
    /// Create a flow for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidRequest`] if the HTTP client cannot be
    /// built.
    pub fn new(config: FlowConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(TOKEN_EXCHANGE_TIMEOUT)
            .build()
            .map_err(|e| AuthError::InvalidRequest {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        let exchange = TokenExchangeClient::new(config.token_url.clone(), client);
        Ok(Self {
            config,
            exchange,
            launchers: browser::LAUNCHERS,
        })
    }

    /// Replace the platform browser launchers, tried in order when
    /// `open_browser` is set.
    pub fn with_launchers(mut self, launchers: &'static [Launcher<'static>]) -> Self {
        self.launchers = launchers;
        self
    }

    /// The configuration this flow runs with.
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Generate the state token, bind the callback listener and build the
    /// authorize URL. `login` is suggested to the provider as the account to
    /// sign in with.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Io`] if the listener cannot bind, or
    /// [`AuthError::Random`] if no state token can be generated.
    pub async fn start(&self, login: &str) -> Result<PendingAuthorization<'_>> {
        let state = random_string(STATE_LEN)?;
        let listener = CallbackListener::bind(&state).await?;

        let request = AuthorizationRequest::new(
            &self.config.client_id,
            listener.redirect_uri(),
            login,
            &self.config.scope,
            state,
        );
        let authorize_url = request.url(&self.config.authorize_url);

        tracing::debug!(
            redirect_uri = request.redirect_uri(),
            login = login,
            scope = request.scope(),
            "authorization request prepared"
        );

        Ok(PendingAuthorization {
            flow: self,
            request,
            authorize_url,
            listener,
        })
    }

    /// Run the whole flow, logging the authorize URL for the operator.
    ///
    /// # Errors
    ///
    /// Any error from [`start`](Self::start) or
    /// [`PendingAuthorization::finish`].
    pub async fn get_token(&self, login: &str) -> Result<Credential> {
        self.get_token_with(login, |url| {
            tracing::info!(url = %url, "please authorise this app at the URL below");
        })
        .await
    }

    /// Run the whole flow, handing the authorize URL to `present` before
    /// waiting for the callback. The browser is opened on a detached task
    /// when the configuration allows it.
    ///
    /// # Errors
    ///
    /// Any error from [`start`](Self::start) or
    /// [`PendingAuthorization::finish`].
    pub async fn get_token_with<F>(&self, login: &str, present: F) -> Result<Credential>
    where
        F: FnOnce(&Url),
    {
        let pending = self.start(login).await?;

        present(pending.authorize_url());
        if self.config.open_browser {
            browser::spawn_open(self.launchers, pending.authorize_url().to_string());
        }

        pending.finish().await
    }
}

// ---------------------------------------------------------------------------
// PendingAuthorization
// ---------------------------------------------------------------------------

/// A flow whose listener is up and whose authorize URL is ready.
///
/// Dropping it without calling [`finish`](Self::finish) abandons the flow
/// and releases the listener.
#[derive(Debug)]
pub struct PendingAuthorization<'a> {
    flow: &'a OAuthWebFlow,
    request: AuthorizationRequest,
    authorize_url: Url,
    listener: CallbackListener,
}

impl PendingAuthorization<'_> {
    /// The URL the user has to visit.
    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }

    /// Where the provider will redirect the browser.
    pub fn redirect_uri(&self) -> &str {
        self.request.redirect_uri()
    }

    /// The anti-forgery token of this flow.
    pub fn state(&self) -> &str {
        self.request.state()
    }

    /// Wait for the callback, exchange the code and return the credential.
    ///
    /// The listener is closed as soon as a code arrives, and on every error
    /// path.
    ///
    /// # Errors
    ///
    /// - [`AuthError::CallbackTimeout`] / [`AuthError::ListenerClosed`] while
    ///   waiting for the callback.
    /// - [`AuthError::Transport`], [`AuthError::InvalidGrant`] or
    ///   [`AuthError::Decode`] from the token exchange.
    pub async fn finish(self) -> Result<Credential> {
        let Self {
            flow,
            request,
            listener,
            ..
        } = self;
        let config = &flow.config;

        let code = listener.wait_for_code(config.callback_timeout).await?;

        let token_request = AccessTokenRequest::new(
            &config.client_id,
            &config.client_secret,
            code,
            request.redirect_uri(),
            request.state(),
        );
        let token = flow.exchange.send(&token_request).await?;

        let (access_token, token_type, scopes) = token.into_parts();
        tracing::info!(scopes = ?scopes, "OAuth web flow completed");

        Ok(Credential {
            access_token,
            token_type,
            scopes,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
