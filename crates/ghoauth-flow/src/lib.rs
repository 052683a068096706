//! OAuth 2.0 authorization code web flow for command-line GitHub apps.
//!
//! This crate obtains a user access token the way a native application
//! should: it binds a transient loopback HTTP listener, sends the user's
//! browser to the provider's authorize page with that listener as the
//! redirect target, checks the returned `state` against a per-run random
//! token, and exchanges the authorization code for an access token.
//!
//! # Architecture
//!
//! ```text
//! OAuthWebFlow
//! ├── random              (state token)
//! ├── AuthorizationRequest (authorize URL)
//! ├── CallbackListener    (loopback redirect target, one-shot hand-off)
//! ├── browser             (best-effort launcher, detached)
//! └── TokenExchangeClient (code -> access token)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ghoauth_flow::{FlowConfig, OAuthWebFlow};
//!
//! # async fn example() -> ghoauth_flow::error::Result<()> {
//! let flow = OAuthWebFlow::new(FlowConfig::from_env()?)?;
//! let credential = flow.get_token("octocat").await?;
//! println!("granted scopes: {:?}", credential.scopes());
//! # Ok(())
//! # }
//! ```

pub mod authorize;
pub mod browser;
pub mod callback;
pub mod config;
pub mod error;
pub mod flow;
pub mod random;
pub mod token;

// Re-export key types at the crate root for convenience.
pub use authorize::AuthorizationRequest;
pub use callback::{CallbackListener, CallbackOutcome, CallbackRejection};
pub use config::FlowConfig;
pub use error::{AuthError, Result};
pub use flow::{Credential, OAuthWebFlow, PendingAuthorization};
pub use token::{AccessTokenRequest, AccessTokenResponse, TokenExchangeClient};
