//! Minimal GitHub REST client used after the OAuth web flow.
//!
//! The client is built from the [`ghoauth_flow::Credential`] the flow hands
//! back and currently knows one action: adding a deploy key to a repository.

pub mod client;
pub mod error;
pub mod repo;

pub use client::{CreatedKey, DeployKey, GitHubClient};
pub use error::{GitHubError, Result};
pub use repo::RepoRef;
