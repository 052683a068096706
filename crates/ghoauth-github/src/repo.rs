//! Repository references as typed on the command line.

use std::fmt;

use crate::error::{GitHubError, Result};

/// An `owner/name` pair identifying a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    owner: String,
    name: String,
}

impl RepoRef {
    /// Parse `owner/name`, `github.com/owner/name`, an HTTPS clone URL or an
    /// SSH clone URL.
    ///
    /// # Errors
    ///
    /// Returns [`GitHubError::InvalidRepository`] for anything else.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || GitHubError::InvalidRepository {
            input: input.to_string(),
        };

        let trimmed = input.trim();
        let path = match trimmed.strip_prefix("git@") {
            // git@github.com:owner/name.git
            Some(rest) => rest.split_once(':').map(|(_, path)| path).ok_or_else(invalid)?,
            None => trimmed
                .split_once("://")
                .map_or(trimmed, |(_, rest)| rest),
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let (owner, name) = match segments.as_slice() {
            [owner, name] => (*owner, *name),
            [host, owner, name] if host.contains('.') => (*owner, *name),
            _ => return Err(invalid()),
        };
        let name = name.strip_suffix(".git").unwrap_or(name);

        if !is_valid_segment(owner) || !is_valid_segment(name) {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(input: &str) -> (String, String) {
        let repo = RepoRef::parse(input).unwrap();
        (repo.owner().to_string(), repo.name().to_string())
    }

    #[test]
    fn parse_accepted_forms() {
        let expected = ("marccarre".to_string(), "my-gitops-repo".to_string());
        for input in [
            "marccarre/my-gitops-repo",
            "github.com/marccarre/my-gitops-repo",
            "https://github.com/marccarre/my-gitops-repo",
            "https://github.com/marccarre/my-gitops-repo.git",
            "https://github.com/marccarre/my-gitops-repo/",
            "git@github.com:marccarre/my-gitops-repo.git",
            "ssh://git@github.com/marccarre/my-gitops-repo.git",
            "  marccarre/my-gitops-repo  ",
        ] {
            assert_eq!(parsed(input), expected, "input: {input}");
        }
    }

    #[test]
    fn parse_enterprise_host() {
        assert_eq!(
            parsed("https://ghe.example.com/platform/flux-config"),
            ("platform".to_string(), "flux-config".to_string())
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        for input in [
            "",
            "just-a-name",
            "a/b/c/d",
            "host/owner/name",
            "git@github.com",
            "owner/na me",
            "owner/.git",
        ] {
            assert!(RepoRef::parse(input).is_err(), "input: {input:?}");
        }
    }

    #[test]
    fn display_is_owner_slash_name() {
        let repo = RepoRef::parse("github.com/octocat/hello-world").unwrap();
        assert_eq!(repo.to_string(), "octocat/hello-world");
    }
}
