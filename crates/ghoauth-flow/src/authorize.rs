//! The provider-bound authorization redirect.

use url::Url;

/// Parameters of the authorize redirect sent to the user's browser.
///
/// Immutable once built; one instance per flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    client_id: String,
    redirect_uri: String,
    login: String,
    scope: String,
    state: String,
}

impl AuthorizationRequest {
    /// Assemble the request parameters.
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        login: impl Into<String>,
        scope: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            login: login.into(),
            scope: scope.into(),
            state: state.into(),
        }
    }

    /// The OAuth application client ID.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Where the provider redirects the browser.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Account suggested on the authorize page.
    pub fn login(&self) -> &str {
        &self.login
    }

    /// Requested scope.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Anti-forgery token echoed back on the callback.
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Build the URL the user should visit.
    ///
    /// All five parameters are appended as form-encoded query pairs. Any
    /// query already present on `endpoint` is kept.
    pub fn url(&self, endpoint: &Url) -> Url {
        let mut url = endpoint.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("login", &self.login)
            .append_pair("scope", &self.scope)
            .append_pair("state", &self.state);
        url
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_AUTHORIZE_URL;

    fn endpoint() -> Url {
        Url::parse(DEFAULT_AUTHORIZE_URL).unwrap()
    }

    #[test]
    fn url_has_exactly_five_params() {
        let req = AuthorizationRequest::new(
            "cid",
            "http://127.0.0.1:4567",
            "octocat",
            "repo",
            "s3cr3tState",
        );
        let url = req.url(&endpoint());

        assert_eq!(url.host_str(), Some("github.com"));
        assert_eq!(url.path(), "/login/oauth/authorize");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("client_id".to_string(), "cid".to_string()),
                ("redirect_uri".to_string(), "http://127.0.0.1:4567".to_string()),
                ("login".to_string(), "octocat".to_string()),
                ("scope".to_string(), "repo".to_string()),
                ("state".to_string(), "s3cr3tState".to_string()),
            ]
        );
    }

    #[test]
    fn url_encodes_reserved_characters() {
        let req = AuthorizationRequest::new(
            "id&x=1",
            "http://127.0.0.1:80/cb?a=b",
            "user name",
            "repo gist",
            "a+b/c=",
        );
        let url = req.url(&endpoint());
        let query = url.query().unwrap();

        assert!(query.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A80%2Fcb%3Fa%3Db"));
        assert!(query.contains("login=user+name"));
        assert!(query.contains("state=a%2Bb%2Fc%3D"));

        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs.len(), 5);
        assert_eq!(pairs["client_id"], "id&x=1");
        assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:80/cb?a=b");
        assert_eq!(pairs["login"], "user name");
        assert_eq!(pairs["scope"], "repo gist");
        assert_eq!(pairs["state"], "a+b/c=");
    }

    #[test]
    fn url_keeps_endpoint_query() {
        let base = Url::parse("https://ghe.example.com/login/oauth/authorize?allow_signup=false")
            .unwrap();
        let req = AuthorizationRequest::new("cid", "http://127.0.0.1:1", "", "repo", "st");
        let url = req.url(&base);
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["allow_signup"], "false");
        assert_eq!(pairs["login"], "");
        assert_eq!(pairs.len(), 6);
    }
}
