use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use url::Url;

use crate::error::ClientError;
use crate::jobs::PollConfig;
use crate::proxy::ProxyConfig;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

pub const DEFAULT_USER_AGENT: &str = concat!("analytics-client/", env!("CARGO_PKG_VERSION"));

/// Paths of the endpoints that manage the session itself.
///
/// A 401 from any of login/signup/refresh/logout is passed through unchanged
/// and never triggers a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    pub login: String,
    pub signup: String,
    pub refresh: String,
    pub logout: String,
    pub me: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_owned(),
            signup: "/auth/signup".to_owned(),
            refresh: "/auth/refresh".to_owned(),
            logout: "/auth/logout".to_owned(),
            me: "/auth/me".to_owned(),
        }
    }
}

impl AuthEndpoints {
    /// Whether `path` targets one of the session-management endpoints.
    pub fn is_auth_endpoint(&self, path: &str) -> bool {
        let path = normalize_path(path);
        [&self.login, &self.signup, &self.refresh, &self.logout]
            .into_iter()
            .any(|endpoint| {
                let endpoint = normalize_path(endpoint);
                path == endpoint
                    || path
                        .strip_prefix(endpoint)
                        .is_some_and(|rest| rest.starts_with('/'))
            })
    }
}

/// Strip the query string and surrounding slashes.
fn normalize_path(path: &str) -> &str {
    path.split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_matches('/')
}

/// Options for the session client and its HTTP transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every request path is resolved against.
    pub base_url: Url,

    /// Overall timeout for a single HTTP request; zero disables it.
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    pub user_agent: String,

    /// Headers sent with every request
    pub headers: HeaderMap,

    pub proxy: Option<ProxyConfig>,

    pub auth_endpoints: AuthEndpoints,

    /// Polling behaviour for long-running analysis runs
    pub poll: PollConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            timeout: Duration::ZERO,
            connect_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: ClientConfig::default_headers(),
            proxy: None,
            auth_endpoints: AuthEndpoints::default(),
            poll: PollConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Config pointing at `base_url`, everything else defaulted.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::configuration(format!("invalid base URL `{base_url}`: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::configuration(format!(
                "base URL `{base_url}` cannot be used as a base"
            )));
        }
        Ok(Self {
            base_url,
            ..Self::default()
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Resolve a request path against the base URL.
    ///
    /// The base URL's own path is kept, so `http://host/api` + `/datasets`
    /// resolves to `http://host/api/datasets`.
    pub fn endpoint_url(&self, path: &str) -> Result<Url, url::ParseError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim_start_matches('/'))
    }

    pub fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_endpoint_detection() {
        let endpoints = AuthEndpoints::default();
        assert!(endpoints.is_auth_endpoint("/auth/refresh"));
        assert!(endpoints.is_auth_endpoint("auth/login"));
        assert!(endpoints.is_auth_endpoint("/auth/signup/"));
        assert!(endpoints.is_auth_endpoint("/auth/logout?all=1"));

        assert!(!endpoints.is_auth_endpoint("/auth/me"));
        assert!(!endpoints.is_auth_endpoint("/auth/refresher"));
        assert!(!endpoints.is_auth_endpoint("/datasets"));
    }

    #[test]
    fn endpoint_url_keeps_base_path() {
        let config = ClientConfig::new("http://localhost:8080/api").unwrap();
        assert_eq!(
            config.endpoint_url("/datasets/3/preview").unwrap().as_str(),
            "http://localhost:8080/api/datasets/3/preview"
        );

        let config = ClientConfig::new("http://localhost:8080").unwrap();
        assert_eq!(
            config.endpoint_url("auth/login").unwrap().as_str(),
            "http://localhost:8080/auth/login"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            ClientConfig::new("localhost"),
            Err(ClientError::Configuration { .. })
        ));
        assert!(ClientConfig::new("mailto:someone@example.com").is_err());
    }
}
