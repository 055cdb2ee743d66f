//! Shared reqwest client construction.
//!
//! The verifier's replay client and the broker client are both built here so
//! every outbound call has a bounded timeout and identifies its component.

use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Outbound client settings for one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Whole-request timeout
    pub timeout: Duration,
    /// Connect timeout, never longer than `timeout`
    pub connect_timeout: Duration,
    /// Follow 3xx responses instead of returning them
    pub follow_redirects: bool,
    /// `User-Agent` sent with every request
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::for_component("client")
    }
}

impl HttpConfig {
    /// Settings for `component`, e.g. `verifier` or `broker`.
    #[must_use]
    pub fn for_component(component: &str) -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: MAX_CONNECT_TIMEOUT,
            follow_redirects: true,
            user_agent: format!("contract-testing-rs/{} ({component})", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set the request timeout, shrinking the connect timeout to fit.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.connect_timeout = timeout.min(MAX_CONNECT_TIMEOUT);
        self
    }

    /// Return 3xx responses as-is.
    #[must_use]
    pub const fn without_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }
}

/// Build a client from `config`.
///
/// # Errors
///
/// Returns an error if the client cannot be built (e.g., TLS initialization fails).
///
/// # Examples
///
/// ```
/// use contract_common::{HttpConfig, build_http_client};
/// use std::time::Duration;
///
/// let config = HttpConfig::for_component("verifier")
///     .with_timeout(Duration::from_secs(10))
///     .without_redirects();
/// let client = build_http_client(&config).expect("Failed to build client");
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    let redirect = if config.follow_redirects {
        Policy::default()
    } else {
        Policy::none()
    };
    ClientBuilder::new()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .redirect(redirect)
        .user_agent(&config.user_agent)
        .use_rustls_tls()
        .build()
}
