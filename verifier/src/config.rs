//! Type-safe verifier and broker configuration.
//!
//! Values are read once from the environment (and `.env`, via dotenvy) into
//! explicit structs; nothing else in the crate reads the environment.

use chrono::{DateTime, Utc};
use contract_common::TracingConfig;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Variable holding the URL
        field: String,
        /// Parser message
        reason: String,
    },

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },
}

/// Broker credentials.
#[derive(Clone, PartialEq, Eq)]
pub enum BrokerAuth {
    /// Bearer token
    Token(String),
    /// HTTP basic authentication
    Basic {
        /// User name
        username: String,
        /// Password
        password: String,
    },
}

impl std::fmt::Debug for BrokerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token([REDACTED])"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Broker connection settings.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Broker base URL
    pub base_url: Url,
    /// Optional credentials
    pub auth: Option<BrokerAuth>,
    /// Per-call timeout
    pub timeout: Duration,
}

impl BrokerConfig {
    /// Default broker call timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Broker at `base_url` without credentials.
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self {
            base_url,
            auth: None,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Use the given credentials.
    #[must_use]
    pub fn with_auth(mut self, auth: BrokerAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Set the per-call timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load broker settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load broker settings through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = parse_url_var(&lookup, "PACT_BROKER_BASE_URL", "http://localhost:9292")?;
        let auth = match (
            non_empty(&lookup, "PACT_BROKER_TOKEN"),
            non_empty(&lookup, "PACT_BROKER_USERNAME"),
        ) {
            (Some(token), _) => Some(BrokerAuth::Token(token)),
            (None, Some(username)) => Some(BrokerAuth::Basic {
                username,
                password: lookup("PACT_BROKER_PASSWORD").unwrap_or_default(),
            }),
            (None, None) => None,
        };
        let timeout_secs: u64 = parse_var(&lookup, "PACT_BROKER_TIMEOUT_SECS", 10)?;
        if timeout_secs == 0 {
            return Err(ConfigError::ParseError {
                name: "PACT_BROKER_TIMEOUT_SECS".to_string(),
                reason: "timeout must be greater than 0".to_string(),
            });
        }

        Ok(Self {
            base_url,
            auth,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Provider verification settings.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Provider name
    pub provider_name: String,
    /// Consumer name
    pub consumer_name: String,
    /// Base URL requests are replayed against
    pub provider_base_url: Url,
    /// Provider state endpoint; `None` skips state setup
    pub provider_states_url: Option<Url>,
    /// Provider version reported to the broker
    pub provider_version: String,
    /// Branch the provider version is tagged with
    pub branch: String,
    /// Whether results are published to the broker
    pub publish_results: bool,
    /// Explicit contract file, used when discovery finds nothing
    pub pact_file: Option<PathBuf>,
    /// Timeout for each replayed request and state call
    pub request_timeout: Duration,
}

impl VerifierConfig {
    /// Settings for verifying `consumer`'s contract against `provider` at `base_url`.
    ///
    /// The state endpoint defaults to `<base_url>/provider-states`.
    #[must_use]
    pub fn new(provider: impl Into<String>, consumer: impl Into<String>, base_url: Url) -> Self {
        let provider_states_url = default_states_url(&base_url);
        Self {
            provider_name: provider.into(),
            consumer_name: consumer.into(),
            provider_base_url: base_url,
            provider_states_url,
            provider_version: default_provider_version(Utc::now()),
            branch: "main".to_string(),
            publish_results: true,
            pact_file: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Use an explicit state endpoint, or none.
    #[must_use]
    pub fn with_provider_states_url(mut self, url: Option<Url>) -> Self {
        self.provider_states_url = url;
        self
    }

    /// Set the provider version.
    #[must_use]
    pub fn with_provider_version(mut self, version: impl Into<String>) -> Self {
        self.provider_version = version.into();
        self
    }

    /// Set the branch.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Set the replay timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Load verifier settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load verifier settings through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let provider_name = non_empty(&lookup, "PROVIDER_NAME")
            .ok_or_else(|| ConfigError::MissingRequired("PROVIDER_NAME".to_string()))?;
        let consumer_name = non_empty(&lookup, "CONSUMER_NAME")
            .ok_or_else(|| ConfigError::MissingRequired("CONSUMER_NAME".to_string()))?;
        let provider_base_url = parse_url_var(&lookup, "PROVIDER_BASE_URL", "http://localhost:9001")?;

        let provider_states_url = match lookup("PROVIDER_STATES_URL") {
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => Some(parse_url("PROVIDER_STATES_URL", &raw)?),
            None => default_states_url(&provider_base_url),
        };

        let timeout_secs: u64 = parse_var(&lookup, "PROVIDER_TIMEOUT_SECS", 30)?;
        if timeout_secs == 0 {
            return Err(ConfigError::ParseError {
                name: "PROVIDER_TIMEOUT_SECS".to_string(),
                reason: "timeout must be greater than 0".to_string(),
            });
        }

        Ok(Self {
            provider_name,
            consumer_name,
            provider_base_url,
            provider_states_url,
            provider_version: non_empty(&lookup, "PROVIDER_VERSION")
                .unwrap_or_else(|| default_provider_version(Utc::now())),
            branch: non_empty(&lookup, "BRANCH_NAME").unwrap_or_else(|| "main".to_string()),
            publish_results: parse_var(&lookup, "PACT_PUBLISH_RESULTS", true)?,
            pact_file: non_empty(&lookup, "PACT_FILE").map(PathBuf::from),
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// File name of the contract for this pair.
    #[must_use]
    pub fn contract_file_name(&self) -> String {
        contract_pact::Contract::file_name_for(&self.consumer_name, &self.provider_name)
    }
}

/// Tracing settings from `LOG_LEVEL` and `LOG_JSON`.
///
/// # Errors
///
/// Returns an error if `LOG_JSON` is not a boolean.
pub fn tracing_config_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
    service_name: &str,
) -> Result<TracingConfig, ConfigError> {
    let mut config = TracingConfig::default().with_service_name(service_name);
    if let Some(level) = non_empty(&lookup, "LOG_LEVEL") {
        config = config.with_log_level(level);
    }
    if parse_var(&lookup, "LOG_JSON", false)? {
        config = config.with_json_output();
    }
    Ok(config)
}

/// Default provider version: `1.0.<UTC yyyyMMddHHmmss>`.
#[must_use]
pub fn default_provider_version(now: DateTime<Utc>) -> String {
    format!("1.0.{}", now.format("%Y%m%d%H%M%S"))
}

fn default_states_url(base: &Url) -> Option<Url> {
    Url::parse(&format!(
        "{}/provider-states",
        base.as_str().trim_end_matches('/')
    ))
    .ok()
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|value| !value.trim().is_empty())
}

/// Parse a variable with a default value.
fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, name) {
        Some(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse a URL variable with a default value.
fn parse_url_var(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> Result<Url, ConfigError> {
    let raw = non_empty(lookup, name).unwrap_or_else(|| default.to_string());
    parse_url(name, &raw)
}

fn parse_url(name: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
        field: name.to_string(),
        reason: e.to_string(),
    })
}
