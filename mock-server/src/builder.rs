//! Fluent builder for declaring consumer expectations.
//!
//! ```no_run
//! use contract_mock_server::{PactBuilder, PactConfig};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut pact = PactBuilder::new("SF-Consumer", "VAIS-Producer")
//!     .with_config(PactConfig::new("pacts"));
//!
//! pact.upon_receiving("a bulk user request with an invalid token")
//!     .given("Invalid authentication token provided")
//!     .with_request("POST", "/BulkUsers")
//!     .with_header("Authorization", "Bearer invalid-token")
//!     .with_json_body(json!([]))
//!     .will_respond()
//!     .with_status(401);
//!
//! pact.verify(|ctx| async move {
//!     let url = ctx.url("/BulkUsers");
//!     // drive the consumer code against `url`
//!     Ok::<_, std::io::Error>(())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{MockServerError, MockServerResult};
use crate::server::MockServer;
use contract_pact::{Contract, ContractStore, Interaction, Matcher, Request, Response};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::path::PathBuf;
use tracing::{info, instrument};
use url::Url;

/// Where recorded contracts are written.
#[derive(Debug, Clone)]
pub struct PactConfig {
    /// Output directory for contract files
    pub pact_dir: PathBuf,
}

impl PactConfig {
    /// Write contracts into `pact_dir`.
    #[must_use]
    pub fn new(pact_dir: impl Into<PathBuf>) -> Self {
        Self {
            pact_dir: pact_dir.into(),
        }
    }
}

impl Default for PactConfig {
    fn default() -> Self {
        Self::new("pacts")
    }
}

/// Handle passed to the consumer test body.
#[derive(Debug, Clone)]
pub struct MockServerContext {
    /// Base URI of the running mock server
    pub mock_server_uri: Url,
}

impl MockServerContext {
    /// Absolute URL for `path` on the mock server.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.mock_server_uri.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Collects interactions for one consumer/provider pair.
#[derive(Debug)]
pub struct PactBuilder {
    consumer: String,
    provider: String,
    config: PactConfig,
    interactions: Vec<Interaction>,
}

impl PactBuilder {
    /// Start declaring a contract between `consumer` and `provider`.
    #[must_use]
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            consumer: consumer.into(),
            provider: provider.into(),
            config: PactConfig::default(),
            interactions: Vec::new(),
        }
    }

    /// Use a specific output configuration.
    #[must_use]
    pub fn with_config(mut self, config: PactConfig) -> Self {
        self.config = config;
        self
    }

    /// Declare a new interaction.
    pub fn upon_receiving(&mut self, description: impl Into<String>) -> RequestBuilder<'_> {
        self.interactions.push(Interaction {
            description: description.into(),
            provider_state: None,
            provider_state_params: None,
            request: Request {
                method: "GET".to_string(),
                path: "/".to_string(),
                headers: BTreeMap::new(),
                body: None,
            },
            response: Response {
                status: 200,
                headers: BTreeMap::new(),
                body: None,
            },
        });
        let index = self.interactions.len() - 1;
        RequestBuilder {
            interaction: &mut self.interactions[index],
        }
    }

    /// Interactions declared and not yet verified.
    #[must_use]
    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    /// Run `test` against a fresh mock server and record the contract.
    ///
    /// The declared interactions are drained whether or not verification
    /// succeeds. The contract file is written only when every interaction
    /// was requested exactly once, nothing unexpected arrived and the test
    /// body returned `Ok`.
    ///
    /// # Errors
    ///
    /// Returns [`MockServerError::UnexpectedRequest`],
    /// [`MockServerError::TestBody`] or [`MockServerError::UnmatchedInteraction`],
    /// checked in that order, or a contract error if the interactions are
    /// invalid or cannot be written.
    #[instrument(skip(self, test), fields(consumer = %self.consumer, provider = %self.provider))]
    pub async fn verify<F, Fut, E>(&mut self, test: F) -> MockServerResult<PathBuf>
    where
        F: FnOnce(MockServerContext) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let interactions = std::mem::take(&mut self.interactions);
        Contract {
            interactions: interactions.clone(),
            ..Contract::new(self.consumer.as_str(), self.provider.as_str())
        }
        .validate()?;

        let server = MockServer::start(interactions).await?;
        let ctx = MockServerContext {
            mock_server_uri: server.uri()?,
        };
        let outcome = test(ctx).await;
        let report = server.shutdown().await?;

        if !report.unexpected.is_empty() {
            return Err(MockServerError::UnexpectedRequest(
                report.unexpected.iter().map(ToString::to_string).collect(),
            ));
        }
        if let Err(e) = outcome {
            return Err(MockServerError::TestBody(e.to_string()));
        }
        report.ensure_satisfied()?;

        let path = ContractStore::new(&self.config.pact_dir).merge_and_save(
            &self.consumer,
            &self.provider,
            report.exercised,
        )?;
        info!(path = %path.display(), "Consumer contract verified");
        Ok(path)
    }
}

/// Request half of an interaction under construction.
#[derive(Debug)]
pub struct RequestBuilder<'a> {
    interaction: &'a mut Interaction,
}

impl<'a> RequestBuilder<'a> {
    /// Provider state the interaction requires.
    pub fn given(self, state: impl Into<String>) -> Self {
        self.interaction.provider_state = Some(state.into());
        self
    }

    /// Parameters sent with the provider state.
    pub fn given_with_params(self, state: impl Into<String>, params: Map<String, Value>) -> Self {
        self.interaction.provider_state_params = Some(params);
        self.given(state)
    }

    /// Expected method and path.
    pub fn with_request(self, method: impl Into<String>, path: impl Into<String>) -> Self {
        self.interaction.request.method = method.into().to_uppercase();
        self.interaction.request.path = path.into();
        self
    }

    /// Expected request header.
    pub fn with_header(self, name: impl Into<String>, value: impl Into<Matcher>) -> Self {
        self.interaction
            .request
            .headers
            .insert(name.into(), value.into());
        self
    }

    /// Expected JSON request body.
    pub fn with_json_body(self, body: impl Into<Matcher>) -> Self {
        self.interaction.request.body = Some(body.into());
        self
    }

    /// Switch to declaring the response.
    pub fn will_respond(self) -> ResponseBuilder<'a> {
        ResponseBuilder {
            interaction: self.interaction,
        }
    }
}

/// Response half of an interaction under construction.
#[derive(Debug)]
pub struct ResponseBuilder<'a> {
    interaction: &'a mut Interaction,
}

impl ResponseBuilder<'_> {
    /// Response status code.
    pub fn with_status(self, status: u16) -> Self {
        self.interaction.response.status = status;
        self
    }

    /// Response header.
    pub fn with_header(self, name: impl Into<String>, value: impl Into<Matcher>) -> Self {
        self.interaction
            .response
            .headers
            .insert(name.into(), value.into());
        self
    }

    /// JSON response body.
    pub fn with_json_body(self, body: impl Into<Matcher>) -> Self {
        self.interaction.response.body = Some(body.into());
        self
    }
}
