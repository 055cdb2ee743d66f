//! Provider state setup: the provider-side dispatcher and the verifier-side client.
//!
//! Before replaying an interaction that declares a provider state, the
//! verifier POSTs `{consumer, state, params}` to the provider's state
//! endpoint. The provider looks the state up in a name → handler map and
//! always answers `200 {}`; unknown states and failing handlers are logged.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, http::StatusCode};
use contract_common::CommonError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Path the dispatcher router serves.
pub const PROVIDER_STATES_PATH: &str = "/provider-states";

/// Body of a provider state call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderStateRequest {
    /// Consumer whose contract is being verified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<String>,
    /// State name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// State parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

/// Future returned by a state handler.
pub type StateFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

type StateHandler = Arc<dyn Fn(Map<String, Value>) -> StateFuture + Send + Sync>;

/// What the dispatcher did with a state call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateOutcome {
    /// The named handler ran successfully
    Applied,
    /// No handler is registered; nothing was done
    Unknown,
    /// The request carried no state name
    NoState,
    /// The handler failed
    Failed(String),
}

/// Maps state names to async setup handlers.
#[derive(Clone, Default)]
pub struct ProviderStateDispatcher {
    handlers: HashMap<String, StateHandler>,
}

impl fmt::Debug for ProviderStateDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderStateDispatcher")
            .field("states", &self.states())
            .finish()
    }
}

impl ProviderStateDispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for `state`.
    pub fn register<F, Fut>(&mut self, state: impl Into<String>, handler: F)
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let handler: StateHandler =
            Arc::new(move |params: Map<String, Value>| -> StateFuture { Box::pin(handler(params)) });
        self.handlers.insert(state.into(), handler);
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with_state<F, Fut>(mut self, state: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.register(state, handler);
        self
    }

    /// Registered state names, sorted.
    #[must_use]
    pub fn states(&self) -> Vec<&str> {
        let mut states: Vec<_> = self.handlers.keys().map(String::as_str).collect();
        states.sort_unstable();
        states
    }

    /// Run the handler for the requested state.
    pub async fn dispatch(&self, request: &ProviderStateRequest) -> StateOutcome {
        let Some(state) = request.state.as_deref() else {
            debug!("Provider state call without a state name");
            return StateOutcome::NoState;
        };
        let Some(handler) = self.handlers.get(state) else {
            warn!(state, "No handler for provider state; ignoring");
            return StateOutcome::Unknown;
        };

        match handler(request.params.clone().unwrap_or_default()).await {
            Ok(()) => {
                info!(state, consumer = ?request.consumer, "Provider state applied");
                StateOutcome::Applied
            }
            Err(reason) => {
                warn!(state, %reason, "Provider state handler failed");
                StateOutcome::Failed(reason)
            }
        }
    }

    /// Router serving `POST /provider-states`, to be merged into the provider app.
    #[must_use]
    pub fn router(self) -> Router {
        Router::new()
            .route(PROVIDER_STATES_PATH, post(handle_state))
            .with_state(Arc::new(self))
    }
}

async fn handle_state(
    State(dispatcher): State<Arc<ProviderStateDispatcher>>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    match serde_json::from_slice::<ProviderStateRequest>(&body) {
        Ok(request) => {
            dispatcher.dispatch(&request).await;
        }
        Err(e) => warn!(error = %e, "Unparsable provider state request"),
    }
    (StatusCode::OK, Json(json!({})))
}

/// Verifier-side client for a provider's state endpoint.
#[derive(Debug, Clone)]
pub struct ProviderStateClient {
    client: reqwest::Client,
    url: Url,
}

impl ProviderStateClient {
    /// Client posting to `url` with a preconfigured HTTP client.
    #[must_use]
    pub const fn new(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }

    /// Endpoint this client posts to.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Ask the provider to enter `state`.
    ///
    /// # Errors
    ///
    /// Returns the transport failure or the unexpected status; callers treat
    /// it as a warning.
    pub async fn setup(
        &self,
        consumer: &str,
        state: &str,
        params: Option<&Map<String, Value>>,
    ) -> Result<(), CommonError> {
        let body = ProviderStateRequest {
            consumer: Some(consumer.to_string()),
            state: Some(state.to_string()),
            params: params.cloned(),
        };
        let response = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(CommonError::from_transport)?;

        let status = response.status();
        if status.is_success() {
            debug!(state, "Provider state set up");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(CommonError::unexpected_status(status.as_u16(), body))
        }
    }
}
