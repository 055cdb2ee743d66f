//! Sample provider used to verify the BulkUsers contract end to end.
//!
//! The app serves `POST /BulkUsers` with the provider's real rules and mounts
//! a [`ProviderStateDispatcher`] for the three scenario states. Every state
//! call is recorded so tests can assert ordering.

use crate::fixtures::{
    ErrorResponse, STATE_INVALID_TOKEN, STATE_UNKNOWN_WINDOWS_USER, STATE_USERS_EXIST,
    UNKNOWN_WINDOWS_USER, User, VALID_TOKEN,
};
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use contract_verifier::ProviderStateDispatcher;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

/// Shared log of provider state names applied, in call order.
pub type StateLog = Arc<RwLock<Vec<String>>>;

async fn bulk_users(headers: HeaderMap, body: Bytes) -> Response {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    if token != Some(VALID_TOKEN) {
        debug!(?token, "Rejecting BulkUsers call");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let users: Vec<User> = serde_json::from_slice(&body).unwrap_or_default();
    if users.is_empty() {
        return Json(Vec::<User>::new()).into_response();
    }

    let unknown = users.iter().any(|user| {
        user.identity_providers
            .iter()
            .any(|ip| ip.provider == "windows" && ip.provider_id == UNKNOWN_WINDOWS_USER)
    });
    if unknown {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::unknown_windows_user(UNKNOWN_WINDOWS_USER)),
        )
            .into_response();
    }

    let enriched: Vec<User> = users
        .into_iter()
        .map(|user| User {
            subject: user.subject.or_else(|| Some(Uuid::new_v4().to_string())),
            ..user
        })
        .collect();
    Json(enriched).into_response()
}

/// Router serving only `POST /BulkUsers`.
#[must_use]
pub fn bulk_users_router() -> Router {
    Router::new().route("/BulkUsers", post(bulk_users))
}

/// Dispatcher handling the three scenario states, recording each call in `log`.
#[must_use]
pub fn scenario_states(log: &StateLog) -> ProviderStateDispatcher {
    [STATE_INVALID_TOKEN, STATE_USERS_EXIST, STATE_UNKNOWN_WINDOWS_USER]
        .into_iter()
        .fold(ProviderStateDispatcher::new(), |dispatcher, state| {
            let log = Arc::clone(log);
            dispatcher.with_state(state, move |_params| {
                let log = Arc::clone(&log);
                async move {
                    log.write().await.push(state.to_string());
                    Ok(())
                }
            })
        })
}

/// The complete sample provider: business route plus state endpoint.
#[must_use]
pub fn sample_provider(log: &StateLog) -> Router {
    bulk_users_router().merge(scenario_states(log).router())
}

/// A provider app served on an ephemeral local port.
#[derive(Debug)]
pub struct SpawnedProvider {
    /// Address the app listens on
    pub addr: SocketAddr,
    /// State calls received so far
    pub state_log: StateLog,
    handle: JoinHandle<()>,
}

impl SpawnedProvider {
    /// Serve the sample provider.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn start() -> io::Result<Self> {
        let state_log = StateLog::default();
        Self::serve(sample_provider(&state_log), state_log).await
    }

    /// Serve an arbitrary app, sharing `state_log` with its handlers.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn serve(app: Router, state_log: StateLog) -> io::Result<Self> {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                debug!(error = %e, "Sample provider stopped");
            }
        });
        Ok(Self {
            addr,
            state_log,
            handle,
        })
    }

    /// Base URL of the running app.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// State names applied so far.
    pub async fn states_applied(&self) -> Vec<String> {
        self.state_log.read().await.clone()
    }
}

impl Drop for SpawnedProvider {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
