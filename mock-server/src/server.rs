//! Mock HTTP server answering from registered interactions.
//!
//! Each incoming request claims the first unconsumed interaction whose
//! request expectation it satisfies; the claim happens under the registry
//! lock so two concurrent requests can never consume the same interaction.

use crate::error::{MockServerError, MockServerResult};
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use contract_pact::{Interaction, Mismatch, ObservedRequest, match_request, parse_body};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug)]
struct Entry {
    interaction: Interaction,
    consumed: bool,
}

#[derive(Debug, Default)]
struct Registry {
    entries: Vec<Entry>,
    unexpected: Vec<UnexpectedRequest>,
}

impl Registry {
    fn claim(&mut self, request: &ObservedRequest) -> Option<&Interaction> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| !entry.consumed && match_request(&entry.interaction.request, request).is_empty())?;
        entry.consumed = true;
        Some(&entry.interaction)
    }

    /// Record a request nothing claimed, diffed against the unconsumed
    /// interaction it came closest to.
    fn reject(&mut self, request: &ObservedRequest) -> UnexpectedRequest {
        let closest = self
            .entries
            .iter()
            .filter(|entry| !entry.consumed)
            .map(|entry| (entry, match_request(&entry.interaction.request, request)))
            .min_by_key(|(_, mismatches)| mismatches.len());

        let (closest, mismatches) = match closest {
            Some((entry, mismatches)) => (Some(entry.interaction.description.clone()), mismatches),
            None => (None, Vec::new()),
        };
        let unexpected = UnexpectedRequest {
            method: request.method.clone(),
            path: request.path.clone(),
            closest,
            mismatches,
        };
        self.unexpected.push(unexpected.clone());
        unexpected
    }
}

type SharedRegistry = Arc<Mutex<Registry>>;

fn lock(registry: &SharedRegistry) -> std::sync::MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A request that matched no unconsumed interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnexpectedRequest {
    /// Request method
    pub method: String,
    /// Request path
    pub path: String,
    /// Description of the nearest unconsumed interaction, if any remained
    pub closest: Option<String>,
    /// How the request differed from `closest`
    pub mismatches: Vec<Mismatch>,
}

impl fmt::Display for UnexpectedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)?;
        if let Some(closest) = &self.closest {
            write!(f, " (closest '{closest}'")?;
            for mismatch in &self.mismatches {
                write!(f, "; {mismatch}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// What happened while the server was running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockServerReport {
    /// Interactions that were requested, in declaration order
    pub exercised: Vec<Interaction>,
    /// Descriptions of interactions never requested
    pub unmatched: Vec<String>,
    /// Requests that matched nothing, with their closest diff
    pub unexpected: Vec<UnexpectedRequest>,
}

impl MockServerReport {
    /// Check the run satisfied every expectation.
    ///
    /// # Errors
    ///
    /// Returns [`MockServerError::UnexpectedRequest`] or
    /// [`MockServerError::UnmatchedInteraction`].
    pub fn ensure_satisfied(&self) -> MockServerResult<()> {
        if !self.unexpected.is_empty() {
            return Err(MockServerError::UnexpectedRequest(
                self.unexpected.iter().map(ToString::to_string).collect(),
            ));
        }
        if !self.unmatched.is_empty() {
            return Err(MockServerError::UnmatchedInteraction(self.unmatched.clone()));
        }
        Ok(())
    }
}

/// A running mock server bound to an ephemeral local port.
#[derive(Debug)]
pub struct MockServer {
    addr: SocketAddr,
    registry: SharedRegistry,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl MockServer {
    /// Bind `127.0.0.1:0` and serve the given interactions.
    ///
    /// # Errors
    ///
    /// Returns [`MockServerError::Bind`] if no local port is available.
    pub async fn start(interactions: Vec<Interaction>) -> MockServerResult<Self> {
        let registry: SharedRegistry = Arc::new(Mutex::new(Registry {
            entries: interactions
                .into_iter()
                .map(|interaction| Entry {
                    interaction,
                    consumed: false,
                })
                .collect(),
            unexpected: Vec::new(),
        }));

        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(MockServerError::Bind)?;
        let addr = listener.local_addr().map_err(MockServerError::Bind)?;

        let app = Router::new()
            .fallback(handle_request)
            .with_state(Arc::clone(&registry));

        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
        });

        info!(%addr, interactions = lock(&registry).entries.len(), "Mock server started");
        Ok(Self {
            addr,
            registry,
            shutdown: Some(tx),
            task: Some(task),
        })
    }

    /// Socket address the server listens on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URI of the server, e.g. `http://127.0.0.1:41234/`.
    ///
    /// # Errors
    ///
    /// Returns [`MockServerError::Server`] if the address cannot form a URL.
    pub fn uri(&self) -> MockServerResult<Url> {
        Url::parse(&format!("http://{}/", self.addr))
            .map_err(|e| MockServerError::Server(e.to_string()))
    }

    /// Snapshot of consumed, unconsumed and unexpected traffic so far.
    #[must_use]
    pub fn report(&self) -> MockServerReport {
        let registry = lock(&self.registry);
        let (exercised, unmatched): (Vec<&Entry>, Vec<&Entry>) =
            registry.entries.iter().partition(|entry| entry.consumed);

        MockServerReport {
            exercised: exercised
                .into_iter()
                .map(|entry| entry.interaction.clone())
                .collect(),
            unmatched: unmatched
                .into_iter()
                .map(|entry| entry.interaction.description.clone())
                .collect(),
            unexpected: registry.unexpected.clone(),
        }
    }

    /// Stop accepting requests and return the final report.
    ///
    /// # Errors
    ///
    /// Returns [`MockServerError::Server`] if the server task failed.
    pub async fn shutdown(mut self) -> MockServerResult<MockServerReport> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| MockServerError::Server(e.to_string()))?
                .map_err(|e| MockServerError::Server(e.to_string()))?;
        }
        debug!(addr = %self.addr, "Mock server stopped");
        Ok(self.report())
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn handle_request(
    State(registry): State<SharedRegistry>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let observed = ObservedRequest {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        headers: headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect(),
        body: parse_body(&body),
    };

    let outcome = {
        let mut registry = lock(&registry);
        match registry.claim(&observed).cloned() {
            Some(interaction) => Ok(interaction),
            None => Err(registry.reject(&observed)),
        }
    };

    match outcome {
        Ok(interaction) => {
            debug!(
                description = %interaction.description,
                method = %observed.method,
                path = %observed.path,
                "Request matched interaction"
            );
            render(&interaction)
        }
        Err(unexpected) => {
            warn!(
                method = %unexpected.method,
                path = %unexpected.path,
                closest = ?unexpected.closest,
                mismatches = unexpected.mismatches.len(),
                "Unexpected request"
            );
            let body = json!({
                "error": "UnexpectedRequest",
                "method": unexpected.method,
                "path": unexpected.path,
                "closestInteraction": unexpected.closest,
                "mismatches": unexpected.mismatches,
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
        }
    }
}

fn render(interaction: &Interaction) -> Response {
    let expected = &interaction.response;
    let status = StatusCode::from_u16(expected.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut headers = HeaderMap::new();
    for (name, value) in expected.rendered_headers() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!(header = %name, "Skipping unrepresentable response header"),
        }
    }

    match expected.rendered_body() {
        Some(body) => {
            if !headers.contains_key(header::CONTENT_TYPE) {
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
            }
            (status, headers, body.to_string()).into_response()
        }
        None => (status, headers).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contract_pact::{Matcher, Request, Response as ExpectedResponse};
    use std::collections::BTreeMap;

    fn interaction(description: &str, path: &str, status: u16) -> Interaction {
        Interaction {
            description: description.to_string(),
            provider_state: None,
            provider_state_params: None,
            request: Request {
                method: "GET".to_string(),
                path: path.to_string(),
                headers: BTreeMap::new(),
                body: None,
            },
            response: ExpectedResponse {
                status,
                headers: BTreeMap::from([("X-Source".to_string(), Matcher::from("mock"))]),
                body: Some(Matcher::each_like(json!({"id": 1}), 2)),
            },
        }
    }

    #[tokio::test]
    async fn test_serves_rendered_response() {
        let server = MockServer::start(vec![interaction("list", "/items", 200)])
            .await
            .unwrap();
        let url = server.uri().unwrap().join("items").unwrap();

        let response = reqwest::get(url).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["x-source"], "mock");
        assert_eq!(response.headers()["content-type"], "application/json");
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body, json!([{"id": 1}, {"id": 1}]));

        let report = server.shutdown().await.unwrap();
        assert!(report.ensure_satisfied().is_ok());
        assert_eq!(report.exercised.len(), 1);
    }

    #[tokio::test]
    async fn test_unexpected_request_gets_diagnostic() {
        let server = MockServer::start(vec![interaction("list", "/items", 200)])
            .await
            .unwrap();
        let url = server.uri().unwrap().join("other").unwrap();

        let response = reqwest::get(url).await.unwrap();
        assert_eq!(response.status(), 500);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "UnexpectedRequest");
        assert_eq!(body["path"], "/other");

        assert_eq!(body["closestInteraction"], "list");
        assert_eq!(body["mismatches"][0]["path"], "$.path");
        assert_eq!(body["mismatches"][0]["expected"], "/items");
        assert_eq!(body["mismatches"][0]["actual"], "/other");

        let report = server.shutdown().await.unwrap();
        assert_eq!(report.unexpected.len(), 1);
        let unexpected = &report.unexpected[0];
        assert_eq!((unexpected.method.as_str(), unexpected.path.as_str()), ("GET", "/other"));
        assert_eq!(unexpected.closest.as_deref(), Some("list"));
        assert_eq!(unexpected.mismatches.len(), 1);
        assert!(matches!(
            report.ensure_satisfied(),
            Err(MockServerError::UnexpectedRequest(requests))
                if requests == ["GET /other (closest 'list'; $.path: expected /items but was /other)"]
        ));
    }

    #[tokio::test]
    async fn test_unexpected_request_picks_nearest_interaction() {
        let mut with_header = interaction("authorized", "/secure", 200);
        with_header
            .request
            .headers
            .insert("Authorization".to_string(), Matcher::from("Bearer abc"));
        let mut create = interaction("create", "/items", 201);
        create.request.method = "POST".to_string();
        let server = MockServer::start(vec![create, with_header])
            .await
            .unwrap();

        let response = reqwest::get(server.uri().unwrap().join("secure").unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 500);

        let report = server.shutdown().await.unwrap();
        let unexpected = &report.unexpected[0];
        assert_eq!(unexpected.closest.as_deref(), Some("authorized"));
        assert_eq!(unexpected.mismatches.len(), 1);
        assert_eq!(unexpected.mismatches[0].kind, contract_pact::MismatchKind::Header);
    }

    #[tokio::test]
    async fn test_request_after_all_consumed_has_no_closest() {
        let server = MockServer::start(vec![interaction("list", "/items", 200)])
            .await
            .unwrap();
        let url = server.uri().unwrap().join("items").unwrap();
        reqwest::get(url.clone()).await.unwrap();
        reqwest::get(url).await.unwrap();

        let report = server.shutdown().await.unwrap();
        assert_eq!(report.unexpected[0].closest, None);
        assert_eq!(report.unexpected[0].to_string(), "GET /items");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_identical_requests_claim_once() {
        const RACERS: usize = 8;
        let server = MockServer::start(vec![interaction("list", "/items", 200)])
            .await
            .unwrap();
        let url = server.uri().unwrap().join("items").unwrap();
        let client = reqwest::Client::new();

        let handles: Vec<_> = (0..RACERS)
            .map(|_| {
                let client = client.clone();
                let url = url.clone();
                tokio::spawn(async move {
                    let response = client.get(url).send().await.unwrap();
                    let status = response.status().as_u16();
                    let body: serde_json::Value = response.json().await.unwrap();
                    (status, body)
                })
            })
            .collect();

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        let served = outcomes.iter().filter(|(status, _)| *status == 200).count();
        let rejected: Vec<_> = outcomes.iter().filter(|(status, _)| *status == 500).collect();
        assert_eq!(served, 1);
        assert_eq!(rejected.len(), RACERS - 1);
        assert!(rejected.iter().all(|(_, body)| body["error"] == "UnexpectedRequest"));

        let report = server.shutdown().await.unwrap();
        assert_eq!(report.exercised.len(), 1);
        assert_eq!(report.unexpected.len(), RACERS - 1);
    }

    #[tokio::test]
    async fn test_interaction_consumed_once() {
        let server = MockServer::start(vec![interaction("list", "/items", 200)])
            .await
            .unwrap();
        let url = server.uri().unwrap().join("items").unwrap();

        assert_eq!(reqwest::get(url.clone()).await.unwrap().status(), 200);
        assert_eq!(reqwest::get(url).await.unwrap().status(), 500);

        let report = server.shutdown().await.unwrap();
        assert_eq!(report.exercised.len(), 1);
        assert_eq!(report.unexpected.len(), 1);
    }

    #[tokio::test]
    async fn test_identical_requests_claim_in_declared_order() {
        let server = MockServer::start(vec![
            interaction("first", "/items", 200),
            interaction("second", "/items", 404),
        ])
        .await
        .unwrap();
        let url = server.uri().unwrap().join("items").unwrap();

        assert_eq!(reqwest::get(url.clone()).await.unwrap().status(), 200);
        assert_eq!(reqwest::get(url).await.unwrap().status(), 404);
        assert!(server.shutdown().await.unwrap().ensure_satisfied().is_ok());
    }

    #[tokio::test]
    async fn test_unrequested_interaction_reported() {
        let server = MockServer::start(vec![
            interaction("list", "/items", 200),
            interaction("never", "/never", 200),
        ])
        .await
        .unwrap();
        reqwest::get(server.uri().unwrap().join("items").unwrap())
            .await
            .unwrap();

        let report = server.shutdown().await.unwrap();
        assert_eq!(report.unmatched, vec!["never".to_string()]);
        assert!(matches!(
            report.ensure_satisfied(),
            Err(MockServerError::UnmatchedInteraction(names)) if names == ["never"]
        ));
    }
}
