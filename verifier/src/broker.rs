//! Pact Broker client: contract retrieval and result publishing.
//!
//! Publishing is best-effort. Each of the three calls yields its own
//! [`StepOutcome`], is logged on its own, and never changes the run it reports.

use crate::config::{BrokerAuth, BrokerConfig};
use crate::error::{BrokerError, BrokerResult};
use contract_common::{CommonError, HttpConfig, build_http_client};
use contract_pact::{Contract, ContractStore, VerificationRun};
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use tracing::{info, instrument, warn};
use url::Url;

const HAL_JSON: &str = "application/hal+json, application/json";

/// Result of one best-effort broker call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The call succeeded
    Succeeded,
    /// The call was made and failed
    Failed {
        /// What went wrong
        reason: String,
    },
    /// The call was not made
    Skipped {
        /// Why it was not attempted
        reason: String,
    },
}

impl StepOutcome {
    /// Check if the step succeeded.
    #[must_use]
    pub const fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    fn from_result<T>(result: BrokerResult<T>) -> Self {
        match result {
            Ok(_) => Self::Succeeded,
            Err(e) => Self::Failed {
                reason: e.to_string(),
            },
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
        }
    }
}

/// Outcome of the publishing sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Pact version the results were attached to
    pub pact_version: Option<String>,
    /// Fetching the latest pact version
    pub fetch_version: StepOutcome,
    /// Posting the verification results
    pub verification_results: StepOutcome,
    /// Tagging the provider version with the branch
    pub tag: StepOutcome,
}

impl PublishReport {
    /// A report where no call was attempted.
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        let skipped = StepOutcome::Skipped {
            reason: reason.into(),
        };
        Self {
            pact_version: None,
            fetch_version: skipped.clone(),
            verification_results: skipped.clone(),
            tag: skipped,
        }
    }

    /// Check if every step succeeded.
    #[must_use]
    pub const fn all_succeeded(&self) -> bool {
        self.fetch_version.is_succeeded()
            && self.verification_results.is_succeeded()
            && self.tag.is_succeeded()
    }
}

/// Latest contract for a pair, as served by the broker.
#[derive(Debug, Clone)]
pub struct LatestPact {
    /// The contract document
    pub contract: Contract,
    /// Content version id from `_links["pb:pact-version"].name`
    pub pact_version: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerificationResultBody<'a> {
    success: bool,
    provider_application_version: &'a str,
    verified_by: VerifiedBy,
}

#[derive(Debug, Serialize)]
struct VerifiedBy {
    implementation: &'static str,
    version: &'static str,
}

/// Broker REST client.
#[derive(Debug, Clone)]
pub struct BrokerClient {
    config: BrokerConfig,
    client: reqwest::Client,
}

impl BrokerClient {
    /// Create a client with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: BrokerConfig) -> Result<Self, CommonError> {
        let http = HttpConfig::for_component("broker").with_timeout(config.timeout);
        let client = build_http_client(&http).map_err(CommonError::Http)?;
        Ok(Self { config, client })
    }

    /// Broker base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    fn url(&self, segments: &[&str]) -> BrokerResult<Url> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| BrokerError::InvalidUrl(self.config.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, HAL_JSON);
        match &self.config.auth {
            Some(BrokerAuth::Token(token)) => builder.bearer_auth(token),
            Some(BrokerAuth::Basic { username, password }) => {
                builder.basic_auth(username, Some(password))
            }
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> BrokerResult<Response> {
        let response = builder.send().await.map_err(CommonError::from_transport)?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(CommonError::unexpected_status(status.as_u16(), body).into())
        }
    }

    async fn latest_document(&self, provider: &str, consumer: &str) -> BrokerResult<(Url, Vec<u8>)> {
        let url = self.url(&["pacts", "provider", provider, "consumer", consumer, "latest"])?;
        let response = self.send(self.request(Method::GET, url.clone())).await?;
        let raw = response.bytes().await.map_err(CommonError::from_transport)?;
        Ok((url, raw.to_vec()))
    }

    /// Fetch the latest contract for the pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker is unreachable, answers with a
    /// non-success status, or serves an invalid contract.
    pub async fn latest_pact(&self, provider: &str, consumer: &str) -> BrokerResult<LatestPact> {
        let (url, raw) = self.latest_document(provider, consumer).await?;
        let contract = ContractStore::parse(&raw, url.as_str())?;
        let pact_version = serde_json::from_slice::<Value>(&raw)
            .ok()
            .and_then(|doc| pact_version_link(&doc));
        info!(%url, interactions = contract.interactions.len(), "Fetched contract from broker");
        Ok(LatestPact {
            contract,
            pact_version,
        })
    }

    /// Fetch the content version id of the latest contract for the pair.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::MissingPactVersion`] if the link is absent.
    pub async fn pact_version(&self, provider: &str, consumer: &str) -> BrokerResult<String> {
        let (_, raw) = self.latest_document(provider, consumer).await?;
        let doc: Value = serde_json::from_slice(&raw).map_err(CommonError::from)?;
        pact_version_link(&doc).ok_or(BrokerError::MissingPactVersion)
    }

    /// Post verification results for a pact version.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn publish_results(&self, run: &VerificationRun, pact_version: &str) -> BrokerResult<()> {
        let url = self.url(&[
            "pacts",
            "provider",
            &run.provider,
            "consumer",
            &run.consumer,
            "pact-version",
            pact_version,
            "verification-results",
        ])?;
        let body = VerificationResultBody {
            success: run.overall_success,
            provider_application_version: &run.provider_version,
            verified_by: VerifiedBy {
                implementation: "contract-testing-rs",
                version: env!("CARGO_PKG_VERSION"),
            },
        };
        self.send(self.request(Method::POST, url).json(&body)).await?;
        Ok(())
    }

    /// Tag a provider version with a branch name.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn tag_version(&self, provider: &str, version: &str, branch: &str) -> BrokerResult<()> {
        let url = self.url(&["pacticipants", provider, "versions", version, "tags", branch])?;
        self.send(self.request(Method::PUT, url).json(&json!({}))).await?;
        Ok(())
    }

    /// Run the publishing sequence for a finished run.
    ///
    /// If the pact version cannot be determined, the remaining steps are skipped.
    #[instrument(skip_all, fields(provider = %run.provider, consumer = %run.consumer, version = %run.provider_version))]
    pub async fn publish(&self, run: &VerificationRun, branch: &str) -> PublishReport {
        let (pact_version, fetch_version) = match self.pact_version(&run.provider, &run.consumer).await {
            Ok(version) => (Some(version), StepOutcome::Succeeded),
            Err(e) => (
                None,
                StepOutcome::Failed {
                    reason: e.to_string(),
                },
            ),
        };
        log_step("fetch pact version", &fetch_version);

        let (verification_results, tag) = match pact_version.as_deref() {
            Some(version) => {
                let results = StepOutcome::from_result(self.publish_results(run, version).await);
                log_step("publish verification results", &results);
                let tag = StepOutcome::from_result(
                    self.tag_version(&run.provider, &run.provider_version, branch)
                        .await,
                );
                log_step("tag provider version", &tag);
                (results, tag)
            }
            None => {
                let skipped = StepOutcome::Skipped {
                    reason: "pact version unknown".to_string(),
                };
                log_step("publish verification results", &skipped);
                log_step("tag provider version", &skipped);
                (skipped.clone(), skipped)
            }
        };

        PublishReport {
            pact_version,
            fetch_version,
            verification_results,
            tag,
        }
    }
}

/// Publish `run` without ever failing the caller.
///
/// A client that cannot be built skips every step; the run's outcome is
/// decided before this is called and is never changed by it.
pub async fn publish_best_effort(config: BrokerConfig, run: &VerificationRun, branch: &str) -> PublishReport {
    match BrokerClient::new(config) {
        Ok(broker) => broker.publish(run, branch).await,
        Err(e) => {
            warn!(error = %e, "Broker client unavailable, skipping publication");
            PublishReport::skipped(format!("broker client unavailable: {e}"))
        }
    }
}

fn pact_version_link(doc: &Value) -> Option<String> {
    doc.pointer("/_links/pb:pact-version/name")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn log_step(step: &str, outcome: &StepOutcome) {
    match outcome {
        StepOutcome::Succeeded => info!(step, "Broker step succeeded"),
        StepOutcome::Failed { reason } => warn!(step, %reason, "Broker step failed"),
        StepOutcome::Skipped { reason } => warn!(step, %reason, "Broker step skipped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contract_pact::VerificationVerdict;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn run(success: bool) -> VerificationRun {
        let mut run = VerificationRun::from_verdicts(
            "SF-Consumer",
            "VAIS-Producer",
            "1.0.20261016080509",
            vec![VerificationVerdict::compared("a", None, vec![])],
        );
        run.overall_success = success;
        run
    }

    fn client(server: &MockServer) -> BrokerClient {
        BrokerClient::new(BrokerConfig::new(Url::parse(&server.uri()).unwrap())).unwrap()
    }

    fn latest_doc() -> Value {
        json!({
            "consumer": {"name": "SF-Consumer"},
            "provider": {"name": "VAIS-Producer"},
            "interactions": [],
            "metadata": {"pactSpecification": {"version": "3.0.0"}},
            "_links": {"pb:pact-version": {"name": "abc123"}}
        })
    }

    #[tokio::test]
    async fn test_publish_full_sequence() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pacts/provider/VAIS-Producer/consumer/SF-Consumer/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(latest_doc()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(
                "/pacts/provider/VAIS-Producer/consumer/SF-Consumer/pact-version/abc123/verification-results",
            ))
            .and(body_json(json!({
                "success": true,
                "providerApplicationVersion": "1.0.20261016080509",
                "verifiedBy": {"implementation": "contract-testing-rs", "version": env!("CARGO_PKG_VERSION")}
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/pacticipants/VAIS-Producer/versions/1.0.20261016080509/tags/main"))
            .and(body_json(json!({})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let report = client(&server).publish(&run(true), "main").await;
        assert!(report.all_succeeded(), "{report:?}");
        assert_eq!(report.pact_version.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_missing_link_skips_remaining_steps() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"_links": {}})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let report = client(&server).publish(&run(false), "main").await;
        assert!(matches!(report.fetch_version, StepOutcome::Failed { .. }));
        assert!(matches!(report.verification_results, StepOutcome::Skipped { .. }));
        assert!(matches!(report.tag, StepOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_tag_failure_is_isolated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(latest_doc()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500).set_body_string("tag store down"))
            .mount(&server)
            .await;

        let report = client(&server).publish(&run(true), "main").await;
        assert!(report.verification_results.is_succeeded());
        assert_eq!(
            report.tag,
            StepOutcome::Failed {
                reason: "Unexpected status 500: tag store down".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_bearer_auth_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(latest_doc()))
            .expect(1)
            .mount(&server)
            .await;

        let config = BrokerConfig::new(Url::parse(&server.uri()).unwrap())
            .with_auth(BrokerAuth::Token("s3cret".to_string()));
        let version = BrokerClient::new(config)
            .unwrap()
            .pact_version("VAIS-Producer", "SF-Consumer")
            .await
            .unwrap();
        assert_eq!(version, "abc123");
    }

    #[tokio::test]
    async fn test_latest_pact_parses_contract() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(latest_doc()))
            .mount(&server)
            .await;

        let latest = client(&server)
            .latest_pact("VAIS-Producer", "SF-Consumer")
            .await
            .unwrap();
        assert_eq!(latest.contract.consumer.name, "SF-Consumer");
        assert_eq!(latest.pact_version.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_invalid_contract_from_broker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"_links": {}})))
            .mount(&server)
            .await;

        let err = client(&server)
            .latest_pact("VAIS-Producer", "SF-Consumer")
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::InvalidContract(_)));
    }

    #[test]
    fn test_skipped_report() {
        let report = PublishReport::skipped("broker client unavailable: tls");
        assert!(!report.all_succeeded());
        assert_eq!(report.pact_version, None);
        assert_eq!(report.tag.to_string(), "skipped: broker client unavailable: tls");
    }

    #[tokio::test]
    async fn test_best_effort_publish_against_dead_broker() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = BrokerConfig::new(Url::parse(&format!("http://127.0.0.1:{port}")).unwrap());

        let report = publish_best_effort(config, &run(true), "main").await;
        assert!(matches!(report.fetch_version, StepOutcome::Failed { .. }));
        assert!(matches!(report.verification_results, StepOutcome::Skipped { .. }));
        assert!(matches!(report.tag, StepOutcome::Skipped { .. }));
    }

    #[test]
    fn test_url_segments_are_encoded() {
        let client = BrokerClient::new(BrokerConfig::new(Url::parse("http://broker:9292/base/").unwrap())).unwrap();
        let url = client
            .url(&["pacticipants", "p", "versions", "1.0", "tags", "feature/x"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://broker:9292/base/pacticipants/p/versions/1.0/tags/feature%2Fx"
        );
    }
}
