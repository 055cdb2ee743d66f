//! Replays a contract against a live provider.
//!
//! A run moves through
//! `Idle → Loading → [SettingState → Requesting → Comparing]* → Aggregating → Done`.
//! Interactions are replayed one at a time, in contract order; a failing
//! interaction is recorded and the run continues, so one run always yields a
//! verdict for every interaction.

use crate::broker::BrokerClient;
use crate::config::VerifierConfig;
use crate::error::{BrokerError, VerifierError, VerifierResult};
use crate::provider_state::ProviderStateClient;
use contract_common::{CommonError, HttpConfig, build_http_client};
use contract_pact::{
    Contract, ContractStore, Interaction, ObservedResponse, Request, VerificationRun,
    VerificationVerdict, match_response, parse_body,
};
use reqwest::Method;
use reqwest::header::{HeaderName, HeaderValue};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

/// Stage of a verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationPhase {
    /// Nothing started yet
    Idle,
    /// Reading the contract
    Loading,
    /// Calling the provider state endpoint
    SettingState,
    /// Sending the replayed request
    Requesting,
    /// Matching the live response
    Comparing,
    /// Building the run summary
    Aggregating,
    /// Finished
    Done,
}

impl fmt::Display for VerificationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::SettingState => "setting-state",
            Self::Requesting => "requesting",
            Self::Comparing => "comparing",
            Self::Aggregating => "aggregating",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Where the contract under verification comes from.
#[derive(Debug, Clone)]
pub enum ContractSource {
    /// A contract file on disk
    File(PathBuf),
    /// The broker's latest contract for the configured pair
    Broker(BrokerClient),
}

/// Provider verifier.
#[derive(Debug, Clone)]
pub struct Verifier {
    config: VerifierConfig,
    client: reqwest::Client,
    states: Option<ProviderStateClient>,
}

impl Verifier {
    /// Create a verifier for the configured provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: VerifierConfig) -> VerifierResult<Self> {
        let http = HttpConfig::for_component("verifier")
            .with_timeout(config.request_timeout)
            .without_redirects();
        let client = build_http_client(&http).map_err(CommonError::Http)?;
        let states = config
            .provider_states_url
            .clone()
            .map(|url| ProviderStateClient::new(client.clone(), url));
        Ok(Self {
            config,
            client,
            states,
        })
    }

    /// Verifier configuration.
    #[must_use]
    pub const fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Load the contract from `source` and replay it.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::ContractLoad`] or [`VerifierError::ContractFetch`]
    /// if the contract cannot be obtained. Failing interactions are not
    /// errors; they are reported in the returned run.
    #[instrument(skip_all, fields(provider = %self.config.provider_name, consumer = %self.config.consumer_name))]
    pub async fn verify(&self, source: &ContractSource) -> VerifierResult<VerificationRun> {
        debug!(phase = %VerificationPhase::Idle, "Verification requested");
        let contract = self.load(source).await?;
        Ok(self.verify_contract(&contract).await)
    }

    /// Obtain the contract from `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the contract is absent, malformed or unreachable.
    pub async fn load(&self, source: &ContractSource) -> VerifierResult<Contract> {
        debug!(phase = %VerificationPhase::Loading, "Loading contract");
        let contract = match source {
            ContractSource::File(path) => {
                ContractStore::load(path).map_err(VerifierError::ContractLoad)?
            }
            ContractSource::Broker(broker) => broker
                .latest_pact(&self.config.provider_name, &self.config.consumer_name)
                .await
                .map_err(|e| match e {
                    BrokerError::InvalidContract(e) => VerifierError::ContractLoad(e),
                    other => VerifierError::ContractFetch(other),
                })?
                .contract,
        };

        if contract.provider.name != self.config.provider_name {
            warn!(
                expected = %self.config.provider_name,
                actual = %contract.provider.name,
                "Contract names a different provider"
            );
        }
        Ok(contract)
    }

    /// Replay every interaction of `contract` and aggregate the verdicts.
    pub async fn verify_contract(&self, contract: &Contract) -> VerificationRun {
        info!(
            consumer = %contract.consumer.name,
            provider = %contract.provider.name,
            interactions = contract.interactions.len(),
            version = %self.config.provider_version,
            "Verifying contract"
        );

        let mut verdicts = Vec::with_capacity(contract.interactions.len());
        for interaction in &contract.interactions {
            verdicts.push(self.verify_interaction(contract, interaction).await);
        }

        debug!(phase = %VerificationPhase::Aggregating, "Aggregating verdicts");
        let run = VerificationRun::from_verdicts(
            contract.consumer.name.as_str(),
            contract.provider.name.as_str(),
            self.config.provider_version.as_str(),
            verdicts,
        );

        if run.provider_down {
            warn!(base_url = %self.config.provider_base_url, "Provider unreachable for every interaction");
        }
        info!(
            phase = %VerificationPhase::Done,
            success = run.overall_success,
            failed = run.failed_verdicts().count(),
            "Verification finished"
        );
        run
    }

    async fn verify_interaction(
        &self,
        contract: &Contract,
        interaction: &Interaction,
    ) -> VerificationVerdict {
        let description = interaction.description.as_str();
        let state = interaction.provider_state.clone();
        let warning = self.set_up_state(contract, interaction).await;

        debug!(phase = %VerificationPhase::Requesting, description, "Replaying interaction");
        let actual = match self.replay(&interaction.request).await {
            Ok(actual) => actual,
            Err(e) if e.is_network_failure() => {
                warn!(description, error = %e, "Provider unreachable");
                return VerificationVerdict::unreachable(description, state, e.to_string())
                    .with_state_warning(warning);
            }
            Err(e) => {
                warn!(description, error = %e, "Replay request failed");
                return VerificationVerdict::request_failed(description, state, e.to_string())
                    .with_state_warning(warning);
            }
        };

        debug!(phase = %VerificationPhase::Comparing, description, status = actual.status, "Comparing response");
        let mismatches = match_response(&interaction.response, &actual);
        if mismatches.is_empty() {
            info!(description, "Interaction verified");
        } else {
            warn!(description, mismatches = mismatches.len(), "Interaction failed");
        }
        VerificationVerdict::compared(description, state, mismatches).with_state_warning(warning)
    }

    async fn set_up_state(&self, contract: &Contract, interaction: &Interaction) -> Option<String> {
        let state = interaction.provider_state.as_deref()?;
        let Some(states) = &self.states else {
            debug!(state, "No provider state endpoint configured; skipping setup");
            return None;
        };

        debug!(phase = %VerificationPhase::SettingState, state, "Setting provider state");
        match states
            .setup(
                &contract.consumer.name,
                state,
                interaction.provider_state_params.as_ref(),
            )
            .await
        {
            Ok(()) => None,
            Err(e) => {
                warn!(state, error = %e, "Provider state setup failed; continuing");
                Some(format!("provider state '{state}' setup failed: {e}"))
            }
        }
    }

    async fn replay(&self, request: &Request) -> Result<ObservedResponse, CommonError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| CommonError::invalid_input(format!("invalid method '{}'", request.method)))?;
        let url = format!(
            "{}{}",
            self.config.provider_base_url.as_str().trim_end_matches('/'),
            request.path
        );

        let mut builder = self.client.request(method, url);
        for (name, value) in request.rendered_headers() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| CommonError::invalid_input(format!("header '{name}': {e}")))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|e| CommonError::invalid_input(format!("header '{name}': {e}")))?;
            builder = builder.header(name, value);
        }
        if let Some(body) = request.rendered_body() {
            builder = builder.json(&body);
        }

        let response = builder.send().await.map_err(CommonError::from_transport)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let raw = response.bytes().await.map_err(CommonError::from_transport)?;

        Ok(ObservedResponse {
            status,
            headers,
            body: parse_body(&raw),
        })
    }
}
