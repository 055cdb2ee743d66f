//! Verification verdicts and run aggregation.

use crate::matching::Mismatch;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why an interaction failed verification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// The provider answered but the response did not match
    ResponseMismatch,
    /// The provider could not be reached
    ProviderUnreachable,
    /// The request could not be built or the exchange broke after connecting
    RequestFailed,
}

/// Outcome of replaying one interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationVerdict {
    /// Interaction description
    pub interaction_description: String,
    /// Provider state the interaction declared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_state: Option<String>,
    /// Whether the interaction passed
    pub passed: bool,
    /// Failure category when not passed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Field-level differences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mismatches: Vec<Mismatch>,
    /// Transport error detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Provider state setup problem; does not fail the interaction by itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_setup_warning: Option<String>,
}

impl VerificationVerdict {
    /// Verdict from a comparison; passes when there are no mismatches.
    #[must_use]
    pub fn compared(
        description: impl Into<String>,
        provider_state: Option<String>,
        mismatches: Vec<Mismatch>,
    ) -> Self {
        let passed = mismatches.is_empty();
        Self {
            interaction_description: description.into(),
            provider_state,
            passed,
            failure: (!passed).then_some(FailureKind::ResponseMismatch),
            mismatches,
            error: None,
            state_setup_warning: None,
        }
    }

    /// Verdict for an interaction whose request never reached the provider.
    #[must_use]
    pub fn unreachable(
        description: impl Into<String>,
        provider_state: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            interaction_description: description.into(),
            provider_state,
            passed: false,
            failure: Some(FailureKind::ProviderUnreachable),
            mismatches: Vec::new(),
            error: Some(error.into()),
            state_setup_warning: None,
        }
    }

    /// Verdict for a replay that failed for a reason other than reachability.
    #[must_use]
    pub fn request_failed(
        description: impl Into<String>,
        provider_state: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            failure: Some(FailureKind::RequestFailed),
            ..Self::unreachable(description, provider_state, error)
        }
    }

    /// Attach a provider state warning.
    #[must_use]
    pub fn with_state_warning(mut self, warning: Option<String>) -> Self {
        self.state_setup_warning = warning;
        self
    }

    /// Check if the provider was unreachable for this interaction.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        self.failure == Some(FailureKind::ProviderUnreachable)
    }
}

/// Aggregated outcome of verifying one contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRun {
    /// Consumer name
    pub consumer: String,
    /// Provider name
    pub provider: String,
    /// Provider version under verification
    pub provider_version: String,
    /// True iff every verdict passed
    pub overall_success: bool,
    /// True iff every interaction failed with the provider unreachable
    pub provider_down: bool,
    /// One verdict per interaction, in contract order
    pub verdicts: Vec<VerificationVerdict>,
}

impl VerificationRun {
    /// Aggregate verdicts into a run.
    #[must_use]
    pub fn from_verdicts(
        consumer: impl Into<String>,
        provider: impl Into<String>,
        provider_version: impl Into<String>,
        verdicts: Vec<VerificationVerdict>,
    ) -> Self {
        let overall_success = verdicts.iter().all(|v| v.passed);
        let provider_down = !verdicts.is_empty() && verdicts.iter().all(VerificationVerdict::is_unreachable);

        Self {
            consumer: consumer.into(),
            provider: provider.into(),
            provider_version: provider_version.into(),
            overall_success,
            provider_down,
            verdicts,
        }
    }

    /// Verdicts that did not pass.
    pub fn failed_verdicts(&self) -> impl Iterator<Item = &VerificationVerdict> {
        self.verdicts.iter().filter(|v| !v.passed)
    }

    /// Human-readable report listing every failing interaction.
    #[must_use]
    pub fn report(&self) -> String {
        self.to_string()
    }

    /// Convert a failed run into an error carrying the report.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationFailure`] when any interaction failed.
    pub fn into_result(self) -> Result<Self, VerificationFailure> {
        if self.overall_success {
            Ok(self)
        } else {
            Err(VerificationFailure {
                report: self.report(),
                run: Box::new(self),
            })
        }
    }
}

impl fmt::Display for VerificationRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = self.failed_verdicts().count();
        writeln!(
            f,
            "Verifying {} against {} (version {}): {} interaction(s), {} failed",
            self.consumer,
            self.provider,
            self.provider_version,
            self.verdicts.len(),
            failed
        )?;
        if self.provider_down {
            writeln!(f, "Provider is down: no interaction could reach it")?;
        }

        for verdict in &self.verdicts {
            let status = if verdict.passed { "OK" } else { "FAILED" };
            match &verdict.provider_state {
                Some(state) => writeln!(
                    f,
                    "  [{status}] {} (given {state})",
                    verdict.interaction_description
                )?,
                None => writeln!(f, "  [{status}] {}", verdict.interaction_description)?,
            }
            if let Some(warning) = &verdict.state_setup_warning {
                writeln!(f, "      warning: {warning}")?;
            }
            if let Some(error) = &verdict.error {
                let label = if verdict.is_unreachable() {
                    "provider unreachable"
                } else {
                    "request failed"
                };
                writeln!(f, "      {label}: {error}")?;
            }
            for mismatch in &verdict.mismatches {
                writeln!(f, "      {mismatch}")?;
            }
        }
        Ok(())
    }
}

/// A run with at least one failing interaction.
#[derive(Error, Debug)]
#[error("{report}")]
pub struct VerificationFailure {
    /// Rendered report
    pub report: String,
    /// The failed run
    pub run: Box<VerificationRun>,
}
