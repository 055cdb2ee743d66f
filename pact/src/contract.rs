//! Contract types.

use crate::error::{PactError, PactResult};
use crate::matcher::Matcher;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

/// A contract between one consumer and one provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contract {
    /// Consumer participant
    pub consumer: Participant,
    /// Provider participant
    pub provider: Participant,
    /// Contract interactions, in declaration order
    pub interactions: Vec<Interaction>,
    /// Contract metadata
    #[serde(default)]
    pub metadata: ContractMetadata,
}

impl Contract {
    /// Create an empty contract for the given pair.
    #[must_use]
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            consumer: Participant::new(consumer),
            provider: Participant::new(provider),
            interactions: Vec::new(),
            metadata: ContractMetadata::default(),
        }
    }

    /// File name derived from the participant pair.
    #[must_use]
    pub fn file_name(&self) -> String {
        Self::file_name_for(&self.consumer.name, &self.provider.name)
    }

    /// File name for a consumer/provider pair: `{consumer}-{provider}.json`.
    #[must_use]
    pub fn file_name_for(consumer: &str, provider: &str) -> String {
        format!("{consumer}-{provider}.json")
    }

    /// Insert an interaction, replacing any existing one with the same description.
    pub fn upsert(&mut self, interaction: Interaction) {
        match self
            .interactions
            .iter_mut()
            .find(|existing| existing.description == interaction.description)
        {
            Some(existing) => *existing = interaction,
            None => self.interactions.push(interaction),
        }
    }

    /// Find an interaction by description.
    #[must_use]
    pub fn interaction(&self, description: &str) -> Option<&Interaction> {
        self.interactions
            .iter()
            .find(|interaction| interaction.description == description)
    }

    /// Check participant names are file-safe, descriptions are unique and
    /// every matcher is usable.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::InvalidParticipant`], [`PactError::DuplicateInteraction`]
    /// or [`PactError::InvalidMatcher`].
    pub fn validate(&self) -> PactResult<()> {
        Participant::check_name("consumer", &self.consumer.name)?;
        Participant::check_name("provider", &self.provider.name)?;

        let mut seen = HashSet::new();
        for interaction in &self.interactions {
            if !seen.insert(interaction.description.as_str()) {
                return Err(PactError::DuplicateInteraction(
                    interaction.description.clone(),
                ));
            }
            interaction.validate()?;
        }
        Ok(())
    }
}

/// A participant in a contract (consumer or provider).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    /// Participant name
    pub name: String,
}

impl Participant {
    /// Create a new participant.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Reject names that would escape or break `{consumer}-{provider}.json`.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::InvalidParticipant`].
    pub fn check_name(role: &'static str, name: &str) -> PactResult<()> {
        let reason = if name.trim().is_empty() {
            Some("must not be blank")
        } else if name.contains(['/', '\\']) {
            Some("must not contain path separators")
        } else if name.contains("..") {
            Some("must not contain '..'")
        } else if name.chars().any(char::is_control) {
            Some("must not contain control characters")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(PactError::InvalidParticipant {
                role,
                name: name.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

/// An interaction in a contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    /// Interaction description, unique within a contract
    pub description: String,
    /// Provider state (precondition)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_state: Option<String>,
    /// Parameters sent along with the provider state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_state_params: Option<Map<String, Value>>,
    /// Expected request
    pub request: Request,
    /// Expected response
    pub response: Response,
}

impl Interaction {
    fn validate(&self) -> PactResult<()> {
        let base = format!("interaction '{}'", self.description);
        self.request.validate(&format!("{base} request"))?;
        self.response.validate(&format!("{base} response"))
    }
}

/// HTTP request in an interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Request {
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Request headers, matched case-insensitively by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Matcher>,
    /// Request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Matcher>,
}

impl Request {
    /// Headers rendered as literal values.
    #[must_use]
    pub fn rendered_headers(&self) -> Vec<(String, String)> {
        render_headers(&self.headers)
    }

    /// Body rendered as a literal value.
    #[must_use]
    pub fn rendered_body(&self) -> Option<Value> {
        self.body.as_ref().map(Matcher::example)
    }

    fn validate(&self, base: &str) -> PactResult<()> {
        validate_parts(&self.headers, self.body.as_ref(), base)
    }
}

/// HTTP response in an interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Matcher>,
    /// Response body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Matcher>,
}

impl Response {
    /// Headers rendered as literal values.
    #[must_use]
    pub fn rendered_headers(&self) -> Vec<(String, String)> {
        render_headers(&self.headers)
    }

    /// Body rendered as a literal value.
    #[must_use]
    pub fn rendered_body(&self) -> Option<Value> {
        self.body.as_ref().map(Matcher::example)
    }

    fn validate(&self, base: &str) -> PactResult<()> {
        validate_parts(&self.headers, self.body.as_ref(), base)
    }
}

fn render_headers(headers: &BTreeMap<String, Matcher>) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, matcher)| (name.clone(), matcher.example_string()))
        .collect()
}

fn validate_parts(
    headers: &BTreeMap<String, Matcher>,
    body: Option<&Matcher>,
    base: &str,
) -> PactResult<()> {
    for (name, matcher) in headers {
        matcher.validate(&format!("{base} header {name}"))?;
    }
    body.map_or(Ok(()), |body| body.validate(&format!("{base} $.body")))
}

/// Contract metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContractMetadata {
    /// Pact specification version
    #[serde(rename = "pactSpecification")]
    pub pact_specification: PactSpecification,
}

/// Pact specification version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PactSpecification {
    /// Version string
    pub version: String,
}

impl Default for ContractMetadata {
    fn default() -> Self {
        Self {
            pact_specification: PactSpecification {
                version: "3.0.0".to_string(),
            },
        }
    }
}
