//! Test fixtures for the BulkUsers sample contract.
//!
//! This module provides the user payloads and the three consumer scenarios
//! recorded by `SF-Consumer` against `VAIS-Producer`.

use contract_mock_server::PactBuilder;
use contract_pact::Matcher;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Consumer name used by the sample contract.
pub const CONSUMER: &str = "SF-Consumer";
/// Provider name used by the sample contract.
pub const PROVIDER: &str = "VAIS-Producer";

/// Token the sample provider accepts.
pub const VALID_TOKEN: &str = "valid-token-from-SF";
/// Token the sample provider rejects.
pub const INVALID_TOKEN: &str = "invalid-token";
/// Windows account the sample provider does not know.
pub const UNKNOWN_WINDOWS_USER: &str = "invalid-user";
/// Subject the consumer sees from the mock server.
pub const EXAMPLE_SUBJECT: &str = "user-subject-id-123";

/// Provider state for scenario A.
pub const STATE_INVALID_TOKEN: &str = "Invalid authentication token provided";
/// Provider state for scenario B.
pub const STATE_USERS_EXIST: &str = "Valid Windows users exist in VAIS";
/// Provider state for scenario C.
pub const STATE_UNKNOWN_WINDOWS_USER: &str = "Windows user does not exist in domain";

/// Scenario A description.
pub const INVALID_TOKEN_DESCRIPTION: &str = "A POST request to BulkUsers with invalid token";
/// Scenario B description.
pub const VALID_USER_DESCRIPTION: &str = "A POST request to sync users via BulkUsers API";
/// Scenario C description.
pub const UNKNOWN_WINDOWS_USER_DESCRIPTION: &str =
    "A POST request to BulkUsers with invalid Windows user";

/// A user in a BulkUsers request or response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Display name
    pub display_name: String,
    /// Linked identity providers
    pub identity_providers: Vec<IdentityProvider>,
    /// Whether the account is disabled
    pub is_account_disabled: bool,
    /// Provider-assigned subject; `null` on requests
    pub subject: Option<String>,
}

/// An identity provider link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProvider {
    /// Provider kind, e.g. `windows`
    pub provider: String,
    /// Account id at the provider
    pub provider_id: String,
}

/// Error body returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: String,
    /// Human-readable message
    pub message: String,
}

impl User {
    /// A user linked to a windows account.
    #[must_use]
    pub fn windows(display_name: &str, provider_id: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            identity_providers: vec![IdentityProvider {
                provider: "windows".to_string(),
                provider_id: provider_id.to_string(),
            }],
            is_account_disabled: false,
            subject: None,
        }
    }

    /// The user scenario B syncs.
    #[must_use]
    pub fn test_user() -> Self {
        Self::windows("TestUser", "vms\\administrator")
    }

    /// The user scenario C syncs.
    #[must_use]
    pub fn unknown_windows_user() -> Self {
        Self::windows("InvalidUser", UNKNOWN_WINDOWS_USER)
    }

    /// JSON form of this user.
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl ErrorResponse {
    /// The provider's answer for an unknown windows account.
    #[must_use]
    pub fn unknown_windows_user(user: &str) -> Self {
        Self {
            error: "InvalidWindowsUserName".to_string(),
            message: format!("Invalid UserName. User '{user}' does not exist in Windows."),
        }
    }
}

/// `Bearer <token>` header value.
#[must_use]
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Scenario A: an invalid token is rejected with 401 and no body assertions.
pub fn invalid_token_scenario(pact: &mut PactBuilder) {
    pact.upon_receiving(INVALID_TOKEN_DESCRIPTION)
        .given(STATE_INVALID_TOKEN)
        .with_request("POST", "/BulkUsers")
        .with_header("Authorization", bearer(INVALID_TOKEN))
        .with_header("Content-Type", "application/json")
        .with_json_body(json!([]))
        .will_respond()
        .with_status(401);
}

/// Scenario B: a known user comes back with a generated subject.
pub fn valid_user_scenario(pact: &mut PactBuilder) {
    let mut expected = Matcher::from(User::test_user().to_json());
    if let Matcher::Object(fields) = &mut expected {
        fields.insert(
            "subject".to_string(),
            Matcher::like(json!(EXAMPLE_SUBJECT)),
        );
    }

    pact.upon_receiving(VALID_USER_DESCRIPTION)
        .given(STATE_USERS_EXIST)
        .with_request("POST", "/BulkUsers")
        .with_header("Authorization", bearer(VALID_TOKEN))
        .with_header("Content-Type", "application/json")
        .with_json_body(json!([User::test_user().to_json()]))
        .will_respond()
        .with_status(200)
        .with_header("Content-Type", "application/json")
        .with_json_body(Matcher::Array(vec![expected]));
}

/// Scenario C: an unknown windows account is rejected with 400.
pub fn unknown_windows_user_scenario(pact: &mut PactBuilder) {
    pact.upon_receiving(UNKNOWN_WINDOWS_USER_DESCRIPTION)
        .given(STATE_UNKNOWN_WINDOWS_USER)
        .with_request("POST", "/BulkUsers")
        .with_header("Authorization", bearer(VALID_TOKEN))
        .with_header("Content-Type", "application/json")
        .with_json_body(json!([User::unknown_windows_user().to_json()]))
        .will_respond()
        .with_status(400)
        .with_header("Content-Type", "application/json")
        .with_json_body(Matcher::Object(BTreeMap::from([
            ("error".to_string(), Matcher::from("InvalidWindowsUserName")),
            ("message".to_string(), Matcher::include(UNKNOWN_WINDOWS_USER)),
        ])));
}

/// Declare all three scenarios.
pub fn bulk_users_scenarios(pact: &mut PactBuilder) {
    invalid_token_scenario(pact);
    valid_user_scenario(pact);
    unknown_windows_user_scenario(pact);
}
