//! Shared proptest generators for contract types.
//!
//! Generated matchers always satisfy their own examples, so any generated
//! contract passes `Contract::validate`.

use contract_pact::{Contract, Interaction, Matcher, Request, Response};
use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Generate participant names.
pub fn participant_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("SF-Consumer".to_string()),
        Just("VAIS-Producer".to_string()),
        "[A-Z][a-z]{2,10}-(Consumer|Provider)",
    ]
}

/// Generate HTTP methods.
pub fn http_method_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("GET".to_string()),
        Just("POST".to_string()),
        Just("PUT".to_string()),
        Just("DELETE".to_string()),
        Just("PATCH".to_string()),
    ]
}

/// Generate request paths.
pub fn path_strategy() -> impl Strategy<Value = String> {
    "/[a-zA-Z][a-zA-Z0-9/-]{2,30}"
}

/// Generate valid HTTP status codes.
pub fn http_status_code_strategy() -> impl Strategy<Value = u16> {
    prop_oneof![
        Just(200u16),
        Just(201u16),
        Just(204u16),
        Just(400u16),
        Just(401u16),
        Just(403u16),
        Just(404u16),
        Just(500u16),
    ]
}

/// Generate object keys.
pub fn json_key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9]{0,12}"
}

/// Generate JSON scalars.
pub fn json_scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 ._-]{0,20}".prop_map(Value::String),
    ]
}

/// Generate arbitrary JSON documents up to a small depth.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    json_scalar_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..4).prop_map(Value::Array),
            btree_map(json_key_strategy(), inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Generate JSON objects.
pub fn json_object_strategy() -> impl Strategy<Value = Map<String, Value>> {
    btree_map(json_key_strategy(), json_value_strategy(), 0..5)
        .prop_map(|m| m.into_iter().collect())
}

/// Generate leaf matchers that accept their own example.
pub fn leaf_matcher_strategy() -> impl Strategy<Value = Matcher> {
    prop_oneof![
        json_scalar_strategy().prop_map(Matcher::from),
        json_scalar_strategy().prop_map(Matcher::like),
        "[a-z]{1,8}".prop_map(|s| Matcher::regex("^[a-z]+$", s)),
        "[a-z]{1,4}".prop_map(Matcher::include),
        any::<i32>().prop_map(|n| Matcher::integer(i64::from(n))),
        (-1.0e6f64..1.0e6).prop_map(Matcher::decimal),
    ]
}

/// Generate matcher trees that accept their own example.
pub fn matcher_strategy() -> impl Strategy<Value = Matcher> {
    leaf_matcher_strategy().prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            btree_map(json_key_strategy(), inner.clone(), 0..3).prop_map(Matcher::Object),
            vec(inner.clone(), 0..3).prop_map(Matcher::Array),
            (inner, 0usize..3).prop_map(|(template, min)| Matcher::each_like(template, min)),
        ]
    })
}

/// Generate header maps with literal values.
pub fn headers_strategy() -> impl Strategy<Value = BTreeMap<String, Matcher>> {
    btree_map(
        "X-[A-Z][a-z]{2,8}",
        "[a-zA-Z0-9]{1,16}".prop_map(Matcher::from),
        0..3,
    )
}

/// Generate a single interaction with the given description.
pub fn interaction_strategy(description: String) -> impl Strategy<Value = Interaction> {
    (
        proptest::option::of("[A-Z][a-z ]{4,30}"),
        http_method_strategy(),
        path_strategy(),
        headers_strategy(),
        proptest::option::of(matcher_strategy()),
        http_status_code_strategy(),
        headers_strategy(),
        proptest::option::of(matcher_strategy()),
    )
        .prop_map(
            move |(state, method, path, req_headers, req_body, status, res_headers, res_body)| {
                Interaction {
                    description: description.clone(),
                    provider_state: state,
                    provider_state_params: None,
                    request: Request {
                        method,
                        path,
                        headers: req_headers,
                        body: req_body,
                    },
                    response: Response {
                        status,
                        headers: res_headers,
                        body: res_body,
                    },
                }
            },
        )
}

/// Generate a contract with uniquely described interactions.
pub fn contract_strategy() -> impl Strategy<Value = Contract> {
    (participant_name_strategy(), participant_name_strategy(), 0usize..5).prop_flat_map(
        |(consumer, provider, count)| {
            let interactions: Vec<_> = (0..count)
                .map(|i| interaction_strategy(format!("interaction {i}")))
                .collect();
            interactions.prop_map(move |interactions| Contract {
                interactions,
                ..Contract::new(consumer.clone(), provider.clone())
            })
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use contract_pact::match_value;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn test_generated_matchers_accept_examples() {
        let mut runner = TestRunner::default();
        for _ in 0..50 {
            let matcher = matcher_strategy().new_tree(&mut runner).unwrap().current();
            assert!(matcher.validate("$").is_ok());
            assert!(match_value(&matcher, &matcher.example(), "$").is_empty());
        }
    }

    #[test]
    fn test_generated_contracts_validate() {
        let mut runner = TestRunner::default();
        for _ in 0..20 {
            let contract = contract_strategy().new_tree(&mut runner).unwrap().current();
            assert!(contract.validate().is_ok());
        }
    }
}
