//! Property-based tests for the contract library.
//!
//! Tests validate:
//! - Contract serialization round-trip, on the wire and through the store
//! - Matching is independent of object key order
//! - Matching tolerates extra keys and rejects missing ones
//! - Every matcher accepts its own rendered example

use contract_pact::{Contract, ContractStore, Matcher, match_value};
use proptest::prelude::*;
use serde_json::{Map, Value};
use tempfile::TempDir;
use test_utils::{
    contract_strategy, json_key_strategy, json_object_strategy, json_value_strategy,
    matcher_strategy,
};

fn reversed(object: &Map<String, Value>) -> Value {
    let mut pairs: Vec<_> = object.iter().collect();
    pairs.reverse();
    let mut out = Map::new();
    for (key, value) in pairs {
        out.insert(key.clone(), value.clone());
    }
    Value::Object(out)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* valid contract, serialization to JSON and back yields the same contract.
    #[test]
    fn prop_contract_serialization_roundtrip(contract in contract_strategy()) {
        let json = serde_json::to_string(&contract).unwrap();
        let restored: Contract = serde_json::from_str(&json).unwrap();

        prop_assert_eq!(contract, restored,
            "Contract should survive serialization roundtrip");
    }

    /// *For any* valid contract, `load(save(contract))` yields the same contract.
    #[test]
    fn prop_store_roundtrip(contract in contract_strategy()) {
        let dir = TempDir::new().unwrap();
        let store = ContractStore::new(dir.path());

        let path = store.save(&contract).unwrap();
        let loaded = ContractStore::load(&path).unwrap();

        prop_assert_eq!(contract, loaded);
    }

    /// *For any* matcher, its rendered example satisfies it.
    #[test]
    fn prop_matcher_accepts_example(matcher in matcher_strategy()) {
        let example = matcher.example();
        let mismatches = match_value(&matcher, &example, "$");
        prop_assert!(mismatches.is_empty(), "unexpected mismatches: {:?}", mismatches);
    }

    /// *For any* object, matching does not depend on key order.
    #[test]
    fn prop_matching_is_key_order_independent(object in json_object_strategy()) {
        let expected = Matcher::from(Value::Object(object.clone()));
        prop_assert!(match_value(&expected, &reversed(&object), "$").is_empty());
    }

    /// *For any* object, an additional actual key is tolerated.
    #[test]
    fn prop_extra_keys_tolerated(
        object in json_object_strategy(),
        extra_value in json_value_strategy(),
    ) {
        let expected = Matcher::from(Value::Object(object.clone()));
        let mut actual = object;
        actual.insert("unexpectedExtraKey".to_string(), extra_value);

        prop_assert!(match_value(&expected, &Value::Object(actual), "$").is_empty());
    }

    /// *For any* object, removing an expected key is reported at that key's path.
    #[test]
    fn prop_missing_key_reported(
        object in json_object_strategy(),
        key in json_key_strategy(),
        value in json_value_strategy(),
    ) {
        let mut object = object;
        object.insert(key.clone(), value);
        let expected = Matcher::from(Value::Object(object.clone()));
        let mut actual = object;
        actual.remove(&key);

        let mismatches = match_value(&expected, &Value::Object(actual), "$.body");
        prop_assert_eq!(mismatches.len(), 1);
        prop_assert_eq!(&mismatches[0].path, &format!("$.body.{key}"));
        prop_assert_eq!(mismatches[0].actual.as_str(), "<missing>");
    }
}

#[test]
fn test_store_roundtrip_of_empty_contract() {
    let dir = TempDir::new().unwrap();
    let store = ContractStore::new(dir.path());
    let contract = Contract::new("SF-Consumer", "VAIS-Producer");

    let path = store.save(&contract).unwrap();
    assert_eq!(ContractStore::load(&path).unwrap(), contract);
}
