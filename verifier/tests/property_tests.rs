//! Property-based tests for the verifier.
//!
//! Tests validate:
//! - Every interaction yields exactly one verdict, in contract order
//! - One failing interaction fails the run without hiding the others
//! - A provider that cannot be reached marks the run as provider-down
//! - Run aggregation is consistent with the verdicts

use contract_pact::{
    Contract, Interaction, Matcher, Request, Response, VerificationRun, VerificationVerdict,
};
use contract_verifier::{Verifier, VerifierConfig};
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use test_utils::contract_strategy;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn item_interaction(i: usize) -> Interaction {
    Interaction {
        description: format!("get item {i}"),
        provider_state: None,
        provider_state_params: None,
        request: Request {
            method: "GET".to_string(),
            path: format!("/items/{i}"),
            headers: BTreeMap::new(),
            body: None,
        },
        response: Response {
            status: 200,
            headers: BTreeMap::new(),
            body: Some(Matcher::from(json!({"id": i}))),
        },
    }
}

fn verifier(base_url: &str) -> Verifier {
    let config = VerifierConfig::new("provider", "consumer", Url::parse(base_url).unwrap())
        .with_provider_states_url(None)
        .with_request_timeout(Duration::from_secs(5));
    Verifier::new(config).unwrap()
}

fn dead_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn verdict_strategy() -> impl Strategy<Value = VerificationVerdict> {
    prop_oneof![
        "[a-z]{3,10}".prop_map(|d| VerificationVerdict::compared(d, None, vec![])),
        "[a-z]{3,10}".prop_map(|d| VerificationVerdict::unreachable(d, None, "connection refused")),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// *For any* N interactions where interaction k fails, the run holds N
    /// verdicts and only verdict k failed.
    #[test]
    fn prop_failing_interaction_is_isolated(n in 1usize..6, k_seed in any::<usize>()) {
        let k = k_seed % n;
        let rt = runtime();
        let run = rt.block_on(async {
            let server = MockServer::start().await;
            for i in 0..n {
                let status = if i == k { 500 } else { 200 };
                Mock::given(method("GET"))
                    .and(path(format!("/items/{i}")))
                    .respond_with(ResponseTemplate::new(status).set_body_json(json!({"id": i})))
                    .mount(&server)
                    .await;
            }

            let mut contract = Contract::new("consumer", "provider");
            contract.interactions = (0..n).map(item_interaction).collect();
            verifier(&server.uri()).verify_contract(&contract).await
        });

        prop_assert_eq!(run.verdicts.len(), n);
        prop_assert!(!run.overall_success);
        prop_assert!(!run.provider_down);
        for (i, verdict) in run.verdicts.iter().enumerate() {
            prop_assert_eq!(&verdict.interaction_description, &format!("get item {i}"));
            prop_assert_eq!(verdict.passed, i != k);
        }
    }

    /// *For any* contract replayed against a closed port, every verdict is
    /// unreachable and the run is provider-down unless it was empty.
    #[test]
    fn prop_unreachable_provider(contract in contract_strategy()) {
        let rt = runtime();
        let base = format!("http://127.0.0.1:{}", dead_port());
        let run = rt.block_on(verifier(&base).verify_contract(&contract));

        prop_assert_eq!(run.verdicts.len(), contract.interactions.len());
        prop_assert!(run.verdicts.iter().all(VerificationVerdict::is_unreachable));
        prop_assert_eq!(run.provider_down, !contract.interactions.is_empty());
        prop_assert_eq!(run.overall_success, contract.interactions.is_empty());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* set of verdicts, the run succeeds iff all passed, and is
    /// provider-down iff it is non-empty and every verdict is unreachable.
    #[test]
    fn prop_run_aggregation(verdicts in proptest::collection::vec(verdict_strategy(), 0..8)) {
        let all_passed = verdicts.iter().all(|v| v.passed);
        let all_unreachable = verdicts.iter().all(VerificationVerdict::is_unreachable);
        let count = verdicts.len();

        let run = VerificationRun::from_verdicts("consumer", "provider", "1.0.0", verdicts);

        prop_assert_eq!(run.verdicts.len(), count);
        prop_assert_eq!(run.overall_success, all_passed);
        prop_assert_eq!(run.provider_down, count > 0 && all_unreachable);
        prop_assert_eq!(run.failed_verdicts().count(), run.verdicts.iter().filter(|v| !v.passed).count());
        prop_assert_eq!(run.into_result().is_ok(), all_passed);
    }
}
