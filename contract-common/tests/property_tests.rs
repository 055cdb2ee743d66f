//! Property-based tests for contract-common crate.

use contract_common::{CommonError, HttpConfig};
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_network_failures_are_consistent(
        msg in "[a-zA-Z0-9 ]{1,50}",
        status in 100u16..600,
    ) {
        let network = vec![
            CommonError::Unreachable(msg.clone()),
            CommonError::Timeout(msg.clone()),
        ];

        for err in network {
            prop_assert!(err.is_network_failure(), "Error {:?} should be a network failure", err);
        }

        let application = vec![
            CommonError::unexpected_status(status, msg.clone()),
            CommonError::invalid_input(msg.clone()),
        ];

        for err in application {
            prop_assert!(!err.is_network_failure(), "Error {:?} should not be a network failure", err);
        }
    }

    #[test]
    fn prop_unexpected_status_display_includes_status(
        status in 100u16..600,
        body in "[a-z]{0,20}",
    ) {
        let err = CommonError::unexpected_status(status, body.clone());
        let rendered = err.to_string();
        prop_assert!(rendered.contains(&status.to_string()));
        prop_assert!(rendered.ends_with(&body));
    }

    #[test]
    fn prop_http_config_timeout_is_kept(secs in 1u64..600) {
        let config = HttpConfig::default().with_timeout(Duration::from_secs(secs));
        prop_assert_eq!(config.timeout, Duration::from_secs(secs));
        prop_assert!(config.connect_timeout <= config.timeout);
    }
}
