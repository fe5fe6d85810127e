//! Decision engine tests: parsing, policy matching and the three outcomes.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use ip_whitelist::{
    Address, AllowList, AuthError, Authorizer, Decision, DenyReason, Mode, Policy, SubnetRule,
};

fn addr(text: &str) -> Address {
    Address::parse(text).unwrap()
}

fn subnet(network: &str, mask_bits: u8) -> SubnetRule {
    SubnetRule::new(addr(network), mask_bits).unwrap()
}

mod parsing {
    use super::*;

    #[test]
    fn test_every_octet_value_parses() {
        for value in 0..=255u8 {
            let text = format!("{value}.{value}.{value}.{value}");
            assert_eq!(Address::parse(&text).unwrap().octets(), [value; 4]);
        }
    }

    #[test]
    fn test_out_of_range_octet_in_any_position() {
        for position in 0..4 {
            let mut groups = ["1", "2", "3", "4"];
            groups[position] = "256";
            let text = groups.join(".");
            assert!(
                matches!(Address::parse(&text), Err(AuthError::InvalidAddress(_))),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn test_wrong_group_counts() {
        for text in ["1", "1.2", "1.2.3", "1.2.3.4.5", "1.2.3.4.5.6"] {
            assert!(Address::parse(text).is_err(), "{text} should be rejected");
        }
    }
}

mod subnet_policies {
    use super::*;

    #[test]
    fn test_network_address_always_matches() {
        for (network, bits) in [
            ("10.0.0.0", 8),
            ("172.24.0.0", 16),
            ("192.143.0.0", 14),
            ("192.168.10.0", 24),
            ("192.168.1.8", 30),
        ] {
            let policy = Policy::subnet(subnet(network, bits));
            assert!(policy.matches(&addr(network)), "{network}/{bits}");
        }
    }

    #[test]
    fn test_host_bits_within_mask_match() {
        let policy = Policy::subnet(subnet("10.0.0.0", 8));
        for client in ["10.1.2.3", "10.255.255.255", "10.0.0.1"] {
            assert!(policy.matches(&addr(client)), "{client}");
        }
    }

    #[test]
    fn test_network_prefix_difference_never_matches() {
        let policy = Policy::subnet(subnet("172.24.0.0", 16));
        for client in ["173.24.0.0", "172.25.0.0", "171.24.4.4", "172.23.255.255"] {
            assert!(!policy.matches(&addr(client)), "{client}");
        }
    }
}

mod allow_list_policies {
    use super::*;

    #[test]
    fn test_membership_is_exact() {
        let policy = Policy::allow_list(AllowList::new([addr("192.143.0.1")])).unwrap();

        assert!(policy.matches(&addr("192.143.0.1")));
        for client in ["192.143.0.0", "192.143.0.2", "192.143.1.1", "193.143.0.1"] {
            assert!(!policy.matches(&addr(client)), "{client}");
        }
    }
}

mod decisions {
    use super::*;

    #[tokio::test]
    async fn test_subnet_terminate_chain_scenario() {
        let authorizer =
            Authorizer::new(Policy::subnet(subnet("172.24.0.0", 16)), Mode::TerminateChain);

        assert_eq!(
            authorizer.authorize(Some("172.24.4.4")).await,
            Decision::Accepted {
                identity: addr("172.24.4.4")
            }
        );
        assert_eq!(
            authorizer
                .authorize(Some("172.24.255.255"))
                .await
                .identity(),
            Some(addr("172.24.255.255"))
        );
        assert_eq!(
            authorizer.authorize(Some("172.18.4.4")).await,
            Decision::Denied(DenyReason::Forbidden)
        );
    }

    #[tokio::test]
    async fn test_allow_list_forward_scenario() {
        let policy = Policy::allow_list(AllowList::new([
            addr("192.143.0.1"),
            addr("192.143.10.10"),
        ]))
        .unwrap();
        let authorizer = Authorizer::new(policy, Mode::ForwardToNext);

        assert_eq!(
            authorizer.authorize(Some("192.143.0.1")).await,
            Decision::PassThrough
        );
        assert_eq!(
            authorizer.authorize(Some("172.18.4.4")).await,
            Decision::Denied(DenyReason::Forbidden)
        );
    }

    #[tokio::test]
    async fn test_combined_policy_scenario() {
        let policy = Policy::new(
            Some(subnet("192.143.0.0", 16)),
            Some(AllowList::new([addr("192.143.0.1")])),
        )
        .unwrap();

        for mode in [Mode::ForwardToNext, Mode::TerminateChain] {
            let authorizer = Authorizer::new(policy.clone(), mode);

            assert!(authorizer.authorize(Some("172.24.0.5")).await.is_denied());

            let matched = authorizer.authorize(Some("192.143.0.1")).await;
            match mode {
                Mode::ForwardToNext => assert_eq!(matched, Decision::PassThrough),
                Mode::TerminateChain => {
                    assert_eq!(matched.identity(), Some(addr("192.143.0.1")))
                }
            }
        }
    }

    #[tokio::test]
    async fn test_malformed_address_denied_regardless_of_policy() {
        let policies = [
            Policy::subnet(subnet("30.3.0.0", 16)),
            Policy::allow_list(AllowList::new([addr("30.3.0.30")])).unwrap(),
        ];

        for policy in policies {
            for mode in [Mode::ForwardToNext, Mode::TerminateChain] {
                let authorizer = Authorizer::new(policy.clone(), mode);
                assert_eq!(
                    authorizer.authorize(Some("30.3.0.300")).await,
                    Decision::Denied(DenyReason::InvalidAddress)
                );
            }
        }
    }

    #[tokio::test]
    async fn test_concurrent_decisions_are_independent() {
        let authorizer =
            Authorizer::new(Policy::subnet(subnet("172.24.0.0", 16)), Mode::TerminateChain);

        let handles: Vec<_> = (0..64u8)
            .map(|i| {
                let authorizer = authorizer.clone();
                tokio::spawn(async move {
                    let client = if i % 2 == 0 {
                        format!("172.24.{i}.1")
                    } else {
                        format!("172.18.{i}.1")
                    };
                    (i, authorizer.authorize(Some(&client)).await)
                })
            })
            .collect();

        for handle in handles {
            let (i, decision) = handle.await.unwrap();
            assert_eq!(decision.is_denied(), i % 2 == 1, "request {i}");
        }
    }
}
