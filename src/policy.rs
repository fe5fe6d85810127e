//! Network policies and the evaluators that match client addresses against them.
//!
//! A [`Policy`] has up to two arms, combined with logical OR:
//!
//! - a [`SubnetRule`]: network address plus mask bits (8-30)
//! - an [`AllowList`]: exact addresses
//!
//! # Border Octet Matching
//!
//! [`SubnetMatching::Legacy`] (the default) compares the octet in which the
//! mask boundary falls with an additive bound rather than a bitmask:
//!
//! ```text
//! border  = mask_bits / 8
//! max     = 2 ^ (8 - mask_bits % 8)
//! network[border] <= client[border] <= network[border] + max
//! ```
//!
//! This admits a slightly wider range than strict CIDR (for example
//! `192.143.0.0/14` admits `192.145.0.0`). Existing deployments rely on it, so
//! it stays the default. [`SubnetMatching::Strict`] performs a proper
//! bitmask-and-compare.

use std::net::Ipv4Addr;
use std::ops::RangeInclusive;

use async_trait::async_trait;
use ipnet::Ipv4Net;
use serde::Deserialize;

use crate::address::Address;
use crate::error::{AuthError, AuthResult};

/// Accepted range for subnet mask bits.
pub const MASK_BITS_RANGE: RangeInclusive<u8> = 8..=30;

const BITS_PER_OCTET: u8 = 8;

/// How the border octet of a subnet rule is compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetMatching {
    /// Additive inclusive bound on the border octet.
    #[default]
    Legacy,
    /// Bitmask-and-compare on the full 32-bit address.
    Strict,
}

/// A network prefix that client addresses are matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetRule {
    network: Address,
    mask_bits: u8,
    matching: SubnetMatching,
    /// Normalized prefix used for strict matching.
    net: Ipv4Net,
}

impl SubnetRule {
    /// Create a subnet rule using [`SubnetMatching::Legacy`].
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ConfigError` if `mask_bits` is outside [`MASK_BITS_RANGE`].
    pub fn new(network: Address, mask_bits: u8) -> AuthResult<Self> {
        Self::with_matching(network, mask_bits, SubnetMatching::default())
    }

    /// Create a subnet rule with an explicit border octet matching mode.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ConfigError` if `mask_bits` is outside [`MASK_BITS_RANGE`].
    pub fn with_matching(
        network: Address,
        mask_bits: u8,
        matching: SubnetMatching,
    ) -> AuthResult<Self> {
        if !MASK_BITS_RANGE.contains(&mask_bits) {
            return Err(AuthError::ConfigError(format!(
                "subnet mask must be between {} and {} (got {mask_bits})",
                MASK_BITS_RANGE.start(),
                MASK_BITS_RANGE.end()
            )));
        }

        let net = Ipv4Net::new(network.into(), mask_bits)
            .map_err(|e| AuthError::ConfigError(format!("invalid subnet prefix: {e}")))?
            .trunc();

        Ok(Self {
            network,
            mask_bits,
            matching,
            net,
        })
    }

    pub fn network(&self) -> Address {
        self.network
    }

    pub fn mask_bits(&self) -> u8 {
        self.mask_bits
    }

    pub fn matching(&self) -> SubnetMatching {
        self.matching
    }

    /// Check whether `client` belongs to this subnet.
    pub fn contains(&self, client: &Address) -> bool {
        match self.matching {
            SubnetMatching::Legacy => self.contains_legacy(client),
            SubnetMatching::Strict => self.net.contains(&Ipv4Addr::from(*client)),
        }
    }

    fn contains_legacy(&self, client: &Address) -> bool {
        let border = usize::from(self.mask_bits / BITS_PER_OCTET);
        let rem_bits = self.mask_bits % BITS_PER_OCTET;
        // rem_bits is 0..8, so this is at most 256
        let max_client_value = 1u16 << (BITS_PER_OCTET - rem_bits);

        self.network
            .octets()
            .iter()
            .zip(client.octets().iter())
            .enumerate()
            .all(|(index, (&network, &client))| {
                if index < border {
                    client == network
                } else if index == border {
                    client >= network && u16::from(client) <= u16::from(network) + max_client_value
                } else {
                    true
                }
            })
    }
}

/// Explicitly permitted addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    addresses: Vec<Address>,
}

impl AllowList {
    pub fn new(addresses: impl IntoIterator<Item = Address>) -> Self {
        Self {
            addresses: addresses.into_iter().collect(),
        }
    }

    /// Exact membership check; stops at the first hit.
    pub fn contains(&self, client: &Address) -> bool {
        self.addresses.iter().any(|allowed| allowed == client)
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }
}

impl FromIterator<Address> for AllowList {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// A validated network policy with at least one configured arm.
///
/// Policies are built once at setup time and shared read-only between requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    subnet: Option<SubnetRule>,
    allow_list: Option<AllowList>,
}

impl Policy {
    /// Build a policy from its arms. An empty allow-list counts as absent.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ConfigError` if neither arm is present.
    pub fn new(subnet: Option<SubnetRule>, allow_list: Option<AllowList>) -> AuthResult<Self> {
        let allow_list = allow_list.filter(|list| !list.is_empty());

        if subnet.is_none() && allow_list.is_none() {
            return Err(AuthError::ConfigError(
                "policy needs a subnet rule or a non-empty address allow-list".to_string(),
            ));
        }

        Ok(Self { subnet, allow_list })
    }

    /// Policy with only a subnet rule.
    pub fn subnet(rule: SubnetRule) -> Self {
        Self {
            subnet: Some(rule),
            allow_list: None,
        }
    }

    /// Policy with only an allow-list.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ConfigError` if the list is empty.
    pub fn allow_list(list: AllowList) -> AuthResult<Self> {
        Self::new(None, Some(list))
    }

    pub fn subnet_rule(&self) -> Option<&SubnetRule> {
        self.subnet.as_ref()
    }

    pub fn addresses(&self) -> Option<&AllowList> {
        self.allow_list.as_ref()
    }

    /// Match `client` against either arm.
    pub fn matches(&self, client: &Address) -> bool {
        let in_subnet = self.subnet.as_ref().is_some_and(|rule| rule.contains(client));
        in_subnet || self.allow_list.as_ref().is_some_and(|list| list.contains(client))
    }
}

// =============================================================================
// Evaluators
// =============================================================================

/// A strategy that decides whether a client address satisfies a policy.
///
/// The engine holds evaluators as `Arc<dyn PolicyEvaluator>`, so custom
/// implementations can replace the built-in matching entirely. They may perform
/// I/O; returning `Err` denies the request as an internal error rather than
/// as a forbidden address. Each call runs on its own Tokio task, so a panic is
/// contained the same way.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    async fn evaluate(&self, policy: &Policy, client: &Address) -> anyhow::Result<bool>;
}

/// Subnet and allow-list matching as implemented by [`Policy::matches`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinEvaluator;

#[async_trait]
impl PolicyEvaluator for BuiltinEvaluator {
    async fn evaluate(&self, policy: &Policy, client: &Address) -> anyhow::Result<bool> {
        Ok(policy.matches(client))
    }
}
