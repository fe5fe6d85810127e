//! Configuration for the whitelist policy and the demo server.
//!
//! # Policy Configuration
//!
//! [`PolicyConfig`] mirrors the recognized strategy options and is validated
//! once by [`PolicyConfig::build`]. All problems are collected and reported
//! together, in a fixed order, as a single `AuthError::ConfigError`.
//!
//! # Environment Variables
//!
//! - `HOST` / `PORT`: listen address (default `0.0.0.0:3000`)
//! - `IP_NETWORK_ADDRESS` / `IP_SUBNET_MASK`: subnet rule, e.g. `172.24.0.0` and `16`
//! - `IP_ADDRESS_WHITELIST`: comma-separated exact addresses
//! - `IP_FORWARD_TO_NEXT`: `true` (default) passes matches on to the next check,
//!   `false` authenticates them directly
//! - `IP_SUBNET_MATCHING`: `legacy` (default) or `strict`
//! - `TRUST_FORWARDED_FOR`: read the client address from `X-Forwarded-For` (default `true`)
//! - `AUTH_BYPASS_PATHS`: comma-separated paths that skip the check (default `/health`)
//! - `METRICS_PORT`: Prometheus exporter port (default 9090, 0 = disabled)

use std::env;

use serde::Deserialize;

use crate::address::Address;
use crate::decision::{Authorizer, Mode};
use crate::error::{AuthError, AuthResult};
use crate::policy::{AllowList, MASK_BITS_RANGE, Policy, SubnetMatching, SubnetRule};

/// Whitelist strategy options.
///
/// # Example
///
/// ```
/// use ip_whitelist::config::PolicyConfig;
/// use ip_whitelist::Mode;
///
/// let config: PolicyConfig = serde_json::from_str(
///     r#"{ "networkAddress": "172.24.0.0", "maskBits": 16, "mode": "terminate_chain" }"#,
/// ).unwrap();
/// assert_eq!(config.mode, Mode::TerminateChain);
/// assert!(config.build().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyConfig {
    /// Network address of the subnet rule
    pub network_address: Option<String>,
    /// Mask bits of the subnet rule (8-30)
    pub mask_bits: Option<u8>,
    /// Exact addresses that are always allowed
    pub allow_list: Vec<String>,
    /// What a successful match produces
    pub mode: Mode,
    /// Border octet comparison for the subnet rule
    pub subnet_matching: SubnetMatching,
}

impl PolicyConfig {
    /// Validate the options and build a [`Policy`].
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ConfigError` listing every problem found.
    pub fn build(&self) -> AuthResult<Policy> {
        let mut problems: Vec<String> = Vec::new();

        if self.network_address.is_none() && self.mask_bits.is_none() && self.allow_list.is_empty()
        {
            problems.push("neither a subnet nor an address whitelist is configured".to_string());
        }

        match (&self.network_address, self.mask_bits) {
            (Some(_), None) => problems.push("network address given without subnet mask".into()),
            (None, Some(_)) => problems.push("subnet mask given without network address".into()),
            _ => {}
        }

        let network = self.network_address.as_deref().and_then(|text| {
            Address::parse(text)
                .map_err(|_| problems.push(format!("network address '{text}' is invalid")))
                .ok()
        });

        if let Some(bits) = self.mask_bits
            && !MASK_BITS_RANGE.contains(&bits)
        {
            problems.push(format!(
                "subnet mask must be between {} and {} (got {bits})",
                MASK_BITS_RANGE.start(),
                MASK_BITS_RANGE.end()
            ));
        }

        let mut allowed = Vec::with_capacity(self.allow_list.len());
        for entry in &self.allow_list {
            match Address::parse(entry) {
                Ok(address) => allowed.push(address),
                Err(_) => problems.push(format!("whitelist entry '{entry}' is invalid")),
            }
        }

        if !problems.is_empty() {
            return Err(AuthError::ConfigError(problems.join("; ")));
        }

        let subnet = match (network, self.mask_bits) {
            (Some(network), Some(bits)) => Some(SubnetRule::with_matching(
                network,
                bits,
                self.subnet_matching,
            )?),
            _ => None,
        };

        Policy::new(subnet, Some(AllowList::new(allowed)))
    }

    /// Build an [`Authorizer`] with the configured mode and the built-in evaluator.
    ///
    /// # Errors
    ///
    /// Same as [`PolicyConfig::build`].
    pub fn into_authorizer(self) -> AuthResult<Authorizer> {
        Ok(Authorizer::new(self.build()?, self.mode))
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    /// Whitelist strategy options
    pub policy: PolicyConfig,

    /// Take the client address from the last `X-Forwarded-For` entry when present.
    /// Only safe behind a reverse proxy that controls this header.
    pub trust_forwarded_for: bool,

    /// Paths that skip the IP check (exact match)
    pub auth_bypass_paths: Vec<String>,

    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ConfigError` for unparsable values or an invalid policy.
    pub fn from_env() -> AuthResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let forward_to_next: bool = Self::parse_env("IP_FORWARD_TO_NEXT", true)?;

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 3000)?,

            policy: PolicyConfig {
                network_address: env::var("IP_NETWORK_ADDRESS")
                    .ok()
                    .filter(|s| !s.is_empty()),
                mask_bits: env::var("IP_SUBNET_MASK")
                    .ok()
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        s.parse::<u8>().map_err(|e| {
                            AuthError::ConfigError(format!("Invalid IP_SUBNET_MASK: {e}"))
                        })
                    })
                    .transpose()?,
                allow_list: Self::parse_list("IP_ADDRESS_WHITELIST", ""),
                mode: if forward_to_next {
                    Mode::ForwardToNext
                } else {
                    Mode::TerminateChain
                },
                subnet_matching: Self::parse_subnet_matching()?,
            },
            trust_forwarded_for: Self::parse_env("TRUST_FORWARDED_FOR", true)?,
            auth_bypass_paths: Self::parse_list("AUTH_BYPASS_PATHS", "/health")
                .into_iter()
                .filter(|p| p.starts_with('/'))
                .collect(),

            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
        };

        // Fail at startup, never per request
        config.policy.build()?;

        Ok(config)
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address, `None` if disabled.
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        self.metrics_enabled()
            .then(|| std::net::SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AuthResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AuthError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse a comma-separated list, dropping empty entries.
    fn parse_list(name: &str, default: &str) -> Vec<String> {
        split_list(&env::var(name).unwrap_or_else(|_| default.to_string()))
    }

    fn parse_subnet_matching() -> AuthResult<SubnetMatching> {
        match env::var("IP_SUBNET_MATCHING").as_deref() {
            Err(_) | Ok("") | Ok("legacy") => Ok(SubnetMatching::Legacy),
            Ok("strict") => Ok(SubnetMatching::Strict),
            Ok(other) => Err(AuthError::ConfigError(format!(
                "Invalid IP_SUBNET_MATCHING: '{other}' (expected 'legacy' or 'strict')"
            ))),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Default configuration for testing and development.
///
/// Allows the loopback network only. Production deployments should use
/// `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            policy: PolicyConfig {
                network_address: Some("127.0.0.0".to_string()),
                mask_bits: Some(8),
                ..PolicyConfig::default()
            },
            trust_forwarded_for: true,
            auth_bypass_paths: vec!["/health".to_string()],
            log_level: "info".to_string(),
            metrics_port: 9090,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config_error(config: &PolicyConfig) -> String {
        match config.build() {
            Err(AuthError::ConfigError(msg)) => msg,
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_options_rejected() {
        let msg = config_error(&PolicyConfig::default());
        assert!(msg.contains("neither a subnet nor an address whitelist"));
    }

    #[test]
    fn test_invalid_network_address_rejected() {
        let config = PolicyConfig {
            network_address: Some("300.300.0.0".to_string()),
            mask_bits: Some(16),
            ..PolicyConfig::default()
        };
        assert!(config_error(&config).contains("300.300.0.0"));

        let config = PolicyConfig {
            network_address: Some("random string".to_string()),
            mask_bits: Some(16),
            ..PolicyConfig::default()
        };
        assert!(config.build().is_err());
    }

    #[test]
    fn test_mask_bits_out_of_range_rejected() {
        for bits in [0, 7, 31, 32] {
            let config = PolicyConfig {
                network_address: Some("132.32.2.2".to_string()),
                mask_bits: Some(bits),
                ..PolicyConfig::default()
            };
            assert!(config_error(&config).contains("subnet mask"), "bits = {bits}");
        }
    }

    #[test]
    fn test_half_configured_subnet_rejected() {
        let config = PolicyConfig {
            network_address: Some("10.0.0.0".to_string()),
            allow_list: vec!["10.0.0.1".to_string()],
            ..PolicyConfig::default()
        };
        assert!(config_error(&config).contains("without subnet mask"));
    }

    #[test]
    fn test_invalid_whitelist_entries_all_reported_in_order() {
        let config = PolicyConfig {
            allow_list: vec![
                "10.0.0.1".to_string(),
                "bad-one".to_string(),
                "10.0.0.999".to_string(),
            ],
            ..PolicyConfig::default()
        };

        let msg = config_error(&config);
        let first = msg.find("bad-one").unwrap();
        let second = msg.find("10.0.0.999").unwrap();
        assert!(first < second);
        assert!(!msg.contains("'10.0.0.1'"));
    }

    #[test]
    fn test_all_problems_reported_together() {
        let config = PolicyConfig {
            network_address: Some("not-an-ip".to_string()),
            mask_bits: Some(40),
            allow_list: vec!["nope".to_string()],
            ..PolicyConfig::default()
        };

        let msg = config_error(&config);
        let network = msg.find("network address").unwrap();
        let mask = msg.find("subnet mask").unwrap();
        let entry = msg.find("whitelist entry").unwrap();
        assert!(network < mask && mask < entry);
    }

    #[test]
    fn test_build_subnet_and_list() {
        let config = PolicyConfig {
            network_address: Some("192.143.0.0".to_string()),
            mask_bits: Some(16),
            allow_list: vec!["192.143.0.1".to_string()],
            subnet_matching: SubnetMatching::Strict,
            ..PolicyConfig::default()
        };

        let policy = config.build().unwrap();
        let rule = policy.subnet_rule().unwrap();
        assert_eq!(rule.mask_bits(), 16);
        assert_eq!(rule.matching(), SubnetMatching::Strict);
        assert_eq!(policy.addresses().unwrap().len(), 1);
    }

    #[test]
    fn test_deserialize_policy_config() {
        let config: PolicyConfig = serde_json::from_str(
            r#"{
                "allowList": ["192.143.0.1", "192.143.10.10"],
                "mode": "forward_to_next",
                "subnetMatching": "strict"
            }"#,
        )
        .unwrap();

        assert_eq!(config.allow_list.len(), 2);
        assert_eq!(config.mode, Mode::ForwardToNext);
        assert_eq!(config.subnet_matching, SubnetMatching::Strict);
        assert!(config.network_address.is_none());
    }

    #[test]
    fn test_deserialize_rejects_non_numeric_mask() {
        let result: Result<PolicyConfig, _> =
            serde_json::from_str(r#"{ "networkAddress": "132.32.2.2", "maskBits": "Nan" }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_into_authorizer_keeps_mode() {
        let config = PolicyConfig {
            allow_list: vec!["10.0.0.1".to_string()],
            mode: Mode::TerminateChain,
            ..PolicyConfig::default()
        };

        let authorizer = config.into_authorizer().unwrap();
        assert_eq!(authorizer.mode(), Mode::TerminateChain);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.policy.build().is_ok());
        assert_eq!(config.server_addr(), "0.0.0.0:3000");
        assert!(config.metrics_addr().is_some());
    }

    #[test]
    fn test_metrics_disabled() {
        let config = Config {
            metrics_port: 0,
            ..Config::default()
        };
        assert!(config.metrics_addr().is_none());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list(" 10.0.0.1 , ,10.0.0.2,"),
            vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()]
        );
        assert!(split_list("").is_empty());
    }
}
