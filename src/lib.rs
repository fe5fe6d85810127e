//! # IP Whitelist
//!
//! IP address authorization for Axum services. A client address is checked
//! against a subnet rule and/or an explicit allow-list, and the result is one
//! of three outcomes:
//!
//! - **Denied** - missing or malformed address, address not whitelisted, or a
//!   failing custom evaluator (401)
//! - **PassThrough** - address allowed, the next check in the chain decides
//! - **Accepted** - address allowed and used as the authenticated identity
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  IpWhitelistLayer (client address → decision → response)    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Authorizer (mode, reporter, pluggable PolicyEvaluator)     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Policy (SubnetRule OR AllowList)                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Address (dotted-quad parser)                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use ip_whitelist::{IpWhitelistLayer, Mode, TracingReporter};
//! use ip_whitelist::config::PolicyConfig;
//!
//! # fn build() -> Result<Router, ip_whitelist::AuthError> {
//! let authorizer = PolicyConfig {
//!     network_address: Some("172.24.0.0".to_string()),
//!     mask_bits: Some(16),
//!     mode: Mode::TerminateChain,
//!     ..PolicyConfig::default()
//! }
//! .into_authorizer()?
//! .with_reporter(TracingReporter);
//!
//! let app: Router = Router::new()
//!     .route("/", get(|| async { "hello" }))
//!     .layer(IpWhitelistLayer::with_defaults(authorizer));
//! # Ok(app)
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```bash
//! IP_NETWORK_ADDRESS=172.24.0.0 IP_SUBNET_MASK=16 IP_FORWARD_TO_NEXT=false cargo run
//! IP_ADDRESS_WHITELIST=192.143.0.1,192.143.10.10 cargo run
//! ```

pub mod address;
pub mod config;
pub mod decision;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod policy;
pub mod routes;
pub mod state;

// Re-exports for convenience
pub use address::Address;
pub use config::{Config, PolicyConfig};
pub use decision::{Authorizer, Decision, DenyReason, Mode, Reporter, TracingReporter};
pub use error::{AuthError, AuthResult};
pub use middleware::{ClientIdentity, IpCheck, IpWhitelistLayer, require_identity};
pub use policy::{AllowList, BuiltinEvaluator, Policy, PolicyEvaluator, SubnetMatching, SubnetRule};
pub use routes::build_router;
pub use state::AppState;
