//! Application routing with the IP whitelist in front of every route.
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   IP Whitelist   │ ← 401 if denied (bypassed for /health)
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Require identity │ ← 401 if the IP check only passed the request through
//! └────────┬─────────┘
//!          ▼
//!      Handler
//! ```

use axum::Router;
use axum::middleware;
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::decision::{Authorizer, Mode};
use crate::handlers;
use crate::middleware::{IpWhitelistLayer, require_identity};
use crate::state::AppState;

/// Build the application router.
///
/// The whitelist layer is added last so it runs first: denied requests are
/// rejected before any tracing span or handler work.
pub fn build_router(state: AppState, authorizer: Authorizer) -> Router {
    let config = &state.config;

    let policy = authorizer.policy();
    let subnet = policy
        .subnet_rule()
        .map(|rule| format!("{}/{}", rule.network(), rule.mask_bits()))
        .unwrap_or_default();
    info!(
        subnet = %subnet,
        whitelisted_addresses = policy.addresses().map_or(0, |list| list.len()),
        terminate_chain = authorizer.mode() == Mode::TerminateChain,
        trust_forwarded_for = config.trust_forwarded_for,
        "IP whitelist enabled"
    );

    if authorizer.mode() == Mode::ForwardToNext {
        warn!("No check follows the IP whitelist; pass-through requests will be rejected");
    }

    let whitelist = IpWhitelistLayer::new(
        authorizer,
        config.auth_bypass_paths.clone(),
        config.trust_forwarded_for,
    );

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/whoami", get(handlers::whoami))
        .layer(middleware::from_fn(require_identity))
        .layer(TraceLayer::new_for_http())
        .layer(whitelist)
        .with_state(state)
}
