//! IP whitelist authentication middleware.
//!
//! Wraps an [`Authorizer`] as a Tower layer and maps its decisions onto the
//! request pipeline:
//!
//! | Decision      | Effect                                                         |
//! |---------------|----------------------------------------------------------------|
//! | `Denied`      | `401 Unauthorized`, `WWW-Authenticate: ip-whitelist`, inner not called |
//! | `PassThrough` | inner called with [`IpCheck::PassThrough`] extension           |
//! | `Accepted`    | inner called with [`IpCheck::Accepted`] and [`ClientIdentity`] |
//!
//! Layers stacked inside this one act as the "next check" of the chain. A
//! check that sees [`ClientIdentity`] should treat the request as already
//! authenticated; one that sees only [`IpCheck::PassThrough`] must establish
//! identity itself.
//!
//! Routers with no further check install [`require_identity`] inside this
//! layer, so a `PassThrough` that nothing upgraded ends in a 401.
//!
//! # Bypassed Endpoints
//!
//! Bypass paths use exact matching against `request.uri().path()`, so
//! `/health` is bypassed but `/health/` is not.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use serde::Serialize;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::ip::extract_client_address;
use crate::address::Address;
use crate::decision::{Authorizer, Decision, DenyReason};

/// Scheme name advertised in `WWW-Authenticate`.
pub const AUTH_SCHEME: &str = "ip-whitelist";

/// Message returned to denied clients. Kept identical for every deny reason.
pub const FORBIDDEN_MESSAGE: &str = "Forbidden access";

/// Message returned when no check in the chain established an identity.
pub const UNAUTHENTICATED_MESSAGE: &str = "Missing authentication";

/// Default paths that bypass the IP check.
const DEFAULT_BYPASS_PATHS: [&str; 1] = ["/health"];

/// Request extension recording the outcome of the IP check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpCheck {
    /// Address allowed, identity still to be established downstream.
    PassThrough,
    /// Address allowed and authenticated.
    Accepted,
}

/// Request extension carrying the identity established by the IP check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIdentity(pub Address);

/// IP whitelist layer.
#[derive(Clone)]
pub struct IpWhitelistLayer {
    authorizer: Arc<Authorizer>,
    bypass_paths: Arc<Vec<String>>,
    trust_forwarded_for: bool,
}

impl IpWhitelistLayer {
    /// Create a new IP whitelist layer.
    ///
    /// # Arguments
    ///
    /// * `authorizer` - Decision engine with the configured policy
    /// * `bypass_paths` - Paths that skip the check (e.g., health endpoints)
    /// * `trust_forwarded_for` - Read the client address from `X-Forwarded-For`
    pub fn new(authorizer: Authorizer, bypass_paths: Vec<String>, trust_forwarded_for: bool) -> Self {
        Self {
            authorizer: Arc::new(authorizer),
            bypass_paths: Arc::new(bypass_paths),
            trust_forwarded_for,
        }
    }

    /// Create with the default bypass path ("/health"), trusting `X-Forwarded-For`.
    pub fn with_defaults(authorizer: Authorizer) -> Self {
        Self::new(
            authorizer,
            DEFAULT_BYPASS_PATHS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            true,
        )
    }
}

impl<S> Layer<S> for IpWhitelistLayer {
    type Service = IpWhitelistService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IpWhitelistService {
            inner,
            authorizer: self.authorizer.clone(),
            bypass_paths: self.bypass_paths.clone(),
            trust_forwarded_for: self.trust_forwarded_for,
        }
    }
}

/// IP whitelist service wrapper.
#[derive(Clone)]
pub struct IpWhitelistService<S> {
    inner: S,
    authorizer: Arc<Authorizer>,
    bypass_paths: Arc<Vec<String>>,
    trust_forwarded_for: bool,
}

impl<S> Service<Request<Body>> for IpWhitelistService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let authorizer = self.authorizer.clone();
        let bypass_paths = self.bypass_paths.clone();
        let trust_forwarded_for = self.trust_forwarded_for;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let path = req.uri().path();
            if bypass_paths.iter().any(|p| p == path) {
                debug!(path, "Bypassing IP whitelist");
                return inner.call(req).await;
            }

            let client_ip =
                extract_client_address(&req, trust_forwarded_for).map(|ip| ip.into_owned());
            let decision = authorizer.authorize(client_ip.as_deref()).await;

            match decision {
                Decision::Denied(reason) => {
                    warn!(
                        path = %req.uri().path(),
                        client_ip = client_ip.as_deref().unwrap_or("unknown"),
                        reason = reason.as_str(),
                        "IP whitelist denied request"
                    );
                    Ok(denied_response(reason, decision.status_hint()))
                }
                Decision::PassThrough => {
                    req.extensions_mut().insert(IpCheck::PassThrough);
                    inner.call(req).await
                }
                Decision::Accepted { identity } => {
                    req.extensions_mut().insert(IpCheck::Accepted);
                    req.extensions_mut().insert(ClientIdentity(identity));
                    inner.call(req).await
                }
            }
        })
    }
}

/// Final check of a chain: reject requests the IP check only passed through.
///
/// Requests that bypassed the whitelist carry no [`IpCheck`] and are left alone.
///
/// ```ignore
/// Router::new()
///     .route("/", get(handler))
///     .layer(axum::middleware::from_fn(require_identity))
///     .layer(IpWhitelistLayer::with_defaults(authorizer));
/// ```
pub async fn require_identity(req: Request<Body>, next: Next) -> Response<Body> {
    let extensions = req.extensions();
    if extensions.get::<IpCheck>() == Some(&IpCheck::PassThrough)
        && extensions.get::<ClientIdentity>().is_none()
    {
        debug!(path = %req.uri().path(), "No check authenticated the request");
        return unauthenticated_response();
    }
    next.run(req).await
}

#[derive(Serialize)]
struct DeniedBody {
    error: &'static str,
    message: &'static str,
}

/// Build the response for a denial (401 unless the hint says otherwise).
fn denied_response(reason: DenyReason, status_hint: Option<u16>) -> Response<Body> {
    let status = status_hint
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::UNAUTHORIZED);

    (
        status,
        [("WWW-Authenticate", AUTH_SCHEME)],
        axum::Json(DeniedBody {
            error: reason.as_str(),
            message: FORBIDDEN_MESSAGE,
        }),
    )
        .into_response()
}

fn unauthenticated_response() -> Response<Body> {
    (
        StatusCode::UNAUTHORIZED,
        [("WWW-Authenticate", AUTH_SCHEME)],
        axum::Json(DeniedBody {
            error: "unauthenticated",
            message: UNAUTHENTICATED_MESSAGE,
        }),
    )
        .into_response()
}
