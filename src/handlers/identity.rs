//! Echo what the IP whitelist check established for the caller.

use axum::{Extension, Json};
use serde::Serialize;

use crate::middleware::{ClientIdentity, IpCheck};

/// Response body for `GET /whoami`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct WhoAmIResponse {
    /// `accepted`, `pass_through`, or `none` when the path bypassed the check
    pub ip_check: &'static str,
    /// Authenticated client address, only set for `accepted`
    pub identity: Option<String>,
}

pub async fn whoami(
    check: Option<Extension<IpCheck>>,
    identity: Option<Extension<ClientIdentity>>,
) -> Json<WhoAmIResponse> {
    let ip_check = match check {
        Some(Extension(IpCheck::Accepted)) => "accepted",
        Some(Extension(IpCheck::PassThrough)) => "pass_through",
        None => "none",
    };

    Json(WhoAmIResponse {
        ip_check,
        identity: identity.map(|Extension(ClientIdentity(addr))| addr.to_string()),
    })
}
