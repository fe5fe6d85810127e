//! Client address resolution for the IP whitelist check.
//!
//! # Source Priority
//!
//! 1. `X-Forwarded-For`, **last** entry (when forwarded headers are trusted and
//!    the header is not blank)
//! 2. The transport peer address from Axum's `ConnectInfo<SocketAddr>`
//! 3. Nothing - the whitelist check then denies the request as unreadable
//!
//! The last `X-Forwarded-For` entry is the one appended by the closest proxy.
//!
//! # Security Warning: IP Spoofing Risk
//!
//! **Trusting `X-Forwarded-For` lets clients choose their own address** unless
//! the service sits behind a reverse proxy that controls the header. A client
//! talking to the service directly can send `X-Forwarded-For: 10.0.0.1` and pass
//! any whitelist containing that address.
//!
//! When deploying with `TRUST_FORWARDED_FOR=true` (the default), you MUST:
//!
//! 1. **Deploy behind a trusted reverse proxy** (nginx, HAProxy, cloud LB)
//! 2. **Block direct access** to this service from the internet
//! 3. **Configure the proxy** to append the peer address it saw:
//!
//!    ```nginx
//!    proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
//!    ```
//!
//! Otherwise set `TRUST_FORWARDED_FOR=false` so only the socket peer address is used.
//!
//! The peer address is only available when the server is started with
//! `into_make_service_with_connect_info::<SocketAddr>()`.

use std::borrow::Cow;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;

/// Header carrying the proxy chain.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Where the client address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtractedIp<'a> {
    /// Last entry of X-Forwarded-For.
    FromXff(&'a str),
    /// Transport peer address.
    FromPeer(SocketAddr),
    NotFound,
}

#[inline]
fn extract_ip<B>(req: &Request<B>, trust_forwarded_for: bool) -> ExtractedIp<'_> {
    if trust_forwarded_for
        && let Some(forwarded) = req.headers().get(FORWARDED_FOR_HEADER)
        && let Ok(value) = forwarded.to_str()
        && !value.trim().is_empty()
        && let Some(last_ip) = value.rsplit(',').next()
    {
        return ExtractedIp::FromXff(last_ip.trim());
    }

    if let Some(ConnectInfo(peer)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return ExtractedIp::FromPeer(*peer);
    }

    ExtractedIp::NotFound
}

/// Resolve the raw client address text for a request.
///
/// The text is not validated here; the whitelist engine parses it and denies
/// anything that is not a dotted-quad IPv4 address (including IPv6 peers).
/// IPv4-mapped IPv6 peers (`::ffff:a.b.c.d`) are reported in IPv4 form.
///
/// # Example
///
/// ```ignore
/// let raw = extract_client_address(&req, true);
/// let decision = authorizer.authorize(raw.as_deref()).await;
/// ```
pub fn extract_client_address<B>(
    req: &Request<B>,
    trust_forwarded_for: bool,
) -> Option<Cow<'_, str>> {
    match extract_ip(req, trust_forwarded_for) {
        ExtractedIp::FromXff(ip) => Some(Cow::Borrowed(ip)),
        ExtractedIp::FromPeer(peer) => Some(Cow::Owned(peer.ip().to_canonical().to_string())),
        ExtractedIp::NotFound => None,
    }
}
