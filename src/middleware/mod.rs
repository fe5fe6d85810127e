//! HTTP middleware plugging the whitelist engine into an Axum router.
//!
//! - **Client address**: `X-Forwarded-For` (last entry) or the socket peer
//! - **IP whitelist**: deny, pass through, or authenticate per the policy
//!
//! # Architecture
//!
//! ```text
//! Request → IP whitelist → (next check) → Handler → Response
//!               ↓
//!     401 Unauthorized (ip-whitelist)
//! ```

pub mod auth;
pub mod ip;

pub use auth::{
    AUTH_SCHEME, ClientIdentity, FORBIDDEN_MESSAGE, IpCheck, IpWhitelistLayer,
    UNAUTHENTICATED_MESSAGE, require_identity,
};
pub use ip::{FORWARDED_FOR_HEADER, extract_client_address};
