//! Dotted-quad IPv4 address parsing.
//!
//! The accepted grammar is deliberately narrower than [`Ipv4Addr`]'s `FromStr`
//! in one respect and wider in another:
//!
//! - **Narrower**: exactly four decimal groups, nothing else. No surrounding
//!   whitespace, no ports, no IPv6.
//! - **Wider**: groups may carry leading zeros (`010.001.000.255`), as long as
//!   each group is at most three digits and its value is at most 255.
//!
//! Addresses are only ever produced by [`Address::parse`] (or converted from an
//! already-valid [`Ipv4Addr`]), so any `Address` value is known to be valid.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::{AuthError, AuthResult};

/// Number of octets in an IPv4 address.
pub const OCTET_COUNT: usize = 4;

/// Maximum number of digits in one dotted-quad group.
const MAX_GROUP_DIGITS: usize = 3;

/// A validated IPv4 address as four octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; OCTET_COUNT]);

impl Address {
    /// Parse dotted-quad text into an address.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidAddress` for empty input, a wrong group count,
    /// non-digit characters, groups longer than three digits, or values above 255.
    ///
    /// # Example
    ///
    /// ```
    /// use ip_whitelist::Address;
    ///
    /// let addr = Address::parse("172.24.4.4").unwrap();
    /// assert_eq!(addr.octets(), [172, 24, 4, 4]);
    /// assert!(Address::parse("30.3.0.300").is_err());
    /// ```
    pub fn parse(text: &str) -> AuthResult<Self> {
        if text.is_empty() {
            return Err(AuthError::InvalidAddress("empty address".to_string()));
        }

        let mut octets = [0u8; OCTET_COUNT];
        let mut groups = text.split('.');

        for slot in octets.iter_mut() {
            let group = groups.next().ok_or_else(|| wrong_group_count(text))?;
            *slot = parse_group(group).ok_or_else(|| {
                AuthError::InvalidAddress(format!("'{text}' has an invalid group '{group}'"))
            })?;
        }

        if groups.next().is_some() {
            return Err(wrong_group_count(text));
        }

        Ok(Self(octets))
    }

    /// The four octets, most significant first.
    pub fn octets(&self) -> [u8; OCTET_COUNT] {
        self.0
    }

    /// The address as a big-endian 32-bit value.
    pub fn to_bits(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }
}

/// Parse one group: 1-3 ASCII digits with a value of at most 255.
fn parse_group(group: &str) -> Option<u8> {
    if group.is_empty()
        || group.len() > MAX_GROUP_DIGITS
        || !group.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    // At most three digits, so u16 cannot overflow
    let value = group
        .bytes()
        .fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0'));

    u8::try_from(value).ok()
}

fn wrong_group_count(text: &str) -> AuthError {
    AuthError::InvalidAddress(format!(
        "'{text}' must have exactly {OCTET_COUNT} dot-separated groups"
    ))
}

impl FromStr for Address {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a}.{b}.{c}.{d}")
    }
}

impl From<Address> for Ipv4Addr {
    fn from(addr: Address) -> Self {
        Ipv4Addr::from(addr.0)
    }
}

impl From<Ipv4Addr> for Address {
    fn from(ip: Ipv4Addr) -> Self {
        Self(ip.octets())
    }
}
