//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use std::net::{IpAddr, ToSocketAddrs};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Character that separates address and port elsewhere in the namespace.
///
/// Rule names may contain it; the filesystem projection escapes it.
pub const NAME_DELIMITER: char = ':';

/// Two-character token that stands for [`NAME_DELIMITER`] in projected names.
pub const ESCAPED_DELIMITER: &str = "~c";

// ============================================================================
// HostKey
// ============================================================================

/// Lexical identity of a remote device: its address and administration port
///
/// Equality and hashing are purely textual. Two keys naming the same machine
/// by different hostnames are distinct here; use
/// [`HostKey::resolves_to_same`] when the resolved identity matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostKey {
    address: String,
    port: u16,
}

impl HostKey {
    /// Create a new HostKey with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidAddress` if the address is empty or
    /// contains whitespace or a path separator, and
    /// `DomainError::InvalidPort` if the port is zero.
    pub fn new(address: impl Into<String>, port: u16) -> Result<Self, DomainError> {
        let address = address.into();
        if address.is_empty() {
            return Err(DomainError::InvalidAddress(
                "Address cannot be empty".to_string(),
            ));
        }
        if address.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(DomainError::InvalidAddress(address));
        }
        if port == 0 {
            return Err(DomainError::InvalidPort("0".to_string()));
        }
        Ok(Self { address, port })
    }

    /// Returns the network address exactly as it was given
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the administration port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Compares the resolved IP addresses of both keys
    ///
    /// Falls back to lexical equality first. Resolution failures count as
    /// "not the same". This performs DNS lookups and must stay out of hot
    /// paths such as path resolution and cache keys.
    pub fn resolves_to_same(&self, other: &HostKey) -> bool {
        if self == other {
            return true;
        }
        if self.port != other.port {
            return false;
        }
        let (Some(mine), Some(theirs)) = (self.resolve_ips(), other.resolve_ips()) else {
            return false;
        };
        !mine.is_disjoint(&theirs)
    }

    fn resolve_ips(&self) -> Option<HashSet<IpAddr>> {
        let host = self.address.trim_start_matches('[').trim_end_matches(']');
        (host, self.port)
            .to_socket_addrs()
            .ok()
            .map(|addrs| addrs.map(|a| a.ip()).collect())
    }
}

impl Display for HostKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

impl FromStr for HostKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, port) = s
            .rsplit_once(':')
            .ok_or_else(|| DomainError::InvalidAddress(format!("Missing port in '{s}'")))?;
        let port = port
            .parse::<u16>()
            .map_err(|e| DomainError::InvalidPort(format!("{port}: {e}")))?;
        Self::new(address, port)
    }
}

// ============================================================================
// RuleName
// ============================================================================

/// Name of a rule, unique (case-sensitively) within its host
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RuleName(String);

impl RuleName {
    /// Create a new RuleName with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidRuleName` if the name is empty, is `.` or
    /// `..`, contains `/` or NUL, or contains [`ESCAPED_DELIMITER`].
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if name.is_empty() {
            return Err(DomainError::InvalidRuleName(
                "Rule name cannot be empty".to_string(),
            ));
        }
        if name == "." || name == ".." {
            return Err(DomainError::InvalidRuleName(name));
        }
        if name.contains('/') || name.contains('\0') {
            return Err(DomainError::InvalidRuleName(format!(
                "Rule name contains a path separator or NUL: {name:?}"
            )));
        }
        if name.contains(ESCAPED_DELIMITER) {
            return Err(DomainError::InvalidRuleName(format!(
                "Rule name contains reserved sequence '{ESCAPED_DELIMITER}': {name}"
            )));
        }
        Ok(Self(name))
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RuleName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RuleName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RuleName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RuleName> for String {
    fn from(name: RuleName) -> Self {
        name.0
    }
}

impl AsRef<str> for RuleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Administrative credentials for a remote device
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_key_valid() {
        let key = HostKey::new("h1", 9090).unwrap();
        assert_eq!(key.address(), "h1");
        assert_eq!(key.port(), 9090);
        assert_eq!(key.to_string(), "h1:9090");
    }

    #[test]
    fn test_host_key_rejects_bad_input() {
        assert!(HostKey::new("", 9090).is_err());
        assert!(HostKey::new("h 1", 9090).is_err());
        assert!(HostKey::new("h1/x", 9090).is_err());
        assert!(matches!(
            HostKey::new("h1", 0),
            Err(DomainError::InvalidPort(_))
        ));
    }

    #[test]
    fn test_host_key_from_str() {
        let key: HostKey = "h1:9090".parse().unwrap();
        assert_eq!(key, HostKey::new("h1", 9090).unwrap());

        let v6: HostKey = "[::1]:9090".parse().unwrap();
        assert_eq!(v6.address(), "[::1]");
        assert_eq!(v6.port(), 9090);

        assert!("h1".parse::<HostKey>().is_err());
        assert!("h1:notaport".parse::<HostKey>().is_err());
    }

    #[test]
    fn test_host_key_equality_is_lexical() {
        let a = HostKey::new("localhost", 9090).unwrap();
        let b = HostKey::new("127.0.0.1", 9090).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_resolves_to_same_for_ip_literals() {
        let a = HostKey::new("127.0.0.1", 9090).unwrap();
        let b = HostKey::new("127.0.0.1", 9090).unwrap();
        let c = HostKey::new("127.0.0.2", 9090).unwrap();
        let d = HostKey::new("127.0.0.1", 9091).unwrap();
        assert!(a.resolves_to_same(&b));
        assert!(!a.resolves_to_same(&c));
        assert!(!a.resolves_to_same(&d));
    }

    #[test]
    fn test_rule_name_valid() {
        let name = RuleName::new("a:b").unwrap();
        assert_eq!(name.as_str(), "a:b");
        assert_eq!(name.to_string(), "a:b");
    }

    #[test]
    fn test_rule_name_invalid() {
        assert!(RuleName::new("").is_err());
        assert!(RuleName::new(".").is_err());
        assert!(RuleName::new("..").is_err());
        assert!(RuleName::new("a/b").is_err());
        assert!(RuleName::new("a\0b").is_err());
        assert!(RuleName::new("a~cb").is_err());
    }

    #[test]
    fn test_rule_name_is_case_sensitive() {
        assert_ne!(RuleName::new("Foo").unwrap(), RuleName::new("foo").unwrap());
    }

    #[test]
    fn test_rule_name_serde_validates() {
        let name: RuleName = serde_json::from_str("\"Foo\"").unwrap();
        assert_eq!(name.as_str(), "Foo");
        assert!(serde_json::from_str::<RuleName>("\"a/b\"").is_err());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("admin", "secret");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("secret"));
    }
}
