//! Remote device port (driven/secondary port)
//!
//! This module defines the interface to a live managed device. The transport
//! behind it (SOAP/RPC, TLS, timeouts, retries) belongs to adapter crates.
//!
//! ## Design Notes
//!
//! - Methods are synchronous: a call either succeeds or fails with a typed
//!   [`RemoteError`] before it returns. Async callers wrap them in
//!   `spawn_blocking`.
//! - Errors use [`RemoteError`] rather than `anyhow` because the filesystem
//!   layer maps each failure kind to a distinct error.

use std::sync::Arc;

use crate::domain::{Credentials, HostKey, RemoteError, RuleName};

/// Operations a managed device exposes for its rules
pub trait RemoteDevice: Send + Sync {
    /// Lists the names of every rule on the device
    fn list_rules(&self) -> Result<Vec<RuleName>, RemoteError>;

    /// Fetches the raw content of a rule
    fn get_rule(&self, name: &RuleName) -> Result<Vec<u8>, RemoteError>;

    /// Creates a rule; fails with `NameAlreadyExists` if it exists
    fn add_rule(&self, name: &RuleName, content: &[u8]) -> Result<(), RemoteError>;

    /// Replaces the content of an existing rule
    fn set_rule_content(&self, name: &RuleName, content: &[u8]) -> Result<(), RemoteError>;

    /// Deletes a rule
    fn delete_rule(&self, name: &RuleName) -> Result<(), RemoteError>;

    /// Renames a rule; fails with `NameAlreadyExists` if `new` is taken
    fn rename_rule(&self, old: &RuleName, new: &RuleName) -> Result<(), RemoteError>;

    /// Changes the credentials used for subsequent calls
    fn set_credentials(&self, credentials: &Credentials) -> Result<(), RemoteError>;
}

/// Turns a host key and credentials into a live device connection
pub trait DeviceConnector: Send + Sync {
    fn connect(&self, key: &HostKey, credentials: &Credentials) -> Arc<dyn RemoteDevice>;
}
