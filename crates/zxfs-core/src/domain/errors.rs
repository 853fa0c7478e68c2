//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures, invalid state transitions, and the typed
//! failures reported by remote devices.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid host address
    #[error("Invalid host address: {0}")]
    InvalidAddress(String),

    /// Invalid administration port
    #[error("Invalid port: {0}")]
    InvalidPort(String),

    /// Invalid rule name
    #[error("Invalid rule name: {0}")]
    InvalidRuleName(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// A host with the same address and port is already linked
    #[error("Host already linked: {0}")]
    HostAlreadyExists(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Category of a failure reported by a remote device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    /// The device refused the connection
    ConnectionRefused,
    /// The device's hostname could not be resolved
    UnresolvedHost,
    /// The device answered with something we could not parse
    MalformedResponse,
    /// TLS negotiation or certificate validation failed
    Tls,
    /// The credentials were rejected
    Authentication,
    /// The device reported an internal error
    Internal,
    /// An object with the requested name already exists
    NameAlreadyExists,
    /// The device's version does not support the operation
    Unsupported,
    /// Anything else
    Unknown,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemoteErrorKind::ConnectionRefused => "connection refused",
            RemoteErrorKind::UnresolvedHost => "unresolved host",
            RemoteErrorKind::MalformedResponse => "malformed response",
            RemoteErrorKind::Tls => "TLS failure",
            RemoteErrorKind::Authentication => "authentication failed",
            RemoteErrorKind::Internal => "internal error",
            RemoteErrorKind::NameAlreadyExists => "name already exists",
            RemoteErrorKind::Unsupported => "unsupported",
            RemoteErrorKind::Unknown => "unknown error",
        };
        write!(f, "{}", s)
    }
}

/// A typed failure raised by a remote device operation
///
/// Stored as the cause of a `CannotSync` state and returned synchronously
/// from user-initiated mutations.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    kind: RemoteErrorKind,
    message: String,
}

impl RemoteError {
    /// Creates a new remote error
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns the failure category
    pub fn kind(&self) -> RemoteErrorKind {
        self.kind
    }

    /// Returns the human-readable message
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn connection_refused(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::ConnectionRefused, message)
    }

    pub fn unresolved_host(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::UnresolvedHost, message)
    }

    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::MalformedResponse, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Authentication, message)
    }

    pub fn name_already_exists(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::NameAlreadyExists, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Internal, message)
    }

    /// Returns true if the device could not be reached at all
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self.kind,
            RemoteErrorKind::ConnectionRefused | RemoteErrorKind::UnresolvedHost
        )
    }
}
