//! Error types for the rule filesystem.
//!
//! Defines `VfsError`, the mapping from remote failures, and conversions to
//! libc errno values and `std::io::Error`.

use thiserror::Error;
use zxfs_core::domain::{RemoteError, RemoteErrorKind};

/// Errors returned by filesystem operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VfsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("is a directory: {0}")]
    IsDirectory(String),

    #[error("not a directory: {0}")]
    NotDirectory(String),

    #[error("remote unreachable: {0}")]
    RemoteUnreachable(String),

    #[error("remote protocol error: {0}")]
    RemoteProtocolError(String),

    #[error("remote authentication failed: {0}")]
    RemoteAuthFailed(String),

    #[error("remote TLS error: {0}")]
    RemoteTlsError(String),

    #[error("already exists on remote: {0}")]
    RemoteConflict(String),

    #[error("not supported by remote: {0}")]
    RemoteUnsupported(String),

    #[error("remote internal error: {0}")]
    RemoteInternal(String),

    /// The object exists but has never been fetched
    #[error("still loading, not yet synchronized: {0}")]
    PendingFirstSync(String),

    #[error("deleted: {0}")]
    Deleted(String),

    #[error("operation not supported: {0}")]
    Unsupported(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl VfsError {
    /// Wraps a remote failure, keeping its message.
    pub fn from_remote(err: &RemoteError) -> Self {
        let message = err.to_string();
        match err.kind() {
            RemoteErrorKind::ConnectionRefused | RemoteErrorKind::UnresolvedHost => {
                VfsError::RemoteUnreachable(message)
            }
            RemoteErrorKind::MalformedResponse => VfsError::RemoteProtocolError(message),
            RemoteErrorKind::Authentication => VfsError::RemoteAuthFailed(message),
            RemoteErrorKind::Tls => VfsError::RemoteTlsError(message),
            RemoteErrorKind::NameAlreadyExists => VfsError::RemoteConflict(message),
            RemoteErrorKind::Unsupported => VfsError::RemoteUnsupported(message),
            RemoteErrorKind::Internal | RemoteErrorKind::Unknown => {
                VfsError::RemoteInternal(message)
            }
        }
    }

    /// True for failures a caller may retry later without changing anything
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VfsError::PendingFirstSync(_) | VfsError::RemoteUnreachable(_)
        )
    }
}

impl From<RemoteError> for VfsError {
    fn from(err: RemoteError) -> Self {
        VfsError::from_remote(&err)
    }
}

impl From<VfsError> for libc::c_int {
    fn from(err: VfsError) -> libc::c_int {
        match err {
            VfsError::NotFound(_) => libc::ENOENT,
            VfsError::IsDirectory(_) => libc::EISDIR,
            VfsError::NotDirectory(_) => libc::ENOTDIR,
            VfsError::RemoteUnreachable(_) => libc::EHOSTUNREACH,
            VfsError::RemoteProtocolError(_) => libc::EPROTO,
            VfsError::RemoteAuthFailed(_) => libc::EACCES,
            VfsError::RemoteTlsError(_) => libc::EIO,
            VfsError::RemoteConflict(_) => libc::EEXIST,
            VfsError::RemoteUnsupported(_) => libc::ENOTSUP,
            VfsError::RemoteInternal(_) => libc::EIO,
            VfsError::PendingFirstSync(_) => libc::EAGAIN,
            VfsError::Deleted(_) => libc::ESTALE,
            VfsError::Unsupported(_) => libc::EPERM,
            VfsError::InvalidPath(_) => libc::EINVAL,
            VfsError::InvalidArgument(_) => libc::EINVAL,
        }
    }
}

impl From<VfsError> for std::io::Error {
    fn from(err: VfsError) -> std::io::Error {
        use std::io::ErrorKind;

        let kind = match &err {
            VfsError::NotFound(_) | VfsError::Deleted(_) => ErrorKind::NotFound,
            VfsError::RemoteAuthFailed(_) => ErrorKind::PermissionDenied,
            VfsError::RemoteConflict(_) => ErrorKind::AlreadyExists,
            VfsError::RemoteUnreachable(_) => ErrorKind::ConnectionRefused,
            VfsError::PendingFirstSync(_) => ErrorKind::WouldBlock,
            VfsError::Unsupported(_) | VfsError::RemoteUnsupported(_) => ErrorKind::Unsupported,
            VfsError::InvalidPath(_) | VfsError::InvalidArgument(_) => ErrorKind::InvalidInput,
            _ => ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}
