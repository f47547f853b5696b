//! # Error Types
//!
//! Error handling for the inspector wire protocol.
//!
//! Errors are layered the same way the request pipeline is:
//! - **Decode errors** ([`DecodeError`]): the bytes of an attachment do not match the
//!   shape declared for them. Local to one attachment, which is dropped.
//! - **Dispatch errors** ([`DispatchError`]): a well-formed modification cannot be
//!   applied to its target. Surfaced to the caller as a typed result.
//! - **Snapshot errors** ([`SnapshotError`]): a hierarchy capture did not produce a
//!   deliverable result.
//! - **Protocol errors** ([`ProtocolError`]): everything else, from I/O to framing and
//!   configuration.
//!
//! Every error maps to a wire-level [`ErrorKind`], which is what travels back to the
//! client inside an `Error` attachment.
//!
//! ## Example Usage
//! ```rust
//! use inspector_protocol::core::value::{decode, AttrType};
//! use inspector_protocol::error::{DecodeError, ErrorKind};
//!
//! // Three floats where a color needs four.
//! let err = decode(&[0u8; 12], AttrType::Color).unwrap_err();
//! assert!(matches!(err, DecodeError::MalformedPayload { .. }));
//! assert_eq!(err.kind(), ErrorKind::MalformedPayload);
//! ```

use crate::core::value::AttrType;
use crate::object::Oid;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Capability table errors
    pub const ERR_CAPABILITY_WRITE_LOCK: &str = "Failed to acquire write lock on capability table";

    /// Connection errors
    pub const ERR_CONNECTION_WRITER: &str = "Connection writer task failed";
}

/// Wire-level error classification carried in `Error` responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    MalformedPayload,
    UnknownType,
    UntrustedPayload,
    StaleTarget,
    UnsupportedOperation,
    TypeMismatch,
    RejectedByTarget,
    IncompatibleVersion,
    Superseded,
    Timeout,
    Internal,
}

impl ErrorKind {
    /// Stable name used in logs and metrics
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::MalformedPayload => "malformed_payload",
            ErrorKind::UnknownType => "unknown_type",
            ErrorKind::UntrustedPayload => "untrusted_payload",
            ErrorKind::StaleTarget => "stale_target",
            ErrorKind::UnsupportedOperation => "unsupported_operation",
            ErrorKind::TypeMismatch => "type_mismatch",
            ErrorKind::RejectedByTarget => "rejected_by_target",
            ErrorKind::IncompatibleVersion => "incompatible_version",
            ErrorKind::Superseded => "superseded",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Failure to turn bytes into a typed value or entity
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Malformed {attr_type:?} payload: expected {expected} bytes, found {actual}")]
    MalformedPayload {
        attr_type: AttrType,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown attribute type tag: {0}")]
    UnknownType(u8),

    #[error("Untrusted payload: {0}")]
    UntrustedPayload(String),

    #[error("Value of type {actual:?} cannot be encoded as {declared:?}")]
    TypeMismatch { declared: AttrType, actual: AttrType },
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::MalformedPayload { .. } => ErrorKind::MalformedPayload,
            DecodeError::UnknownType(_) => ErrorKind::UnknownType,
            DecodeError::UntrustedPayload(_) => ErrorKind::UntrustedPayload,
            DecodeError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
        }
    }

    pub(crate) fn untrusted(reason: impl Into<String>) -> Self {
        DecodeError::UntrustedPayload(reason.into())
    }
}

/// Failure to apply a decoded modification
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Target {0} no longer resolves to a live object")]
    StaleTarget(Oid),

    #[error("Operation '{operation}' is not supported by {class}")]
    UnsupportedOperation { class: String, operation: String },

    #[error("Operation expects {expected:?} but modification declares {actual:?}")]
    TypeMismatch { expected: AttrType, actual: AttrType },

    #[error("Target rejected value: {0}")]
    RejectedByTarget(String),

    #[error("Incompatible client version: {0}")]
    IncompatibleVersion(String),

    #[error("Timed out waiting for the owning thread")]
    Timeout,

    #[error("Owning thread is no longer accepting work")]
    OwnerUnavailable,
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::StaleTarget(_) => ErrorKind::StaleTarget,
            DispatchError::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
            DispatchError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            DispatchError::RejectedByTarget(_) => ErrorKind::RejectedByTarget,
            DispatchError::IncompatibleVersion(_) => ErrorKind::IncompatibleVersion,
            DispatchError::Timeout => ErrorKind::Timeout,
            DispatchError::OwnerUnavailable => ErrorKind::Internal,
        }
    }
}

/// Failure to deliver a hierarchy snapshot
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SnapshotError {
    #[error("Snapshot request was superseded by a newer one")]
    Superseded,

    #[error("Snapshot capture was cancelled")]
    Cancelled,

    #[error("Timed out capturing snapshot")]
    Timeout,

    #[error("Owning thread is no longer accepting work")]
    OwnerUnavailable,

    #[error("Failed to encode snapshot: {0}")]
    Encode(String),
}

impl SnapshotError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SnapshotError::Superseded | SnapshotError::Cancelled => ErrorKind::Superseded,
            SnapshotError::Timeout => ErrorKind::Timeout,
            SnapshotError::OwnerUnavailable | SnapshotError::Encode(_) => ErrorKind::Internal,
        }
    }
}

// ProtocolError is the primary error type for crate-level operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("Remote error ({}): {message}", kind.name())]
    Remote { kind: ErrorKind, message: String },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid attachment header")]
    InvalidHeader,

    #[error("Unsupported frame version: {0}")]
    UnsupportedVersion(u8),

    #[error("Attachment too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Unexpected response kind")]
    UnexpectedMessage,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::Decode(e) => e.kind(),
            ProtocolError::Dispatch(e) => e.kind(),
            ProtocolError::Snapshot(e) => e.kind(),
            ProtocolError::Remote { kind, .. } => *kind,
            ProtocolError::InvalidHeader
            | ProtocolError::UnsupportedVersion(_)
            | ProtocolError::OversizedPacket(_) => ErrorKind::UntrustedPayload,
            ProtocolError::Timeout => ErrorKind::Timeout,
            _ => ErrorKind::Internal,
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
