//! Error types for the TLS 1.3 codec.
//!
//! Every decode and encode path returns [`Error`]. The variants are grouped
//! into the coarse [`ErrorKind`] families so that a connection driver can
//! decide whether to wait for more bytes or tear the connection down.

use thiserror::Error;

use crate::handshake::HandshakeType;

/// Codec result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of codec failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fewer bytes than a declared length requires.
    Truncated,
    /// A tag outside the set this build understands.
    UnknownDiscriminant,
    /// An encode-time attempt to exceed a format maximum.
    LengthPolicyViolation,
    /// Bytes that are present but cannot form a valid structure.
    StructuralInconsistency,
    /// A recognised message type with no parser wired up.
    NoHandlerRegistered,
}

/// Errors produced while encoding or decoding TLS structures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("truncated input: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("unknown content type: {0}")]
    UnknownContentType(u8),

    #[error("unknown protocol version: {0}.{1}")]
    UnknownVersion(u8, u8),

    #[error("unknown handshake type: {0}")]
    UnknownHandshakeType(u8),

    #[error("length {len} exceeds maximum {max}")]
    LengthOverflow { len: usize, max: usize },

    #[error("record fragment of {0} bytes exceeds 16384")]
    FragmentTooLarge(usize),

    #[error("no content type found in inner plaintext")]
    NoContentTypeFound,

    #[error("odd cipher suite vector length: {0}")]
    OddCipherSuiteLength(usize),

    #[error("message too short: {len} bytes, minimum {min}")]
    TooShort { len: usize, min: usize },

    #[error("malformed message: {0}")]
    Malformed(&'static str),

    #[error("no handler registered for handshake type {0:?}")]
    NoHandlerRegistered(HandshakeType),

    #[error("validation failed: {0}")]
    Validation(String),
}

impl Error {
    pub(crate) fn truncated(needed: usize, available: usize) -> Self {
        Self::Truncated { needed, available }
    }

    /// A frame whose declared span is fully present cannot get any more
    /// bytes, so a shortfall inside it is structural.
    pub(crate) fn within_frame(self, what: &'static str) -> Self {
        match self {
            Self::Truncated { .. } => Self::Malformed(what),
            other => other,
        }
    }

    /// Map this error onto its taxonomy family.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Truncated { .. } => ErrorKind::Truncated,
            Self::UnknownContentType(_)
            | Self::UnknownVersion(..)
            | Self::UnknownHandshakeType(_) => ErrorKind::UnknownDiscriminant,
            Self::LengthOverflow { .. } | Self::FragmentTooLarge(_) => {
                ErrorKind::LengthPolicyViolation
            }
            Self::NoContentTypeFound
            | Self::OddCipherSuiteLength(_)
            | Self::TooShort { .. }
            | Self::Malformed(_)
            | Self::Validation(_) => ErrorKind::StructuralInconsistency,
            Self::NoHandlerRegistered(_) => ErrorKind::NoHandlerRegistered,
        }
    }

    /// Whether waiting for more transport input could make the decode succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Truncated
    }
}
