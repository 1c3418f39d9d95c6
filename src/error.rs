//! Error types for the user cache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while encoding, storing or fetching cached users
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Pipeline Errors
    // =========================================================================
    /// Bytes could not be turned into (or produced from) a value
    #[error("Serialization with {format} failed: {reason}")]
    Serialization { format: String, reason: String },

    /// Compression failed
    #[error("Compression with {algorithm} failed: {reason}")]
    CompressionFailed { algorithm: String, reason: String },

    /// Compressed data is truncated or was written by another codec
    #[error("Corrupt {algorithm} payload: {reason}")]
    CorruptPayload { algorithm: String, reason: String },

    // =========================================================================
    // Store Errors
    // =========================================================================
    /// The key-value store could not be reached or rejected the command
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    // =========================================================================
    // Identifier Errors
    // =========================================================================
    /// An entity identifier was read before it was assigned
    #[error("Identifier read before assignment")]
    IdentifierUnset,

    /// An entity identifier was assigned twice
    #[error("Identifier already assigned: {0}")]
    IdentifierAlreadyAssigned(i64),

    /// Identifier cannot be mapped to a bucket
    #[error("Invalid identifier {0}: bucketing requires a non-negative identifier")]
    InvalidIdentifier(i64),

    // =========================================================================
    // General Errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Programming errors that no caller should try to recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::IdentifierUnset | Error::IdentifierAlreadyAssigned(_)
        )
    }

    /// Errors a caller may handle per entry, e.g. by skipping a bad member.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Serialization { .. } | Error::CorruptPayload { .. }
        )
    }

    pub(crate) fn serialization(format: impl Into<String>, reason: impl ToString) -> Self {
        Error::Serialization {
            format: format.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn corrupt(algorithm: impl Into<String>, reason: impl ToString) -> Self {
        Error::CorruptPayload {
            algorithm: algorithm.into(),
            reason: reason.to_string(),
        }
    }
}
