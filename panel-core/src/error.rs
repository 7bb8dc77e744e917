//! Validation errors for credential input.

use thiserror::Error;

/// Rejected operator input. Never retried; surfaced to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Custom secret contains non-hex characters (or is empty).
    #[error("custom secret must be a hex string")]
    SecretNotHex,

    /// Custom secret has an odd number of hex digits.
    #[error("custom secret length must be even")]
    SecretOddLength,

    /// Custom secret carries no extractable relay secret.
    #[error("custom secret must be 32 hex or ee/dd + 32 hex")]
    SecretShape,

    /// Fake-TLS host resolved to an empty string.
    #[error("fake TLS host cannot be empty")]
    EmptyFakeTlsHost,

    /// `custom` expiry preset without an instant.
    #[error("custom expiration date is required")]
    MissingCustomExpiry,

    /// `custom` expiry instant could not be parsed.
    #[error("invalid custom expiration date: {0}")]
    InvalidCustomExpiry(String),

    /// `custom` expiry instant is not after now.
    #[error("custom expiration date must be in the future")]
    ExpiryNotInFuture,

    /// Preset arithmetic overflowed the supported date range.
    #[error("expiration date out of range")]
    ExpiryOutOfRange,
}
