//! Credential string codec.
//!
//! A credential string is what an end user pastes into their client. It always
//! embeds a 16-byte **relay secret**, the value the relay actually compares:
//!
//! | mode     | credential string                       |
//! |----------|-----------------------------------------|
//! | plain    | `<32 hex>`                              |
//! | secure   | `ee<32 hex>`                            |
//! | fake_tls | `dd<32 hex><hex(ascii host)>`           |
//! | custom   | operator value in one of the forms above |
//!
//! Extraction ignores anything after the 32 hex digits following a prefix.

use crate::error::ValidationError;
use panel_types::SecretMode;
use std::fmt;

/// Size of a relay secret in bytes.
pub const RELAY_SECRET_LEN: usize = 16;

/// Length of a relay secret in hex characters.
const RELAY_SECRET_HEX_LEN: usize = RELAY_SECRET_LEN * 2;

/// Prefix marking secure framing.
pub const SECURE_PREFIX: &str = "ee";

/// Prefix marking the fake-TLS disguise.
pub const FAKE_TLS_PREFIX: &str = "dd";

/// The 16-byte value the relay matches against.
///
/// Displayed as 32 lower-case hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelaySecret([u8; RELAY_SECRET_LEN]);

impl RelaySecret {
    /// Create a new random relay secret.
    pub fn random() -> Self {
        let mut bytes = [0u8; RELAY_SECRET_LEN];
        getrandom::getrandom(&mut bytes).expect("getrandom failed");
        Self(bytes)
    }

    /// Create a relay secret from raw bytes.
    pub fn from_bytes(bytes: [u8; RELAY_SECRET_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse exactly 32 hex characters (any case, surrounding whitespace ignored).
    pub fn from_hex(text: &str) -> Option<Self> {
        let normalized = normalize_secret(text);
        if normalized.len() != RELAY_SECRET_HEX_LEN {
            return None;
        }
        let mut bytes = [0u8; RELAY_SECRET_LEN];
        hex::decode_to_slice(&normalized, &mut bytes).ok()?;
        Some(Self(bytes))
    }

}

impl fmt::Display for RelaySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for RelaySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only a short prefix, these end up in logs.
        write!(f, "RelaySecret({}..)", &hex::encode(&self.0[..2]))
    }
}

/// Trim and lower-case a credential string.
pub fn normalize_secret(secret: &str) -> String {
    secret.trim().to_ascii_lowercase()
}

fn is_hex(bytes: &[u8]) -> bool {
    !bytes.is_empty() && bytes.iter().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Extract the relay secret embedded in any credential string.
///
/// Returns `None` when the string carries no usable secret.
pub fn extract_relay_secret(secret: &str) -> Option<RelaySecret> {
    let normalized = normalize_secret(secret);
    let bytes = normalized.as_bytes();

    if bytes.len() == RELAY_SECRET_HEX_LEN && is_hex(bytes) {
        return RelaySecret::from_hex(&normalized);
    }

    let end = 2 + RELAY_SECRET_HEX_LEN;
    let prefixed = bytes.starts_with(SECURE_PREFIX.as_bytes())
        || bytes.starts_with(FAKE_TLS_PREFIX.as_bytes());
    if prefixed && bytes.len() >= end && is_hex(&bytes[2..end]) {
        // Bytes 0..end are ASCII, so `end` is a char boundary.
        return RelaySecret::from_hex(&normalized[2..end]);
    }

    None
}

/// Validate and normalize an operator-supplied credential string.
///
/// Accepts `<32 hex>` or `ee|dd<32 hex>` followed by optional extra hex bytes.
pub fn validate_custom_secret(secret: &str) -> Result<String, ValidationError> {
    let normalized = normalize_secret(secret);
    if !is_hex(normalized.as_bytes()) {
        return Err(ValidationError::SecretNotHex);
    }
    if normalized.len() % 2 != 0 {
        return Err(ValidationError::SecretOddLength);
    }
    if extract_relay_secret(&normalized).is_none() {
        return Err(ValidationError::SecretShape);
    }
    Ok(normalized)
}

/// Generates credential strings for each [`SecretMode`].
#[derive(Debug, Clone)]
pub struct SecretCodec {
    default_fake_tls_host: String,
}

impl SecretCodec {
    /// Create a codec that falls back to `default_fake_tls_host` for fake-TLS
    /// credentials created without a host.
    pub fn new(default_fake_tls_host: impl Into<String>) -> Self {
        Self {
            default_fake_tls_host: default_fake_tls_host.into(),
        }
    }

    /// Pick the disguise host: the supplied one unless empty, else the default.
    ///
    /// The result is trimmed but keeps its case.
    pub fn resolve_fake_tls_host(&self, host: Option<&str>) -> String {
        host.filter(|h| !h.is_empty())
            .unwrap_or(&self.default_fake_tls_host)
            .trim()
            .to_string()
    }

    /// Produce a credential string for `mode`.
    ///
    /// `custom_secret` is only consulted for [`SecretMode::Custom`] and
    /// `fake_tls_host` only for [`SecretMode::FakeTls`].
    pub fn generate(
        &self,
        mode: SecretMode,
        fake_tls_host: Option<&str>,
        custom_secret: Option<&str>,
    ) -> Result<String, ValidationError> {
        match mode {
            SecretMode::Plain => Ok(RelaySecret::random().to_string()),
            SecretMode::Secure => Ok(format!("{SECURE_PREFIX}{}", RelaySecret::random())),
            SecretMode::FakeTls => {
                let host = self.resolve_fake_tls_host(fake_tls_host).to_ascii_lowercase();
                if host.is_empty() {
                    return Err(ValidationError::EmptyFakeTlsHost);
                }
                Ok(format!(
                    "{FAKE_TLS_PREFIX}{}{}",
                    RelaySecret::random(),
                    hex::encode(host.as_bytes())
                ))
            }
            SecretMode::Custom => validate_custom_secret(custom_secret.unwrap_or_default()),
        }
    }
}
