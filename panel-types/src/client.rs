//! The persisted client credential record.

use crate::ids::ClientId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Encoding family of a credential string.
///
/// Fixed per credential; changing it on update forces a new secret.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretMode {
    /// 32 hex chars, no prefix.
    Plain,
    /// `ee` + 32 hex chars.
    #[default]
    Secure,
    /// `dd` + 32 hex chars + hex-encoded disguise hostname.
    FakeTls,
    /// Operator-supplied value, validated and normalized.
    Custom,
}

impl SecretMode {
    /// Wire name of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretMode::Plain => "plain",
            SecretMode::Secure => "secure",
            SecretMode::FakeTls => "fake_tls",
            SecretMode::Custom => "custom",
        }
    }
}

impl fmt::Display for SecretMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown secret mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown secret mode: {0}")]
pub struct ParseSecretModeError(pub String);

impl FromStr for SecretMode {
    type Err = ParseSecretModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(SecretMode::Plain),
            "secure" => Ok(SecretMode::Secure),
            "fake_tls" => Ok(SecretMode::FakeTls),
            "custom" => Ok(SecretMode::Custom),
            other => Err(ParseSecretModeError(other.to_string())),
        }
    }
}

/// One issued proxy credential.
///
/// `fake_tls_host` is `Some` iff `secret_mode` is [`SecretMode::FakeTls`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Immutable identifier.
    pub id: ClientId,
    /// Display label.
    pub name: String,
    /// Encoding family of `secret`.
    pub secret_mode: SecretMode,
    /// Disguise hostname for fake-TLS credentials.
    pub fake_tls_host: Option<String>,
    /// Full credential string, lower-case hex.
    pub secret: String,
    /// Expiration instant, `None` = never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last modified.
    pub updated_at: DateTime<Utc>,
}
