//! Mutation inputs accepted by the client registry.

use crate::client::SecretMode;
use serde::Deserialize;

/// Input for creating a client.
///
/// Every field is optional; the registry fills in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewClient {
    /// Display label (blank = positional placeholder).
    pub name: Option<String>,
    /// Encoding family (default: secure).
    pub secret_mode: Option<SecretMode>,
    /// Credential string for [`SecretMode::Custom`].
    pub custom_secret: Option<String>,
    /// Disguise hostname for [`SecretMode::FakeTls`].
    pub fake_tls_host: Option<String>,
    /// Expiration preset name (default: `1m`).
    pub expires_preset: Option<String>,
    /// Explicit instant for the `custom` preset.
    pub custom_expires_at: Option<String>,
}

/// Partial update of an existing client.
///
/// Absent fields leave the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientPatch {
    /// New display label (blank keeps the current one).
    pub name: Option<String>,
    /// New encoding family.
    pub secret_mode: Option<SecretMode>,
    /// Credential string for [`SecretMode::Custom`].
    pub custom_secret: Option<String>,
    /// New disguise hostname for [`SecretMode::FakeTls`].
    pub fake_tls_host: Option<String>,
    /// Force a fresh random secret.
    pub regenerate_secret: bool,
    /// Expiration preset; expiry is only recomputed when present.
    pub expires_preset: Option<String>,
    /// Explicit instant for the `custom` preset.
    pub custom_expires_at: Option<String>,
}
