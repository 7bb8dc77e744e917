//! Secret handling on client updates.
//!
//! Whether an update keeps, regenerates or revalidates the stored credential
//! string is an explicit decision table:
//!
//! | next mode | regenerate | mode changed | host changed | action           |
//! |-----------|------------|--------------|--------------|------------------|
//! | custom    | any        | any          | n/a          | RevalidateCustom |
//! | other     | true       | any          | any          | Regenerate       |
//! | other     | false      | true         | any          | Regenerate       |
//! | fake_tls  | false      | false        | true         | Regenerate       |
//! | other     | false      | false        | false        | Keep             |

use crate::error::ValidationError;
use crate::secret::{validate_custom_secret, SecretCodec};
use panel_types::{Client, ClientPatch, SecretMode};

/// What an update does with the stored credential string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretAction {
    /// Leave the current secret untouched.
    Keep,
    /// Generate a fresh secret for the next mode.
    Regenerate,
    /// Validate the supplied custom value and store it.
    RevalidateCustom,
}

/// Evaluate the decision table.
///
/// `host_changed` is only meaningful when `next` is [`SecretMode::FakeTls`].
pub fn secret_action(
    current: SecretMode,
    next: SecretMode,
    host_changed: bool,
    regenerate: bool,
) -> SecretAction {
    match (next, regenerate, current != next, host_changed) {
        (SecretMode::Custom, _, _, _) => SecretAction::RevalidateCustom,
        (_, true, _, _) | (_, _, true, _) => SecretAction::Regenerate,
        (SecretMode::FakeTls, _, _, true) => SecretAction::Regenerate,
        _ => SecretAction::Keep,
    }
}

/// Resolved secret fields for an updated client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretPlan {
    /// Mode after the update.
    pub mode: SecretMode,
    /// Disguise host after the update (`Some` iff fake-TLS).
    pub fake_tls_host: Option<String>,
    /// Credential string after the update.
    pub secret: String,
    /// The action that produced `secret`.
    pub action: SecretAction,
}

/// Work out mode, host and secret for `current` after applying `patch`.
///
/// A custom-mode patch without a value revalidates the stored secret when
/// the client is already custom.
pub fn plan_secret_update(
    codec: &SecretCodec,
    current: &Client,
    patch: &ClientPatch,
) -> Result<SecretPlan, ValidationError> {
    let mode = patch.secret_mode.unwrap_or(current.secret_mode);

    let fake_tls_host = if mode == SecretMode::FakeTls {
        let requested = patch
            .fake_tls_host
            .as_deref()
            .filter(|h| !h.is_empty())
            .or_else(|| current.fake_tls_host.as_deref().filter(|h| !h.is_empty()));
        let host = codec.resolve_fake_tls_host(requested);
        if host.is_empty() {
            return Err(ValidationError::EmptyFakeTlsHost);
        }
        Some(host)
    } else {
        None
    };

    let host_changed = match &fake_tls_host {
        Some(host) => host != current.fake_tls_host.as_deref().unwrap_or("").trim(),
        None => false,
    };

    let action = secret_action(
        current.secret_mode,
        mode,
        host_changed,
        patch.regenerate_secret,
    );

    let secret = match action {
        SecretAction::Keep => current.secret.clone(),
        SecretAction::Regenerate => codec.generate(mode, fake_tls_host.as_deref(), None)?,
        SecretAction::RevalidateCustom => {
            let supplied = patch.custom_secret.as_deref().or(
                (current.secret_mode == SecretMode::Custom).then_some(current.secret.as_str()),
            );
            validate_custom_secret(supplied.unwrap_or_default())?
        }
    };

    Ok(SecretPlan {
        mode,
        fake_tls_host,
        secret,
        action,
    })
}
