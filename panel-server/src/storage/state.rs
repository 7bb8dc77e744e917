//! Process singleton state (`state.json`).

use super::{read_json, write_json};
use crate::error::StorageResult;
use panel_core::{extract_relay_secret, RelaySecret};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Field written by older panel versions, holding a full credential string.
const LEGACY_FALLBACK_FIELD: &str = "fallbackSecret";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fallback_proxy_secret: Option<String>,
    /// Fields we do not own are carried through rewrites untouched.
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Return the persisted fallback relay secret, creating it on first use.
///
/// A legacy `fallbackSecret` credential string is migrated when present;
/// otherwise a random secret is generated. Once written, the value never
/// changes.
pub async fn load_or_init_fallback_secret(path: &Path) -> StorageResult<RelaySecret> {
    let mut state: StateFile = read_json(path).await?.unwrap_or_default();

    if let Some(existing) = state
        .fallback_proxy_secret
        .as_deref()
        .and_then(extract_relay_secret)
    {
        return Ok(existing);
    }

    let migrated = state
        .extra
        .get(LEGACY_FALLBACK_FIELD)
        .and_then(|v| v.as_str())
        .and_then(extract_relay_secret);
    let secret = match migrated {
        Some(secret) => {
            tracing::info!("Migrated legacy fallback secret");
            secret
        }
        None => RelaySecret::random(),
    };

    state.fallback_proxy_secret = Some(secret.to_string());
    write_json(path, &state).await?;
    Ok(secret)
}
