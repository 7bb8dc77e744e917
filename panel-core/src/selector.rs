//! Active relay secret selection.

use crate::expiry::is_expired;
use crate::secret::{extract_relay_secret, RelaySecret};
use chrono::{DateTime, Utc};
use panel_types::Client;
use std::collections::HashSet;

/// Derive the relay secrets that should currently be accepted.
///
/// Non-expired clients are visited in registry order; each contributes its
/// extracted relay secret unless extraction fails or the value was already
/// seen. Collection stops after `max_count` unique secrets (at least one);
/// extra clients are silently dropped. When nothing qualifies the result is
/// `[fallback]`, so the relay is never configured with zero secrets.
pub fn select_active_secrets(
    clients: &[Client],
    fallback: RelaySecret,
    max_count: usize,
    now: DateTime<Utc>,
) -> Vec<RelaySecret> {
    let cap = max_count.max(1);
    let mut seen = HashSet::new();
    let mut unique = Vec::new();

    for client in clients.iter().filter(|c| !is_expired(c.expires_at, now)) {
        let Some(relay) = extract_relay_secret(&client.secret) else {
            continue;
        };
        if seen.insert(relay) {
            unique.push(relay);
        }
        if unique.len() >= cap {
            break;
        }
    }

    if unique.is_empty() {
        return vec![fallback];
    }
    unique
}
