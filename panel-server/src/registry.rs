//! Durable client registry.
//!
//! The collection lives in memory behind one async mutex and is mirrored to
//! `clients.json`. Every mutation takes the lock, builds the next collection,
//! persists it atomically and only then swaps it in, so concurrent mutations
//! cannot lose each other's writes and a failed write changes nothing.

use crate::error::{PanelError, Result};
use crate::storage::{read_json, write_json};
use chrono::Utc;
use panel_core::{
    compute_expires_at, is_expired, plan_secret_update, ExpiryPreset, SecretCodec,
};
use panel_types::{Client, ClientId, ClientPatch, NewClient, SecretMode};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Preset applied when a new client does not name one.
const DEFAULT_EXPIRY_PRESET: &str = "1m";

/// Result of an expiry cleanup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupOutcome {
    /// Number of clients removed.
    pub removed: usize,
    /// Whether the collection changed.
    pub changed: bool,
}

/// CRUD over the persisted client collection.
#[derive(Debug)]
pub struct ClientRegistry {
    path: PathBuf,
    codec: SecretCodec,
    clients: Mutex<Vec<Client>>,
}

impl ClientRegistry {
    /// Open the registry at `path`, creating an empty collection if missing.
    ///
    /// A file that exists but cannot be parsed is an error; it is never
    /// overwritten with an empty collection.
    pub async fn open(path: impl AsRef<Path>, codec: SecretCodec) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let clients = match read_json::<Vec<Client>>(&path).await? {
            Some(clients) => clients,
            None => {
                write_json(&path, &Vec::<Client>::new()).await?;
                Vec::new()
            }
        };
        tracing::debug!("Loaded {} clients from {}", clients.len(), path.display());

        Ok(Self {
            path,
            codec,
            clients: Mutex::new(clients),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All clients in creation order.
    pub async fn list(&self) -> Vec<Client> {
        self.clients.lock().await.clone()
    }

    /// Number of stored clients and how many of them are not expired.
    pub async fn counts(&self) -> (usize, usize) {
        let now = Utc::now();
        let clients = self.clients.lock().await;
        let active = clients
            .iter()
            .filter(|c| !is_expired(c.expires_at, now))
            .count();
        (clients.len(), active)
    }

    /// Fetch one client.
    pub async fn get(&self, id: &ClientId) -> Result<Client> {
        self.clients
            .lock()
            .await
            .iter()
            .find(|c| &c.id == id)
            .cloned()
            .ok_or(PanelError::NotFound { id: *id })
    }

    /// Create and persist a new client.
    pub async fn create(&self, input: NewClient) -> Result<Client> {
        let mut clients = self.clients.lock().await;
        let now = Utc::now();

        let mode = input.secret_mode.unwrap_or_default();
        let name = input
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .unwrap_or_else(|| format!("client-{}", clients.len() + 1));
        let fake_tls_host = (mode == SecretMode::FakeTls)
            .then(|| self.codec.resolve_fake_tls_host(input.fake_tls_host.as_deref()));
        let secret = self.codec.generate(
            mode,
            fake_tls_host.as_deref(),
            input.custom_secret.as_deref(),
        )?;
        let preset = ExpiryPreset::parse(
            input
                .expires_preset
                .as_deref()
                .unwrap_or(DEFAULT_EXPIRY_PRESET),
        );
        let expires_at = compute_expires_at(preset, input.custom_expires_at.as_deref(), now)?;

        let client = Client {
            id: ClientId::new(),
            name,
            secret_mode: mode,
            fake_tls_host,
            secret,
            expires_at,
            created_at: now,
            updated_at: now,
        };

        let mut next = clients.clone();
        next.push(client.clone());
        self.persist(&next).await?;
        *clients = next;

        tracing::info!(
            "Created client {} ({}, mode={})",
            client.id,
            client.name,
            client.secret_mode
        );
        Ok(client)
    }

    /// Apply `patch` to an existing client and persist.
    pub async fn update(&self, id: &ClientId, patch: ClientPatch) -> Result<Client> {
        let mut clients = self.clients.lock().await;
        let idx = clients
            .iter()
            .position(|c| &c.id == id)
            .ok_or(PanelError::NotFound { id: *id })?;
        let current = &clients[idx];
        let now = Utc::now();

        let plan = plan_secret_update(&self.codec, current, &patch)?;
        let expires_at = match patch.expires_preset.as_deref() {
            Some(preset) => compute_expires_at(
                ExpiryPreset::parse(preset),
                patch.custom_expires_at.as_deref(),
                now,
            )?,
            None => current.expires_at,
        };
        let name = patch
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .unwrap_or_else(|| current.name.clone());

        let updated = Client {
            id: current.id,
            name,
            secret_mode: plan.mode,
            fake_tls_host: plan.fake_tls_host,
            secret: plan.secret,
            expires_at,
            created_at: current.created_at,
            updated_at: now,
        };

        let mut next = clients.clone();
        next[idx] = updated.clone();
        self.persist(&next).await?;
        *clients = next;

        tracing::info!("Updated client {} (secret: {:?})", updated.id, plan.action);
        Ok(updated)
    }

    /// Remove a client and persist. Returns the removed record.
    pub async fn delete(&self, id: &ClientId) -> Result<Client> {
        let mut clients = self.clients.lock().await;
        let idx = clients
            .iter()
            .position(|c| &c.id == id)
            .ok_or(PanelError::NotFound { id: *id })?;

        let mut next = clients.clone();
        let removed = next.remove(idx);
        self.persist(&next).await?;
        *clients = next;

        tracing::info!("Deleted client {} ({})", removed.id, removed.name);
        Ok(removed)
    }

    /// Remove every expired client in one pass.
    ///
    /// Nothing is written when no client has expired, so repeated calls are
    /// no-ops until another client expires.
    pub async fn cleanup_expired(&self) -> Result<CleanupOutcome> {
        let mut clients = self.clients.lock().await;
        let now = Utc::now();

        let next: Vec<Client> = clients
            .iter()
            .filter(|c| !is_expired(c.expires_at, now))
            .cloned()
            .collect();
        let removed = clients.len() - next.len();
        if removed == 0 {
            return Ok(CleanupOutcome {
                removed: 0,
                changed: false,
            });
        }

        self.persist(&next).await?;
        *clients = next;

        tracing::info!("Removed {} expired clients", removed);
        Ok(CleanupOutcome {
            removed,
            changed: true,
        })
    }

    async fn persist(&self, clients: &[Client]) -> Result<()> {
        write_json(&self.path, &clients).await?;
        Ok(())
    }
}
