//! Main ProxyPanel coordination.
//!
//! ProxyPanel owns the registry, the fallback secret, the sync pipeline and
//! the public IP state, and exposes the operations the HTTP layer calls.
//! Registry mutations are durable before their sync is queued; a failed sync
//! is reported next to the mutation result but never undoes it.

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::public_ip::{PublicIpLookup, PublicIpState};
use crate::registry::{CleanupOutcome, ClientRegistry};
use crate::reload::{self, RelayReloader};
use crate::storage::load_or_init_fallback_secret;
use crate::sync::{SyncPipeline, SyncStatus, SyncWorker};
use panel_core::{ProxyEndpoint, RelaySecret, SecretCodec};
use panel_types::{Client, ClientId, ClientPatch, NewClient};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Host used in share links when neither a public host nor an IP is known.
const FALLBACK_LINK_HOST: &str = "127.0.0.1";

/// A durable registry change plus the outcome of the sync it triggered.
#[derive(Debug)]
pub struct Applied<T> {
    /// The mutation result.
    pub value: T,
    /// Outcome of the sync queued after the mutation.
    pub sync: std::result::Result<(), SyncError>,
}

/// Result of a manual or scheduled cleanup.
#[derive(Debug)]
pub struct CleanupReport {
    /// What the registry pass did.
    pub outcome: CleanupOutcome,
    /// Sync outcome, `None` when nothing changed and no sync ran.
    pub sync: Option<std::result::Result<(), SyncError>>,
}

/// Status snapshot for the HTTP layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelStatus {
    /// Last sync attempt.
    pub sync_status: SyncStatus,
    /// Stored clients, expired included.
    pub total_clients: usize,
    /// Clients that are not expired.
    pub active_clients: usize,
    /// Relay secrets artifact path.
    pub proxy_secrets_file: PathBuf,
    /// Whether syncs run the external reload.
    #[serde(rename = "dockerSyncEnabled")]
    pub reload_enabled: bool,
    /// Most recently detected public address.
    pub public_ip: Option<IpAddr>,
    /// When the public address was last refreshed.
    pub public_ip_last_updated_at: Option<DateTime<Utc>>,
    /// Error of the last failed public IP refresh.
    pub public_ip_last_error: Option<String>,
}

/// The credential lifecycle and relay synchronization engine.
#[derive(Debug)]
pub struct ProxyPanel {
    config: Config,
    registry: Arc<ClientRegistry>,
    fallback: RelaySecret,
    pipeline: SyncPipeline,
    reload_enabled: bool,
    public_ip: Arc<PublicIpLookup>,
}

impl ProxyPanel {
    /// Open persisted state and start the sync worker, using the reload
    /// action described by the configuration.
    pub async fn open(config: Config) -> Result<Self> {
        let reloader = reload::from_config(&config.reload);
        Self::with_reloader(config, reloader).await
    }

    /// Open persisted state and start the sync worker with `reloader`.
    pub async fn with_reloader(config: Config, reloader: Arc<dyn RelayReloader>) -> Result<Self> {
        let codec = SecretCodec::new(config.proxy.default_fake_tls_host.clone());
        let registry =
            Arc::new(ClientRegistry::open(config.storage.clients_file(), codec).await?);
        let fallback = load_or_init_fallback_secret(&config.storage.state_file()).await?;
        let public_ip = Arc::new(PublicIpLookup::new(&config.public_ip)?);

        let reload_enabled = reloader.is_enabled();
        let worker = SyncWorker::new(
            registry.clone(),
            fallback,
            config.proxy.effective_max_secrets(),
            config.proxy.secrets_file.clone(),
            reloader,
        );
        let pipeline = SyncPipeline::spawn(worker);

        tracing::info!(
            "Panel opened: data_dir={}, secrets_file={}, reload={}",
            config.storage.data_dir.display(),
            config.proxy.secrets_file.display(),
            reload_enabled
        );

        Ok(Self {
            config,
            registry,
            fallback,
            pipeline,
            reload_enabled,
            public_ip,
        })
    }

    /// Get the panel configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The relay secret used when no client is active.
    pub fn fallback_secret(&self) -> RelaySecret {
        self.fallback
    }

    /// Get a clone of the public IP lookup for background tasks.
    pub fn public_ip_arc(&self) -> Arc<PublicIpLookup> {
        self.public_ip.clone()
    }

    /// Create a client, then sync.
    pub async fn create_client(&self, input: NewClient) -> Result<Applied<Client>> {
        let client = self.registry.create(input).await?;
        let sync = self.pipeline.enqueue("create client").await;
        Ok(Applied {
            value: client,
            sync,
        })
    }

    /// Update a client, then sync.
    pub async fn update_client(&self, id: &ClientId, patch: ClientPatch) -> Result<Applied<Client>> {
        let client = self.registry.update(id, patch).await?;
        let sync = self.pipeline.enqueue("update client").await;
        Ok(Applied {
            value: client,
            sync,
        })
    }

    /// Delete a client, then sync.
    pub async fn delete_client(&self, id: &ClientId) -> Result<Applied<Client>> {
        let client = self.registry.delete(id).await?;
        let sync = self.pipeline.enqueue("delete client").await;
        Ok(Applied {
            value: client,
            sync,
        })
    }

    /// All clients in creation order.
    pub async fn list_clients(&self) -> Vec<Client> {
        self.registry.list().await
    }

    /// Fetch one client.
    pub async fn get_client(&self, id: &ClientId) -> Result<Client> {
        self.registry.get(id).await
    }

    /// Queue a sync on operator request.
    pub async fn trigger_manual_sync(&self) -> std::result::Result<(), SyncError> {
        self.pipeline.enqueue("manual sync").await
    }

    /// Remove expired clients on operator request; syncs only on change.
    pub async fn trigger_cleanup(&self) -> Result<CleanupReport> {
        self.run_cleanup("manual cleanup").await
    }

    /// Remove expired clients and sync with `reason` if anything changed.
    pub async fn run_cleanup(&self, reason: &str) -> Result<CleanupReport> {
        let outcome = self.registry.cleanup_expired().await?;
        let sync = if outcome.changed {
            Some(self.pipeline.enqueue(reason).await)
        } else {
            None
        };
        Ok(CleanupReport { outcome, sync })
    }

    /// Current status snapshot.
    pub async fn status(&self) -> PanelStatus {
        let (total_clients, active_clients) = self.registry.counts().await;
        let PublicIpState {
            value,
            last_updated_at,
            last_error,
        } = self.public_ip.state().await;
        PanelStatus {
            sync_status: self.pipeline.status().await,
            total_clients,
            active_clients,
            proxy_secrets_file: self.config.proxy.secrets_file.clone(),
            reload_enabled: self.reload_enabled,
            public_ip: value,
            public_ip_last_updated_at: last_updated_at,
            public_ip_last_error: last_error,
        }
    }

    /// Where share links point: configured host, else detected IP, else
    /// loopback.
    pub async fn proxy_endpoint(&self) -> ProxyEndpoint {
        let host = match self.config.proxy.public_host() {
            Some(host) => host.to_string(),
            None => match self.public_ip.current().await {
                Some(ip) => ip.to_string(),
                None => FALLBACK_LINK_HOST.to_string(),
            },
        };
        ProxyEndpoint {
            host,
            port: self.config.proxy.public_port,
        }
    }

    /// One-shot startup work: cleanup without sync, a best-effort IP lookup
    /// and an initial sync. Failures are logged and never abort startup.
    pub async fn startup(&self) {
        match self.registry.cleanup_expired().await {
            Ok(outcome) if outcome.changed => {
                tracing::info!("Startup cleanup removed {} expired clients", outcome.removed)
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Startup cleanup error: {}", e),
        }

        if self.config.public_ip.enabled {
            if let Err(e) = self.public_ip.refresh().await {
                tracing::info!("Startup public IP lookup: {}", e);
            }
        }

        if let Err(e) = self.pipeline.enqueue("startup").await {
            tracing::warn!("Startup sync failed, relay may be unavailable: {}", e);
        }
    }
}
