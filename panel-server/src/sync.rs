//! Relay synchronization pipeline.
//!
//! Every request to reconfigure the relay goes through one FIFO queue drained
//! by a single worker task, so at most one attempt runs at a time and
//! attempts run in the order they were enqueued. Each caller gets the outcome
//! of its own attempt through a oneshot reply; a failed attempt never stops
//! the worker from picking up the next request.
//!
//! An attempt recomputes the active secrets, writes the relay's secrets file
//! atomically and, when enabled, runs the external reload.

use crate::error::SyncError;
use crate::registry::ClientRegistry;
use crate::reload::RelayReloader;
use crate::storage::write_atomic;
use chrono::{DateTime, Utc};
use panel_core::{select_active_secrets, RelaySecret};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};

/// Queued requests allowed before `enqueue` waits for room.
const SYNC_QUEUE_DEPTH: usize = 64;

/// Last-attempt observability. Not a history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// An attempt is executing right now (queued requests do not count).
    pub in_progress: bool,
    /// Completion time of the last successful attempt.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Reason given for the most recently started attempt.
    pub last_reason: Option<String>,
    /// Error of the most recently completed attempt, if it failed.
    pub last_sync_error: Option<String>,
}

/// Render the relay's env-style secrets file.
pub fn render_secrets_file(secrets: &[RelaySecret]) -> String {
    let joined = secrets
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("# Auto-generated by mtpanel\n# DO NOT EDIT MANUALLY\nSECRET={joined}\n")
}

struct SyncRequest {
    reason: String,
    reply: oneshot::Sender<Result<(), SyncError>>,
}

/// Everything one attempt needs.
#[derive(Debug)]
pub struct SyncWorker {
    registry: Arc<ClientRegistry>,
    fallback: RelaySecret,
    max_secrets: usize,
    secrets_file: PathBuf,
    reloader: Arc<dyn RelayReloader>,
    status: Arc<RwLock<SyncStatus>>,
}

impl SyncWorker {
    /// Create a worker writing to `secrets_file`.
    pub fn new(
        registry: Arc<ClientRegistry>,
        fallback: RelaySecret,
        max_secrets: usize,
        secrets_file: PathBuf,
        reloader: Arc<dyn RelayReloader>,
    ) -> Self {
        Self {
            registry,
            fallback,
            max_secrets,
            secrets_file,
            reloader,
            status: Arc::new(RwLock::new(SyncStatus::default())),
        }
    }

    async fn run(self, mut rx: mpsc::Receiver<SyncRequest>) {
        while let Some(request) = rx.recv().await {
            let outcome = self.attempt(&request.reason).await;
            // The caller may have gone away; the attempt still counted.
            let _ = request.reply.send(outcome);
        }
        tracing::debug!("Sync worker stopped");
    }

    async fn attempt(&self, reason: &str) -> Result<(), SyncError> {
        {
            let mut status = self.status.write().await;
            status.in_progress = true;
            status.last_reason = Some(reason.to_string());
        }

        let result = self.apply().await;

        let mut status = self.status.write().await;
        status.in_progress = false;
        match &result {
            Ok(()) => {
                status.last_sync_at = Some(Utc::now());
                status.last_sync_error = None;
                tracing::info!("Relay sync completed ({reason})");
            }
            Err(e) => {
                status.last_sync_error = Some(e.to_string());
                tracing::warn!("Relay sync failed ({reason}): {e}");
            }
        }
        result
    }

    async fn apply(&self) -> Result<(), SyncError> {
        let clients = self.registry.list().await;
        let secrets =
            select_active_secrets(&clients, self.fallback, self.max_secrets, Utc::now());
        tracing::debug!(
            "Writing {} relay secrets to {}",
            secrets.len(),
            self.secrets_file.display()
        );

        write_atomic(&self.secrets_file, render_secrets_file(&secrets).as_bytes())
            .await
            .map_err(|e| SyncError::WriteConfig {
                path: self.secrets_file.clone(),
                source: e,
            })?;

        if self.reloader.is_enabled() {
            self.reloader.reload().await?;
        }
        Ok(())
    }
}

/// Handle for enqueuing sync requests.
#[derive(Debug, Clone)]
pub struct SyncPipeline {
    tx: mpsc::Sender<SyncRequest>,
    status: Arc<RwLock<SyncStatus>>,
}

impl SyncPipeline {
    /// Spawn the worker task and return a handle to it.
    ///
    /// The worker exits once every handle has been dropped.
    pub fn spawn(worker: SyncWorker) -> Self {
        Self::spawn_with_depth(worker, SYNC_QUEUE_DEPTH)
    }

    fn spawn_with_depth(worker: SyncWorker, depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(depth);
        let status = worker.status.clone();
        tokio::spawn(worker.run(rx));
        Self { tx, status }
    }

    /// Queue a sync and wait for the outcome of this request's attempt.
    ///
    /// The request is queued as soon as this is first polled. If the queue
    /// is full it is handed to a detached task, so dropping the returned
    /// future never loses a sync that a persisted mutation is owed.
    pub async fn enqueue(&self, reason: impl Into<String>) -> Result<(), SyncError> {
        let (reply, outcome) = oneshot::channel();
        let request = SyncRequest {
            reason: reason.into(),
            reply,
        };

        match self.tx.try_send(request) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(request)) => {
                tracing::debug!("Sync queue full, waiting for room ({})", request.reason);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    if tx.send(request).await.is_err() {
                        tracing::warn!("Sync worker stopped before a queued request");
                    }
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => return Err(SyncError::PipelineClosed),
        }

        outcome.await.map_err(|_| SyncError::PipelineClosed)?
    }

    /// Snapshot of the most recent attempt.
    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }
}
