//! Background cleanup task for expired clients.
//!
//! Runs periodically to remove clients whose expiry has passed and to resync
//! the relay when anything was removed.

use crate::config::CleanupConfig;
use crate::server::ProxyPanel;
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Spawn a background cleanup task.
///
/// The first pass happens one interval after spawning. Returns a handle that
/// can be used to abort the task.
pub fn spawn_cleanup_task(
    panel: Arc<ProxyPanel>,
    config: CleanupConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Cleanup task disabled");
            return;
        }

        let period = config.interval();
        tracing::info!("Cleanup task started (interval: {}s)", period.as_secs());

        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;

            match panel.run_cleanup("auto cleanup").await {
                Ok(report) => {
                    if report.outcome.removed > 0 {
                        tracing::info!(
                            "Cleanup: removed {} expired clients",
                            report.outcome.removed
                        );
                    } else {
                        tracing::debug!("Cleanup: no expired clients");
                    }
                    if let Some(Err(e)) = report.sync {
                        tracing::error!("Cleanup sync error: {}", e);
                    }
                }
                Err(e) => {
                    tracing::error!("Cleanup error: {}", e);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::ReloadError;
    use crate::reload::{DisabledReloader, RelayReloader};
    use crate::storage::write_json;
    use async_trait::async_trait;
    use chrono::Utc;
    use panel_types::{Client, ClientId, SecretMode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct CountingReloader {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RelayReloader for CountingReloader {
        async fn reload(&self) -> Result<(), ReloadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ReloadError::Failed {
                    code: Some(1),
                    output: "relay unavailable".to_string(),
                });
            }
            Ok(())
        }
    }

    async fn panel_with_expired_client(
        dir: &tempfile::TempDir,
        reloader: Arc<CountingReloader>,
    ) -> Arc<ProxyPanel> {
        let config = test_config(dir);
        let now = Utc::now();
        let expired = Client {
            id: ClientId::new(),
            name: "expired".to_string(),
            secret_mode: SecretMode::Secure,
            fake_tls_host: None,
            secret: "ee0123456789abcdef0123456789abcdef".to_string(),
            expires_at: Some(now - chrono::Duration::minutes(1)),
            created_at: now - chrono::Duration::days(7),
            updated_at: now - chrono::Duration::days(7),
        };
        write_json(&config.storage.clients_file(), &vec![expired])
            .await
            .unwrap();
        Arc::new(ProxyPanel::with_reloader(config, reloader).await.unwrap())
    }

    async fn wait_for_calls(reloader: &CountingReloader, calls: usize) {
        for _ in 0..120 {
            if reloader.calls.load(Ordering::SeqCst) >= calls {
                return;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    fn enabled(interval_secs: u64) -> CleanupConfig {
        CleanupConfig {
            interval_secs,
            enabled: true,
        }
    }

    fn test_config(dir: &tempfile::TempDir) -> Config {
        let mut config = Config::default();
        config.storage.data_dir = dir.path().join("data");
        config.proxy.secrets_file = dir.path().join("mtproxy.env");
        config.public_ip.enabled = false;
        config
    }

    #[tokio::test]
    async fn cleanup_task_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let panel = Arc::new(
            ProxyPanel::with_reloader(test_config(&dir), Arc::new(DisabledReloader))
                .await
                .unwrap(),
        );
        let config = CleanupConfig {
            interval_secs: 15,
            enabled: false,
        };

        let handle = spawn_cleanup_task(panel, config);

        // Task should complete immediately when disabled
        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("Task should complete when disabled")
            .expect("Task should not panic");
    }

    #[tokio::test(start_paused = true)]
    async fn tick_removes_expired_and_syncs_once() {
        let dir = tempfile::tempdir().unwrap();
        let reloader = Arc::new(CountingReloader::default());
        let panel = panel_with_expired_client(&dir, reloader.clone()).await;

        let handle = spawn_cleanup_task(panel.clone(), enabled(15));

        // Nothing happens before the first interval elapses.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(reloader.calls.load(Ordering::SeqCst), 0);
        assert_eq!(panel.list_clients().await.len(), 1);

        wait_for_calls(&reloader, 1).await;
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert!(panel.list_clients().await.is_empty());
        assert_eq!(reloader.calls.load(Ordering::SeqCst), 1);
        let status = panel.status().await.sync_status;
        assert_eq!(status.last_reason.as_deref(), Some("auto cleanup"));
        assert!(status.last_sync_error.is_none());
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_sync_does_not_stop_task() {
        let dir = tempfile::tempdir().unwrap();
        let reloader = Arc::new(CountingReloader {
            fail: true,
            ..Default::default()
        });
        let panel = panel_with_expired_client(&dir, reloader.clone()).await;

        // Below the floor, so the task runs every 15 seconds.
        let handle = spawn_cleanup_task(panel.clone(), enabled(1));

        wait_for_calls(&reloader, 1).await;
        tokio::time::sleep(Duration::from_secs(45)).await;

        assert!(!handle.is_finished());
        assert!(panel.list_clients().await.is_empty());
        assert_eq!(
            panel.status().await.sync_status.last_sync_error.as_deref(),
            Some("relay unavailable")
        );
        handle.abort();
    }
}
