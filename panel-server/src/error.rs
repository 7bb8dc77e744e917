//! Error types for mtpanel-server.

use panel_core::ValidationError;
use panel_types::ClientId;
use std::path::PathBuf;
use std::time::Duration;

/// Main error type for panel operations.
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    /// Rejected operator input.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Referenced client does not exist.
    #[error("client not found: {id}")]
    NotFound {
        /// The client ID that was not found.
        id: ClientId,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Relay synchronization error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Public IP lookup setup error.
    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),
}

/// Persisted state errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// File could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// File contents are not valid JSON for the expected shape.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// The file path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// File could not be written or replaced.
    #[error("failed to write {path}: {source}")]
    Write {
        /// The file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Value could not be encoded.
    #[error("failed to encode JSON: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Relay synchronization errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The relay configuration artifact could not be written.
    #[error("failed to write relay config {path}: {source}")]
    WriteConfig {
        /// The artifact path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The external reload action failed.
    #[error("{0}")]
    Reload(#[from] ReloadError),

    /// The sync worker is no longer running.
    #[error("sync pipeline is closed")]
    PipelineClosed,
}

/// External reload action errors.
#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    /// The command could not be started.
    #[error("failed to run reload command: {0}")]
    Spawn(#[source] std::io::Error),

    /// The command did not finish in time.
    #[error("reload command timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The command exited unsuccessfully.
    #[error("{output}")]
    Failed {
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// Trimmed stderr, else stdout, else a generic description.
        output: String,
    },
}

/// Public IP lookup errors. Informational only.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// HTTP client could not be built.
    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),

    /// No provider returned a valid address.
    #[error("failed to detect public IP")]
    AllProvidersFailed,
}

/// Result type alias for panel operations.
pub type Result<T> = std::result::Result<T, PanelError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_passes_through() {
        let err = PanelError::from(ValidationError::SecretOddLength);
        assert_eq!(err.to_string(), "custom secret length must be even");
    }

    #[test]
    fn reload_failure_shows_command_output() {
        let err = SyncError::from(ReloadError::Failed {
            code: Some(1),
            output: "no such service: mtproxy".into(),
        });
        assert_eq!(err.to_string(), "no such service: mtproxy");
    }

    #[test]
    fn timeout_message() {
        let err = ReloadError::Timeout(Duration::from_secs(120));
        assert_eq!(err.to_string(), "reload command timed out after 120s");
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PanelError>();
        assert_send_sync::<SyncError>();
    }
}
