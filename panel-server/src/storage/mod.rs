//! Persisted state for mtpanel.
//!
//! Everything lives in small JSON files that are rewritten whole. Writers go
//! through [`write_atomic`], which writes `<path>.tmp` and renames it over the
//! target, so readers never observe a partial file.

mod state;

pub use state::load_or_init_fallback_secret;

use crate::error::{StorageError, StorageResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// `<path>.tmp`, next to the target so the rename stays on one filesystem.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Replace `path` with `contents` atomically, creating parent directories.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await
}

/// Read a JSON file, returning `None` when it does not exist.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StorageError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| StorageError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Pretty-print `value` and write it atomically.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    let mut body = serde_json::to_vec_pretty(value).map_err(StorageError::Encode)?;
    body.push(b'\n');
    write_atomic(path, &body)
        .await
        .map_err(|e| StorageError::Write {
            path: path.to_path_buf(),
            source: e,
        })
}
