//! Last-known location state.
//!
//! A tiny string key-value store holding [`LOCATION_KEY`] and [`BATTERY_KEY`].
//! Values are overwritten on every accepted write; there is no history.
//!
//! ## Persistence
//!
//! With a backing file, the whole map is serialized as a JSON object and
//! written with a temp-file-then-rename pattern, so readers of the file never
//! see partial content. Without one, state lives only as long as the process.
//!
//! ## Consistency
//!
//! [`LocationStore::put_many`] updates several keys under one write lock and
//! one file flush, so a concurrent reader never pairs a location from one
//! update with a battery reading from another.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

/// Key for the display label of the last reported position.
pub const LOCATION_KEY: &str = "location";

/// Key for the raw battery reading sent with the last report.
pub const BATTERY_KEY: &str = "battery";

/// Persistence failure.
#[derive(Debug)]
pub enum StoreError {
    /// Reading, writing or renaming the state file failed.
    Io { path: PathBuf, source: std::io::Error },
    /// The state file exists but is not a JSON object of strings.
    Corrupt { path: PathBuf, message: String },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io { path, source } => {
                write!(f, "State file I/O error at {}: {source}", path.display())
            }
            StoreError::Corrupt { path, message } => {
                write!(f, "Corrupt state file {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Shared handle to the key-value state. Cheap to clone.
#[derive(Clone, Default)]
pub struct LocationStore {
    values: Arc<RwLock<HashMap<String, String>>>,
    path: Option<Arc<PathBuf>>,
}

impl LocationStore {
    /// Store that keeps values in memory only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Store backed by `path`. Existing contents are loaded; a missing file
    /// starts empty and is created on the first write.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<HashMap<String, String>>(&bytes).map_err(
                |e| StoreError::Corrupt {
                    path: path.clone(),
                    message: e.to_string(),
                },
            )?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}, starting empty", path.display());
                HashMap::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        info!(
            "Loaded {} stored value(s) from {}",
            values.len(),
            path.display()
        );
        Ok(Self {
            values: Arc::new(RwLock::new(values)),
            path: Some(Arc::new(path)),
        })
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref().map(PathBuf::as_path)
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.values.read().await.get(key).cloned()
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.put_many(&[(key, value)]).await
    }

    /// Set every pair in one step. On a flush failure the in-memory map is
    /// left untouched.
    pub async fn put_many(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        let mut values = self.values.write().await;
        let mut next = values.clone();
        for (key, value) in entries {
            next.insert((*key).to_string(), (*value).to_string());
        }
        if let Some(path) = &self.path {
            flush(path, &next).await?;
        }
        *values = next;
        Ok(())
    }
}

/// Atomic write: temp file in the same directory, then rename over `path`.
async fn flush(path: &Path, values: &HashMap<String, String>) -> Result<(), StoreError> {
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let bytes = serde_json::to_vec_pretty(values).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let parent = path.parent().unwrap_or(Path::new("."));
    if !parent.as_os_str().is_empty() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let temp_path = parent.join(format!(".lastseen_tmp_{}", uuid::Uuid::new_v4().simple()));

    tokio::fs::write(&temp_path, &bytes).await.map_err(io_err)?;
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(io_err(e));
    }
    Ok(())
}
