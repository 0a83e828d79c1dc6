use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use pixel_bridge_core::CanvasUpdate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// File name of the durable representation inside the storage directory.
pub const UPDATES_FILE: &str = "pixel_updates.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize update log for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("update log at {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Records are decoded one by one so a single malformed entry does not
/// condemn the whole history.
#[derive(Debug, Default, Deserialize)]
struct LogDocument {
    #[serde(default)]
    updates: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct LogDocumentRef<'a> {
    updates: &'a [CanvasUpdate],
}

/// Outcome of [`UpdateLog::clear`]. The in-memory history is always emptied;
/// `persist_error` is set when the empty state could not be written.
#[derive(Debug)]
pub struct ClearReport {
    pub removed: usize,
    pub persist_error: Option<StoreError>,
}

/// Durable, append-only history of accepted canvas updates.
///
/// Holds the in-memory mirror of the JSON document at `path` and rewrites the
/// whole document on every mutation. The mirror is only replaced after the
/// write has succeeded, so it matches the file after every successful call.
/// Mutations are serialized by the `updates` lock, which is held across the
/// read-modify-write of the file.
pub struct UpdateLog {
    path: PathBuf,
    updates: Mutex<Vec<CanvasUpdate>>,
    last: RwLock<Option<CanvasUpdate>>,
}

impl UpdateLog {
    /// Opens the log at `path`, creating an empty store when none exists.
    ///
    /// An unreadable or unparsable store is left on disk untouched and the
    /// log starts empty; the next successful append replaces it.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let updates = match read_document(&path).await {
            Ok(Some(updates)) => {
                info!(
                    path = %path.display(),
                    updates = updates.len(),
                    "loaded saved updates from storage"
                );
                updates
            }
            Ok(None) => {
                write_document(&path, &[]).await?;
                info!(path = %path.display(), "initialized empty update log");
                Vec::new()
            }
            Err(err) => {
                error!(error = %err, "failed to load saved updates; starting empty");
                Vec::new()
            }
        };

        Ok(Self {
            path,
            last: RwLock::new(updates.last().cloned()),
            updates: Mutex::new(updates),
        })
    }

    /// Opens `<dir>/pixel_updates.json`.
    pub async fn load_in(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::load(dir.as_ref().join(UPDATES_FILE)).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `update` and rewrites the store, returning the new record count.
    ///
    /// The store is re-read first. A missing store is recreated and an
    /// unparsable one is discarded; in both cases the new store holds only
    /// `update`. Read and write failures are returned to the caller.
    ///
    /// `LastUpdate` is set before any I/O and kept even when the append fails.
    pub async fn append(&self, update: CanvasUpdate) -> Result<usize, StoreError> {
        let mut mirror = self.updates.lock().await;
        self.set_last_update(update.clone());

        let mut updates = match read_document(&self.path).await {
            Ok(Some(updates)) => updates,
            Ok(None) => {
                info!(path = %self.path.display(), "creating new update log");
                Vec::new()
            }
            Err(err @ StoreError::Corrupt { .. }) => {
                warn!(error = %err, "replacing unparsable update log");
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        let pixels = update.pixel_count();
        updates.push(update);
        write_document(&self.path, &updates).await?;
        debug!(
            path = %self.path.display(),
            updates = updates.len(),
            pixels,
            "saved update"
        );

        let total = updates.len();
        *mirror = updates;
        Ok(total)
    }

    /// Empties the history. Persistence failures are logged and reported in
    /// the returned [`ClearReport`] but do not undo the in-memory clear.
    pub async fn clear(&self) -> ClearReport {
        let mut mirror = self.updates.lock().await;
        let removed = mirror.len();
        mirror.clear();
        *self.last.write() = None;

        let persist_error = match write_document(&self.path, &[]).await {
            Ok(()) => {
                info!(removed, "cleared all saved drawings");
                None
            }
            Err(err) => {
                error!(error = %err, removed, "failed to persist cleared update log");
                Some(err)
            }
        };
        ClearReport {
            removed,
            persist_error,
        }
    }

    /// Copy of every accepted update in arrival order.
    pub async fn snapshot(&self) -> Vec<CanvasUpdate> {
        self.updates.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.updates.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Most recently received update. May run ahead of the durable history
    /// when an append failed after the update was accepted.
    pub fn last_update(&self) -> Option<CanvasUpdate> {
        self.last.read().clone()
    }

    pub fn set_last_update(&self, update: CanvasUpdate) {
        *self.last.write() = Some(update);
    }
}

/// Reads the updates stored at `path` without creating or modifying it. A
/// missing store reads as empty.
pub async fn read_updates(path: &Path) -> Result<Vec<CanvasUpdate>, StoreError> {
    Ok(read_document(path).await?.unwrap_or_default())
}

/// `Ok(None)` when the store does not exist. Bytes that are not UTF-8 JSON
/// make the store `Corrupt`; records that fail to decode are dropped.
async fn read_document(path: &Path) -> Result<Option<Vec<CanvasUpdate>>, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StoreError::io("reading update log", path, err)),
    };
    let document: LogDocument =
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;

    let mut updates = Vec::with_capacity(document.updates.len());
    for (index, record) in document.updates.into_iter().enumerate() {
        match serde_json::from_value::<CanvasUpdate>(record) {
            Ok(update) => updates.push(update),
            Err(err) => warn!(
                path = %path.display(),
                index,
                error = %err,
                "skipping unreadable stored update"
            ),
        }
    }
    Ok(Some(updates))
}

/// Writes the full document to a sibling temp file, then renames it over
/// `path` so readers never observe a partial document.
async fn write_document(path: &Path, updates: &[CanvasUpdate]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| StoreError::io("creating storage directory", parent, err))?;
    }

    let mut text = serde_json::to_string_pretty(&LogDocumentRef { updates }).map_err(|source| {
        StoreError::Serialize {
            path: path.to_path_buf(),
            source,
        }
    })?;
    text.push('\n');

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, text)
        .await
        .map_err(|err| StoreError::io("writing update log", &tmp_path, err))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|err| StoreError::io("replacing update log", path, err))
}
