//! Snapshot Loader
//!
//! Reads the one-time initial state a dashboard view is rendered with and
//! removes it from its source, so the data cannot be applied twice.
//!
//! A snapshot is shaped like every other update batch:
//!
//! ```json
//! { "global": { "url": "http://host/json/globalstatus", "build_load": 13 },
//!   "codebases": { ... } }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::SnapshotError;
use crate::types::{UpdateBatch, UpdateKey};

/// Well-known identifier of the embedded snapshot element
pub const SNAPSHOT_ELEMENT_ID: &str = "instant-json";

/// A place a snapshot can be taken from exactly once
pub trait SnapshotSource: Send + Sync {
    /// Remove and return the raw snapshot text, if any is present
    fn take(&self) -> Result<Option<String>, SnapshotError>;
}

/// In-memory stand-in for the page-embedded data element
#[derive(Debug, Default)]
pub struct EmbeddedSnapshot {
    raw: Mutex<Option<String>>,
}

impl EmbeddedSnapshot {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
        }
    }

    /// A source with nothing embedded
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the element is still present
    pub fn is_present(&self) -> bool {
        self.raw.lock().is_some()
    }
}

impl SnapshotSource for EmbeddedSnapshot {
    fn take(&self) -> Result<Option<String>, SnapshotError> {
        Ok(self.raw.lock().take())
    }
}

/// Snapshot stored in a JSON file that is deleted once read
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    path: PathBuf,
}

impl FileSnapshot {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSource for FileSnapshot {
    fn take(&self) -> Result<Option<String>, SnapshotError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        fs::remove_file(&self.path)?;
        Ok(Some(raw))
    }
}

/// Consumes a snapshot source at most once
pub struct SnapshotLoader {
    source: Box<dyn SnapshotSource>,
    consumed: bool,
}

impl SnapshotLoader {
    pub fn new(source: Box<dyn SnapshotSource>) -> Self {
        Self {
            source,
            consumed: false,
        }
    }

    /// Loader over an embedded JSON string
    pub fn embedded(raw: impl Into<String>) -> Self {
        Self::new(Box::new(EmbeddedSnapshot::new(raw)))
    }

    /// Loader with no snapshot at all
    pub fn none() -> Self {
        Self::new(Box::new(EmbeddedSnapshot::empty()))
    }

    /// Read the initial batch.
    ///
    /// Returns `None` when no snapshot exists, when it is malformed, and on
    /// every call after the first successful one.
    pub fn load_initial_batch(&mut self) -> Option<UpdateBatch> {
        if self.consumed {
            return None;
        }

        let raw = match self.source.take() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!("No embedded snapshot found");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read embedded snapshot");
                return None;
            }
        };
        self.consumed = true;

        match parse_batch(&raw) {
            Ok(batch) => {
                tracing::debug!(keys = batch.len(), "Loaded embedded snapshot");
                Some(batch)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed snapshot");
                None
            }
        }
    }
}

/// Parse raw snapshot text into an update batch
pub fn parse_batch(raw: &str) -> Result<UpdateBatch, SnapshotError> {
    let value: Value = serde_json::from_str(raw)?;
    UpdateBatch::from_value(value).ok_or(SnapshotError::NotAnObject)
}

/// `(key, url)` for every payload carrying a string `url` field, in batch order
pub fn subscription_urls(batch: &UpdateBatch) -> Vec<(UpdateKey, String)> {
    batch
        .iter()
        .filter_map(|(key, payload)| {
            payload
                .get("url")
                .and_then(Value::as_str)
                .map(|url| (key.to_string(), url.to_string()))
        })
        .collect()
}
