//! Durable Key-Value Substrate
//!
//! The storage engine does not own its bytes directly. It talks to a small
//! text-in/text-out map with the same shape as a browser's `localStorage`:
//!
//! - `get_item(key)` / `set_item(key, text)` / `remove_item(key)`
//! - `len()` and `key(index)` for enumeration
//!
//! Two implementations are provided:
//!
//! - [`MemorySubstrate`]: a sorted in-memory map, lost when the process exits.
//! - [`FileSubstrate`]: the same map, mirrored to a JSON file after every
//!   mutation and loaded again on open. This is what survives restarts.
//!
//! Enumeration order is the sorted key order in both cases, so `key(i)` is
//! stable as long as nothing is written in between.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised by a substrate write.
#[derive(Debug, Error)]
pub enum SubstrateError {
    /// Reading or writing the backing file failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The backing file does not contain a JSON object of strings
    #[error("invalid data file: {0}")]
    Json(#[from] serde_json::Error),
}

/// A synchronous, process-wide text map.
///
/// Reads never fail. Writes may fail for persistent implementations.
pub trait Substrate: Send + Sync {
    /// Returns the text stored under `key`.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous text.
    fn set_item(&mut self, key: &str, value: String) -> Result<(), SubstrateError>;

    /// Removes `key`. Returns `true` if it was present.
    fn remove_item(&mut self, key: &str) -> Result<bool, SubstrateError>;

    /// Number of stored keys.
    fn len(&self) -> usize;

    /// The key at `index` in enumeration order.
    fn key(&self, index: usize) -> Option<String>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys in enumeration order.
    fn keys(&self) -> Vec<String> {
        (0..self.len()).filter_map(|i| self.key(i)).collect()
    }
}

/// In-memory substrate. Nothing outlives the process.
#[derive(Debug, Default, Clone)]
pub struct MemorySubstrate {
    items: BTreeMap<String, String>,
}

impl MemorySubstrate {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Substrate for MemorySubstrate {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: String) -> Result<(), SubstrateError> {
        self.items.insert(key.to_string(), value);
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<bool, SubstrateError> {
        Ok(self.items.remove(key).is_some())
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn key(&self, index: usize) -> Option<String> {
        self.items.keys().nth(index).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }
}

/// File-backed substrate.
///
/// The whole map is rewritten after each mutation: first to `<path>.tmp`,
/// then renamed over `<path>`, so a crash mid-write leaves the previous
/// snapshot intact.
#[derive(Debug)]
pub struct FileSubstrate {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl FileSubstrate {
    /// Opens (or creates) the data file at `path`.
    ///
    /// A missing file starts an empty store; an unreadable or malformed file
    /// is an error rather than silently discarded data.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SubstrateError> {
        let path = path.as_ref().to_path_buf();

        let items = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), keys = items.len(), "Opened data file");

        Ok(Self { path, items })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), SubstrateError> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let json = serde_json::to_string(&self.items)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), keys = self.items.len(), "Persisted data file");
        Ok(())
    }
}

impl Substrate for FileSubstrate {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: String) -> Result<(), SubstrateError> {
        let previous = self.items.insert(key.to_string(), value);
        if let Err(e) = self.persist() {
            // Keep memory and disk in agreement
            match previous {
                Some(old) => self.items.insert(key.to_string(), old),
                None => self.items.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<bool, SubstrateError> {
        let Some(previous) = self.items.remove(key) else {
            return Ok(false);
        };
        if let Err(e) = self.persist() {
            self.items.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(true)
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn key(&self, index: usize) -> Option<String> {
        self.items.keys().nth(index).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }
}
