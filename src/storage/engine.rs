//! Storage Engine for Scalars and Sets
//!
//! This module implements the core storage engine for minikv.
//! It maps non-empty string keys to one of two value shapes:
//!
//! - **Scalar**: a single string
//! - **Set**: a duplicate-free collection of strings
//!
//! ## Design Decisions
//!
//! 1. **Substrate-backed**: values live in a [`Substrate`] as text, so the same
//!    engine runs purely in memory or on top of a persistent data file.
//! 2. **JSON encoding**: a Scalar is stored as a JSON string and a Set as a
//!    JSON array. Text that decodes to neither is reported as a missing or
//!    mistyped key, never as a parse error.
//! 3. **One lock per operation**: every read-modify-write (e.g. `SADD`) runs
//!    under a single write guard, so no caller sees half an update.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                StorageEngine                 │
//! │                                              │
//! │   get / set / sadd / srem / smembers / del   │
//! │                     │                        │
//! │             encode / decode (JSON)           │
//! │                     ▼                        │
//! │   RwLock<Box<dyn Substrate>>                 │
//! │   ┌──────────────────┐ ┌──────────────────┐  │
//! │   │ MemorySubstrate  │ │  FileSubstrate   │  │
//! │   └──────────────────┘ └──────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Expiry is not handled here. See [`crate::storage::expiry`].

use crate::storage::substrate::{MemorySubstrate, Substrate, SubstrateError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Errors returned by the storage engine and the expiry registry.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A parameter is missing, empty, or out of range
    #[error("{0}")]
    InvalidArgument(&'static str),

    /// The key is not in storage
    #[error("Key '{0}' not in storage")]
    NotFound(String),

    /// The key holds a different kind of value than the operation needs
    #[error("Key '{key}' does not hold a {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// TTL was queried on a key without an active expiry
    #[error("Key '{0}' is not expiring")]
    NotExpiring(String),

    /// The substrate refused a write
    #[error("storage backend failure: {0}")]
    Backend(#[from] SubstrateError),
}

impl StoreError {
    fn not_found(key: &str) -> Self {
        StoreError::NotFound(key.to_string())
    }

    fn not_a_set(key: &str) -> Self {
        StoreError::TypeMismatch {
            key: key.to_string(),
            expected: "set",
        }
    }
}

/// A stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A single string
    Scalar(String),
    /// Unique strings, iterated in sorted order
    Set(BTreeSet<String>),
}

impl Value {
    /// Returns the type name ("scalar" or "set").
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::Set(_) => "set",
        }
    }

    /// Encodes the value as substrate text.
    pub fn encode(&self) -> Result<String, StoreError> {
        serde_json::to_string(self)
            .map_err(SubstrateError::from)
            .map_err(StoreError::from)
    }

    /// Decodes substrate text. Returns `None` for malformed text.
    pub fn decode(text: &str) -> Option<Value> {
        serde_json::from_str(text).ok()
    }
}

/// Snapshot of engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub keys: usize,
    pub get_ops: u64,
    pub set_ops: u64,
    pub set_member_ops: u64,
    pub del_ops: u64,
    pub expired: u64,
}

/// The main storage engine.
///
/// Designed to be wrapped in an `Arc` and shared between the command handler,
/// the expiry registry, and the registry's timer tasks.
///
/// # Example
///
/// ```
/// use minikv::storage::StorageEngine;
///
/// let engine = StorageEngine::new();
///
/// engine.set("name", "minikv").unwrap();
/// assert_eq!(engine.get("name").unwrap(), "minikv");
///
/// engine.sadd("tags", ["b", "a", "b"]).unwrap();
/// assert_eq!(engine.smembers("tags").unwrap(), vec!["a", "b"]);
/// ```
pub struct StorageEngine {
    substrate: RwLock<Box<dyn Substrate>>,

    get_count: AtomicU64,
    set_count: AtomicU64,
    set_member_count: AtomicU64,
    del_count: AtomicU64,
    expired_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("keys", &self.len())
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Rejects the empty key.
fn check_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() {
        return Err(StoreError::InvalidArgument("key must not be empty"));
    }
    Ok(())
}

/// Collects members into a set, rejecting an empty collection or empty members.
fn collect_members<I, S>(members: I) -> Result<BTreeSet<String>, StoreError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let members: BTreeSet<String> = members.into_iter().map(Into::into).collect();
    if members.is_empty() {
        return Err(StoreError::InvalidArgument("at least one member is required"));
    }
    if members.contains("") {
        return Err(StoreError::InvalidArgument("members must not be empty"));
    }
    Ok(members)
}

impl StorageEngine {
    /// Creates an engine over a fresh in-memory substrate.
    pub fn new() -> Self {
        Self::with_substrate(MemorySubstrate::new())
    }

    /// Creates an engine over the given substrate.
    pub fn with_substrate(substrate: impl Substrate + 'static) -> Self {
        Self {
            substrate: RwLock::new(Box::new(substrate)),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            set_member_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn read(&self) -> RwLockReadGuard<'_, Box<dyn Substrate>> {
        self.substrate.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn write(&self) -> RwLockWriteGuard<'_, Box<dyn Substrate>> {
        self.substrate.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Gets the Scalar stored at `key`.
    ///
    /// Fails with `NotFound` if the key is absent or holds anything other
    /// than a well-formed Scalar.
    pub fn get(&self, key: &str) -> Result<String, StoreError> {
        check_key(key)?;
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let text = self.read().get_item(key);
        match text.as_deref().and_then(Value::decode) {
            Some(Value::Scalar(value)) => Ok(value),
            _ => Err(StoreError::not_found(key)),
        }
    }

    /// Stores a Scalar at `key`, replacing whatever was there.
    pub fn set(&self, key: &str, value: impl Into<String>) -> Result<(), StoreError> {
        check_key(key)?;
        let value = value.into();
        if value.is_empty() {
            return Err(StoreError::InvalidArgument("value must not be empty"));
        }
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let encoded = Value::Scalar(value).encode()?;
        self.write().set_item(key, encoded)?;
        Ok(())
    }

    /// Adds members to the Set at `key`, creating it if absent.
    ///
    /// # Returns
    ///
    /// The number of members that were not already present.
    pub fn sadd<I, S>(&self, key: &str, members: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        check_key(key)?;
        let members = collect_members(members)?;
        self.set_member_count.fetch_add(1, Ordering::Relaxed);

        let mut substrate = self.write();
        let (set, added) = match substrate.get_item(key) {
            None => {
                let added = members.len();
                (members, added)
            }
            Some(text) => match Value::decode(&text) {
                Some(Value::Set(mut existing)) => {
                    let before = existing.len();
                    existing.extend(members);
                    let added = existing.len() - before;
                    (existing, added)
                }
                _ => return Err(StoreError::not_a_set(key)),
            },
        };

        substrate.set_item(key, Value::Set(set).encode()?)?;
        Ok(added)
    }

    /// Removes members from the Set at `key`.
    ///
    /// Removing values that are not members is not an error. A Set emptied
    /// this way stays in storage.
    ///
    /// # Returns
    ///
    /// The number of members actually removed.
    pub fn srem<I, S>(&self, key: &str, members: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        check_key(key)?;
        let members = collect_members(members)?;
        self.set_member_count.fetch_add(1, Ordering::Relaxed);

        let mut substrate = self.write();
        let text = substrate
            .get_item(key)
            .ok_or_else(|| StoreError::not_found(key))?;

        let mut set = match Value::decode(&text) {
            Some(Value::Set(set)) => set,
            _ => return Err(StoreError::not_a_set(key)),
        };

        let before = set.len();
        set.retain(|m| !members.contains(m));
        let removed = before - set.len();

        if removed > 0 {
            substrate.set_item(key, Value::Set(set).encode()?)?;
        }
        Ok(removed)
    }

    /// Returns the members of the Set at `key` in stable (sorted) order.
    pub fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        check_key(key)?;
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let text = self
            .read()
            .get_item(key)
            .ok_or_else(|| StoreError::not_found(key))?;

        match Value::decode(&text) {
            Some(Value::Set(set)) => Ok(set.into_iter().collect()),
            _ => Err(StoreError::not_a_set(key)),
        }
    }

    /// Deletes `key` and its value.
    pub fn del(&self, key: &str) -> Result<(), StoreError> {
        check_key(key)?;
        self.del_count.fetch_add(1, Ordering::Relaxed);

        if self.write().remove_item(key)? {
            Ok(())
        } else {
            Err(StoreError::not_found(key))
        }
    }

    /// Deletes `key` on behalf of an elapsed TTL.
    ///
    /// Returns `false` if the key was already gone.
    pub(crate) fn remove_expired(&self, key: &str) -> Result<bool, StoreError> {
        let removed = self.write().remove_item(key)?;
        if removed {
            self.expired_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(removed)
    }

    /// Returns every stored key in enumeration order.
    pub fn keys(&self) -> Vec<String> {
        self.read().keys()
    }

    /// Checks if a key is stored, whatever its value.
    pub fn exists(&self, key: &str) -> bool {
        self.read().get_item(key).is_some()
    }

    /// Returns the decoded value at `key`, if any.
    pub fn value(&self, key: &str) -> Option<Value> {
        self.read().get_item(key).as_deref().and_then(Value::decode)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns engine statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.len(),
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            set_member_ops: self.set_member_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }
}
