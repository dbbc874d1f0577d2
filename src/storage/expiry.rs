//! Expiry Registry
//!
//! This module tracks which keys have a time-to-live and deletes them when it
//! elapses. Instead of polling the keyspace, every `EXPIRE` arms its
//! own one-shot timer task on the tokio runtime, so a key disappears on time
//! even if nothing touches the store in the meantime.
//!
//! ## Records and Timers
//!
//! ```text
//! EXPIRE k 5 ──► lock records ──► abort old timer (if any)
//!                     │
//!                     ├──► insert { expire_at, generation, timer }
//!                     │
//!                     └──► spawn: sleep_until(expire_at) ──► fire(k, generation)
//!
//! fire(k, g) ──► lock records ──► record.generation == g ?
//!                                   ├─ yes: remove record, delete k from storage
//!                                   └─ no:  stale timer, nothing to do
//! ```
//!
//! The generation check covers the narrow window where a timer has already
//! woken up and is waiting for the lock while `EXPIRE` or `DEL` replaces or
//! drops its record: aborting it is then too late, but it finds a different
//! generation (or no record) and leaves the key alone.
//!
//! ## Locking
//!
//! The records mutex is always taken before the storage lock. Expire, fire,
//! TTL and delete all run under it, so a command never observes a record
//! without its key or a key deleted while its record lingers.

use crate::storage::{StorageEngine, StoreError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// An active TTL.
#[derive(Debug)]
struct ExpiryRecord {
    /// When the key is deleted
    expire_at: Instant,
    /// Identifies the timer that owns this record
    generation: u64,
    /// Cancels the timer task
    timer: AbortHandle,
}

/// Tracks TTLs and owns their timer tasks.
///
/// Timer tasks hold an `Arc` to the registry, so the registry is always used
/// behind an `Arc`. Call [`ExpiryRegistry::shutdown`] to cancel every pending
/// timer when the store is being torn down.
///
/// # Example
///
/// ```
/// use minikv::storage::{ExpiryRegistry, StorageEngine};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let storage = Arc::new(StorageEngine::new());
/// let registry = ExpiryRegistry::new(Arc::clone(&storage), tokio::runtime::Handle::current());
///
/// storage.set("session", "abc").unwrap();
/// registry.expire("session", 60).unwrap();
/// assert_eq!(registry.ttl("session").unwrap(), 60);
/// # }
/// ```
pub struct ExpiryRegistry {
    storage: Arc<StorageEngine>,
    runtime: Handle,
    records: Mutex<HashMap<String, ExpiryRecord>>,
    next_generation: AtomicU64,
}

impl std::fmt::Debug for ExpiryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiryRegistry")
            .field("pending", &self.pending())
            .finish()
    }
}

impl ExpiryRegistry {
    /// Creates a registry that deletes from `storage` and spawns its timers on
    /// `runtime`.
    pub fn new(storage: Arc<StorageEngine>, runtime: Handle) -> Arc<Self> {
        Arc::new(Self {
            storage,
            runtime,
            records: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        })
    }

    /// The storage engine this registry expires keys from.
    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, HashMap<String, ExpiryRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedules `key` for deletion `seconds` from now.
    ///
    /// Any earlier TTL on the key is cancelled and replaced, so at most one
    /// timer per key is ever armed.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `key` is empty, `seconds <= 0`, or the deadline
    ///   cannot be represented
    /// - `NotFound` if `key` is not in storage
    pub fn expire(self: &Arc<Self>, key: &str, seconds: i64) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidArgument("key must not be empty"));
        }
        if seconds <= 0 {
            return Err(StoreError::InvalidArgument("seconds must be positive"));
        }

        let mut records = self.lock();

        if !self.storage.exists(key) {
            return Err(StoreError::NotFound(key.to_string()));
        }

        let expire_at = Instant::now()
            .checked_add(Duration::from_secs(seconds as u64))
            .ok_or(StoreError::InvalidArgument("expire time is out of range"))?;
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let registry = Arc::clone(self);
        let timer_key = key.to_string();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep_until(expire_at).await;
            registry.fire(&timer_key, generation);
        });

        let record = ExpiryRecord {
            expire_at,
            generation,
            timer: task.abort_handle(),
        };

        if let Some(previous) = records.insert(key.to_string(), record) {
            previous.timer.abort();
            trace!(key = key, generation = previous.generation, "Replaced pending expiry");
        }

        debug!(key = key, seconds = seconds, "Expiry scheduled");
        Ok(())
    }

    /// Runs when a timer elapses.
    fn fire(&self, key: &str, generation: u64) {
        let mut records = self.lock();

        match records.get(key) {
            Some(record) if record.generation == generation => {
                records.remove(key);
            }
            _ => {
                trace!(key = key, generation = generation, "Stale expiry timer ignored");
                return;
            }
        }

        match self.storage.remove_expired(key) {
            Ok(true) => debug!(key = key, "Key expired"),
            Ok(false) => trace!(key = key, "Expired key was already gone"),
            Err(e) => warn!(key = key, error = %e, "Failed to delete expired key"),
        }
    }

    /// Returns the whole seconds left before `key` expires, rounded up.
    ///
    /// A result of zero or below means the deadline has passed and the timer
    /// is about to run.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `key` is empty
    /// - `NotFound` if `key` is not in storage
    /// - `NotExpiring` if `key` has no TTL
    pub fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidArgument("key must not be empty"));
        }

        let records = self.lock();

        if !self.storage.exists(key) {
            return Err(StoreError::NotFound(key.to_string()));
        }

        records
            .get(key)
            .map(|record| remaining_secs(record.expire_at, Instant::now()))
            .ok_or_else(|| StoreError::NotExpiring(key.to_string()))
    }

    /// Deletes `key` from storage and cancels its TTL, if any.
    ///
    /// This is the path for every deletion that is not an expiry.
    pub fn remove_key(&self, key: &str) -> Result<(), StoreError> {
        let mut records = self.lock();

        self.storage.del(key)?;

        if let Some(record) = records.remove(key) {
            record.timer.abort();
            debug!(key = key, "Pending expiry cancelled by delete");
        }
        Ok(())
    }

    /// Checks whether `key` has an active TTL.
    pub fn is_expiring(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Number of active TTLs.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Cancels every pending timer without deleting any key.
    ///
    /// # Returns
    ///
    /// The number of timers cancelled.
    pub fn shutdown(&self) -> usize {
        let mut records = self.lock();
        let cancelled = records.len();
        for (_, record) in records.drain() {
            record.timer.abort();
        }
        if cancelled > 0 {
            info!(cancelled = cancelled, "Pending expiry timers cancelled");
        }
        cancelled
    }
}

/// `ceil((expire_at - now) / 1s)`, negative once the deadline has passed.
fn remaining_secs(expire_at: Instant, now: Instant) -> i64 {
    const NANOS_PER_SEC: i128 = 1_000_000_000;

    let nanos = if expire_at >= now {
        (expire_at - now).as_nanos() as i128
    } else {
        -((now - expire_at).as_nanos() as i128)
    };

    (nanos + NANOS_PER_SEC - 1).div_euclid(NANOS_PER_SEC) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Arc<StorageEngine>, Arc<ExpiryRegistry>) {
        let storage = Arc::new(StorageEngine::new());
        let registry = ExpiryRegistry::new(Arc::clone(&storage), Handle::current());
        (storage, registry)
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_expires_on_time() {
        let (storage, registry) = setup();
        storage.set("k", "v").unwrap();

        registry.expire("k", 2).unwrap();
        assert_eq!(registry.ttl("k").unwrap(), 2);
        assert!(registry.is_expiring("k"));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(registry.ttl("k").unwrap(), 1);
        assert_eq!(storage.get("k").unwrap(), "v");

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(matches!(storage.get("k"), Err(StoreError::NotFound(_))));
        assert!(matches!(registry.ttl("k"), Err(StoreError::NotFound(_))));
        assert_eq!(registry.pending(), 0);
        assert_eq!(storage.stats().expired, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sets_expire_too() {
        let (storage, registry) = setup();
        storage.sadd("s", ["x", "y"]).unwrap();

        registry.expire("s", 1).unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(matches!(storage.smembers("s"), Err(StoreError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reexpire_cancels_first_deadline() {
        let (storage, registry) = setup();
        storage.set("k", "v").unwrap();

        registry.expire("k", 1).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        registry.expire("k", 2).unwrap();
        assert_eq!(registry.pending(), 1);

        // Past the first deadline
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(storage.get("k").unwrap(), "v");
        assert_eq!(registry.ttl("k").unwrap(), 2);

        // Past the new one
        tokio::time::sleep(Duration::from_millis(1400)).await;
        assert!(!storage.exists("k"));
        assert_eq!(storage.stats().expired, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_cancels_pending_expiry() {
        let (storage, registry) = setup();
        storage.set("k", "v").unwrap();
        registry.expire("k", 1).unwrap();

        registry.remove_key("k").unwrap();
        assert!(!registry.is_expiring("k"));

        // A new key under the same name must not be hit by the old timer
        storage.set("k", "again").unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(storage.get("k").unwrap(), "again");
        assert!(matches!(registry.ttl("k"), Err(StoreError::NotExpiring(_))));
    }

    #[tokio::test]
    async fn test_remove_key_missing() {
        let (_, registry) = setup();
        assert!(matches!(registry.remove_key("nope"), Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_expire_validation() {
        let (storage, registry) = setup();
        storage.set("k", "v").unwrap();

        assert!(matches!(registry.expire("", 5), Err(StoreError::InvalidArgument(_))));
        assert!(matches!(registry.expire("k", 0), Err(StoreError::InvalidArgument(_))));
        assert!(matches!(registry.expire("k", -3), Err(StoreError::InvalidArgument(_))));
        assert!(matches!(registry.expire("nope", 5), Err(StoreError::NotFound(_))));
        assert_eq!(registry.pending(), 0);
    }

    #[tokio::test]
    async fn test_ttl_errors() {
        let (storage, registry) = setup();
        storage.set("k", "v").unwrap();

        assert!(matches!(registry.ttl(""), Err(StoreError::InvalidArgument(_))));
        assert!(matches!(registry.ttl("nope"), Err(StoreError::NotFound(_))));
        assert!(matches!(registry.ttl("k"), Err(StoreError::NotExpiring(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_fire_is_noop() {
        let (storage, registry) = setup();
        storage.set("k", "v").unwrap();
        registry.expire("k", 10).unwrap();

        // A timer from an older generation
        registry.fire("k", u64::MAX);
        assert!(storage.exists("k"));
        assert!(registry.is_expiring("k"));

        // A timer for a key with no record
        storage.set("other", "v").unwrap();
        registry.fire("other", 0);
        assert!(storage.exists("other"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_timers() {
        let (storage, registry) = setup();
        storage.set("a", "1").unwrap();
        storage.set("b", "2").unwrap();
        registry.expire("a", 1).unwrap();
        registry.expire("b", 1).unwrap();

        assert_eq!(registry.shutdown(), 2);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(storage.exists("a"));
        assert!(storage.exists("b"));
        assert_eq!(registry.pending(), 0);
    }

    #[test]
    fn test_remaining_secs_rounding() {
        let now = Instant::now();

        assert_eq!(remaining_secs(now + Duration::from_secs(3), now), 3);
        assert_eq!(remaining_secs(now + Duration::from_millis(2001), now), 3);
        assert_eq!(remaining_secs(now + Duration::from_millis(1), now), 1);
        assert_eq!(remaining_secs(now, now), 0);
        assert_eq!(remaining_secs(now, now + Duration::from_millis(300)), 0);
        assert_eq!(remaining_secs(now, now + Duration::from_millis(1500)), -1);
    }
}
