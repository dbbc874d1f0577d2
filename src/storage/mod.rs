//! Storage Module
//!
//! This module provides the core storage functionality for minikv:
//! a key-value engine for scalars and sets, the durable substrate it writes
//! through, and the registry that expires keys on a timer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ExpiryRegistry                         │
//! │   records: key → { expire_at, generation, timer }           │
//! │   one tokio timer task per expiring key                     │
//! └──────────────────────────────┬──────────────────────────────┘
//!                                │ deletes on fire / on DEL
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      StorageEngine                          │
//! │   Scalar(String) | Set(BTreeSet<String>), JSON-encoded      │
//! └──────────────────────────────┬──────────────────────────────┘
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │           Substrate (MemorySubstrate | FileSubstrate)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use minikv::storage::{ExpiryRegistry, StorageEngine};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let engine = Arc::new(StorageEngine::new());
//! let registry = ExpiryRegistry::new(Arc::clone(&engine), tokio::runtime::Handle::current());
//!
//! engine.set("name", "minikv").unwrap();
//! assert_eq!(engine.get("name").unwrap(), "minikv");
//!
//! registry.expire("name", 3600).unwrap();
//! assert!(registry.is_expiring("name"));
//! # }
//! ```

pub mod engine;
pub mod expiry;
pub mod substrate;

// Re-export commonly used types
pub use engine::{StorageEngine, StorageStats, StoreError, Value};
pub use expiry::ExpiryRegistry;
pub use substrate::{FileSubstrate, MemorySubstrate, Substrate, SubstrateError};
