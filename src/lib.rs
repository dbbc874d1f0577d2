//! # minikv - A Small In-Process Key-Value Store
//!
//! minikv is an in-process key-value store driven by a Redis-like text
//! command language. Values are scalars or sets of strings, and any key can
//! be given a time-to-live after which it is deleted automatically.
//!
//! ## Features
//!
//! - **Redis-like commands**: `GET`, `SET`, `SADD`, `SREM`, `SMEMBERS`, `KEYS`,
//!   `DEL`, `EXPIRE`, `TTL`
//! - **Pluggable storage**: values live in a string-to-string substrate, in
//!   memory or in a JSON file
//! - **Per-key timers**: every expiring key owns exactly one Tokio timer task
//! - **Console front end**: a line-oriented session over any async reader
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               minikv                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │   Console   │───>│ Line Parser │───>│  Command    │                  │
//! │  │   Session   │    │             │    │  Handler    │                  │
//! │  └──────┬──────┘    └─────────────┘    └──────┬──────┘                  │
//! │         │                                     │                         │
//! │         ▼                       ┌─────────────┴──────────┐              │
//! │  ┌─────────────┐                ▼                        ▼              │
//! │  │   History   │      ┌──────────────────┐    ┌───────────────────┐     │
//! │  └─────────────┘      │  StorageEngine   │<───│  ExpiryRegistry   │     │
//! │                       │                  │    │  (timer per key)  │     │
//! │                       │  ┌────────────┐  │    └───────────────────┘     │
//! │                       │  │ Substrate  │  │                              │
//! │                       │  │ memory/file│  │                              │
//! │                       │  └────────────┘  │                              │
//! │                       └──────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use minikv::commands::CommandHandler;
//! use minikv::storage::{ExpiryRegistry, StorageEngine};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! // Create the storage engine and its expiry registry
//! let storage = Arc::new(StorageEngine::new());
//! let registry = ExpiryRegistry::new(storage, tokio::runtime::Handle::current());
//!
//! // Every command line produces a reply
//! let handler = CommandHandler::new(registry);
//! assert_eq!(handler.process("SADD colors red blue").to_string(), "OK");
//! assert_eq!(handler.process("SMEMBERS colors").to_string(), "1) blue\n2) red");
//! assert_eq!(handler.process("EXPIRE colors 60").to_string(), "OK");
//! assert_eq!(handler.process("TTL colors").to_string(), "60");
//! # }
//! ```
//!
//! ## Supported Commands
//!
//! ### Scalar Commands
//! - `GET key`
//! - `SET key value`
//!
//! ### Set Commands
//! - `SADD key member [member ...]`
//! - `SREM key member [member ...]`
//! - `SMEMBERS key`
//!
//! ### Key Commands
//! - `KEYS`
//! - `DEL key`
//! - `EXPIRE key seconds`
//! - `TTL key`
//!
//! ## Module Overview
//!
//! - [`protocol`]: line parsing and reply types
//! - [`storage`]: substrate-backed storage engine and the expiry registry
//! - [`commands`]: command dispatch and validation
//! - [`console`]: interactive sessions and command history
//!
//! ## Design Highlights
//!
//! ### One Timer Per Key
//!
//! Expiry is not swept. `EXPIRE` spawns a single timer task for the key and
//! aborts whatever timer the key had before. A generation number on every
//! record makes a timer that lost the race to a newer `EXPIRE` a no-op.
//!
//! ### Lock Ordering
//!
//! The registry lock is always taken before the storage lock, so an `EXPIRE`,
//! a `DEL` and a firing timer can never deadlock each other.

pub mod commands;
pub mod console;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use console::{run_console, ConsoleStats, History};
pub use protocol::{parse_line, ParseError, Reply};
pub use storage::{ExpiryRegistry, StorageEngine, StoreError, Value};

/// Version of minikv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
