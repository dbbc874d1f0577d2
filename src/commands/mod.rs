//! Command Handler Module
//!
//! This module implements the command processing layer for minikv.
//! It receives raw command lines, executes them against the storage engine
//! and the expiry registry, and returns a [`Reply`](crate::protocol::Reply).
//!
//! ## Architecture
//!
//! ```text
//! Command line
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Line parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Validate     │
//! │  - Execute      │
//! └───────┬─────────┘
//!         │
//!         ├─────────────────────┐
//!         ▼                     ▼
//! ┌─────────────────┐  ┌─────────────────┐
//! │ StorageEngine   │  │ ExpiryRegistry  │
//! └─────────────────┘  └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - Scalars: `GET`, `SET`
//! - Sets: `SADD`, `SREM`, `SMEMBERS`
//! - Keys: `KEYS`, `DEL`, `EXPIRE`, `TTL`

pub mod handler;

// Re-export the main command handler
pub use handler::CommandHandler;
