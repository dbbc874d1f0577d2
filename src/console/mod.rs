//! Console Module
//!
//! This module is the interactive front end of minikv. A session reads one
//! command per line, hands it to the command handler, and renders the reply
//! under the echoed command, the way a terminal-style console would.
//!
//! ## Architecture
//!
//! ```text
//!  reader (stdin, file, test mock)
//!        │ lines
//!        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ConsoleSession                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ Frame lines │───>│ process()   │───>│ History     │      │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘      │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Write lines │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//!        │
//!        ▼
//!  writer (stdout, test buffer)
//! ```
//!
//! ## Example
//!
//! ```
//! use minikv::commands::CommandHandler;
//! use minikv::console::{run_console, ConsoleStats};
//! use minikv::storage::{ExpiryRegistry, StorageEngine};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let storage = Arc::new(StorageEngine::new());
//! let handler = CommandHandler::new(ExpiryRegistry::new(
//!     storage,
//!     tokio::runtime::Handle::current(),
//! ));
//!
//! let mut output = Vec::new();
//! let input: &[u8] = b"SET greeting hi\nGET greeting\n";
//! run_console(input, &mut output, handler, Arc::new(ConsoleStats::new()), true)
//!     .await
//!     .unwrap();
//!
//! assert_eq!(output, b"> SET greeting hi\nOK\n> GET greeting\n\"hi\"\n");
//! # }
//! ```

pub mod history;
pub mod session;

// Re-export commonly used types
pub use history::{EntryKind, History, LogEntry};
pub use session::{run_console, ConsoleError, ConsoleSession, ConsoleStats, MAX_LINE_LENGTH};
