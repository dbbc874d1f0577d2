//! Line Protocol
//!
//! minikv speaks a plain-text, one-command-per-line protocol modelled on the
//! Redis CLI: a verb, then whitespace-separated arguments. Replies are a
//! single line, an error line, or a numbered list.
//!
//! ## Modules
//!
//! - `parser`: splits a line into verb and arguments
//! - `types`: defines the `Reply` enum and how it renders
//!
//! ## Example
//!
//! ```
//! use minikv::protocol::{parse_line, Reply};
//!
//! let cmd = parse_line("SMEMBERS colors").unwrap();
//! assert_eq!(cmd.verb(), "SMEMBERS");
//!
//! let reply = Reply::numbered(["blue", "red"]);
//! assert_eq!(reply.lines(), vec!["1) blue", "2) red"]);
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_line, strip_quotes, CommandLine, ParseError, ParseResult};
pub use types::{Reply, ERROR_PREFIX};
