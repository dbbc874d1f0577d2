//! Command Reply Types
//!
//! Every command line produces exactly one [`Reply`]:
//!
//! - `Status`: a single line such as `OK`, `"value"` or `42`
//! - `Error`: a failure, rendered as `ERROR: <message>`
//! - `List`: an ordered sequence of lines, e.g. numbered set members
//!
//! ## Examples
//!
//! ```text
//! SET a 1        → OK
//! GET a          → "1"
//! SMEMBERS s     → 1) x
//!                  2) y
//! GET missing    → ERROR: Key not found
//! ```

use std::fmt;

/// Prefix put in front of every error line.
pub const ERROR_PREFIX: &str = "ERROR: ";

/// The result of processing one command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A single result line
    Status(String),

    /// A failure. The message is stored without the `ERROR: ` prefix.
    Error(String),

    /// An ordered list of result lines
    List(Vec<String>),
}

impl Reply {
    /// Common response for successful writes
    pub fn ok() -> Self {
        Reply::Status("OK".to_string())
    }

    /// Creates a single-line reply.
    pub fn status(s: impl Into<String>) -> Self {
        Reply::Status(s.into())
    }

    /// Creates an error reply.
    ///
    /// # Example
    /// ```
    /// use minikv::protocol::Reply;
    /// let err = Reply::error("Key not found");
    /// assert_eq!(err.to_string(), "ERROR: Key not found");
    /// ```
    pub fn error(s: impl Into<String>) -> Self {
        Reply::Error(s.into())
    }

    /// Creates an integer reply.
    pub fn integer(n: i64) -> Self {
        Reply::Status(n.to_string())
    }

    /// Creates a reply holding a value in double quotes.
    pub fn quoted(value: &str) -> Self {
        Reply::Status(format!("\"{}\"", value))
    }

    /// Creates a list reply numbered from 1.
    ///
    /// # Example
    /// ```
    /// use minikv::protocol::Reply;
    /// let list = Reply::numbered(["x", "y"]);
    /// assert_eq!(list, Reply::List(vec!["1) x".into(), "2) y".into()]));
    /// ```
    pub fn numbered<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        Reply::List(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| format!("{}) {}", i + 1, item))
                .collect(),
        )
    }

    /// Returns true if this reply is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Returns the single line of a `Status` reply.
    pub fn as_status(&self) -> Option<&str> {
        match self {
            Reply::Status(s) => Some(s),
            _ => None,
        }
    }

    /// Flattens the reply into display lines.
    pub fn lines(&self) -> Vec<String> {
        match self {
            Reply::Status(s) => vec![s.clone()],
            Reply::Error(s) => vec![format!("{}{}", ERROR_PREFIX, s)],
            Reply::List(items) => items.clone(),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Status(s) => write!(f, "{}", s),
            Reply::Error(s) => write!(f, "{}{}", ERROR_PREFIX, s),
            Reply::List(items) => write!(f, "{}", items.join("\n")),
        }
    }
}
