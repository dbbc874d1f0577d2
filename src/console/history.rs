//! Command History
//!
//! The console keeps an ordered log of everything it showed: each command as
//! typed, followed by one entry per reply line. A renderer only needs to walk
//! the log in order, prefixing command entries with `> `.

use crate::protocol::Reply;
use std::fmt;

/// What a log entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A command line as the user typed it
    Command,
    /// One line of a command's reply
    Result,
}

/// One line of the console log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub content: String,
    pub kind: EntryKind,
}

impl LogEntry {
    pub fn command(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: EntryKind::Command,
        }
    }

    pub fn result(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: EntryKind::Result,
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EntryKind::Command => write!(f, "> {}", self.content),
            EntryKind::Result => write!(f, "{}", self.content),
        }
    }
}

/// Ordered log of commands and their results.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<LogEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command and its reply lines.
    ///
    /// # Returns
    ///
    /// The entries that were just added.
    pub fn record(&mut self, command: &str, reply: &Reply) -> &[LogEntry] {
        let start = self.entries.len();

        self.entries.push(LogEntry::command(command));
        self.entries
            .extend(reply.lines().into_iter().map(LogEntry::result));

        &self.entries[start..]
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// The command lines only, oldest first.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::Command)
            .map(|e| e.content.as_str())
    }

    /// Every entry rendered as a display line.
    pub fn render(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
