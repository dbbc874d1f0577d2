//! Console Session
//!
//! This module drives one interactive session: it reads command lines from
//! any async reader, runs them through the command handler, records them in
//! the [`History`], and writes the rendered entries back out.
//!
//! ## Session Lifecycle
//!
//! ```text
//! 1. Session created over (reader, writer)
//!        │
//!        ▼
//! 2. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes into buffer  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Split off complete line │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Process + record        │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Write rendered entries  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 3. EOF or QUIT: session returns its History
//! ```
//!
//! ## Buffer Management
//!
//! Input is accumulated in a `BytesMut`. A read may deliver half a line or
//! several lines at once; only complete lines are split off. A final line
//! without a trailing newline is still processed at EOF.

use crate::commands::CommandHandler;
use crate::console::history::{EntryKind, History};
use bytes::BytesMut;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, error, info, trace};

/// Longest accepted command line (64 KB)
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Console-only commands that end the session.
const QUIT_COMMANDS: [&str; 2] = ["QUIT", "EXIT"];

/// Statistics for console sessions
#[derive(Debug, Default)]
pub struct ConsoleStats {
    /// Command lines processed
    pub commands_processed: AtomicU64,
    /// Commands that produced an error reply
    pub command_errors: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConsoleStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn command_processed(&self, failed: bool) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.command_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Errors that end a console session.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// Reading input or writing output failed
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A line grew past the buffer limit without a newline
    #[error("Line longer than {limit} bytes")]
    LineTooLong { limit: usize },
}

/// One interactive session over a reader/writer pair.
pub struct ConsoleSession<R, W> {
    /// Where command lines come from
    reader: R,

    /// Where rendered entries go
    writer: BufWriter<W>,

    /// Bytes read but not yet split into lines
    buffer: BytesMut,

    /// The command handler (shared with other sessions, if any)
    command_handler: CommandHandler,

    /// Everything shown so far
    history: History,

    /// Whether command lines are written back with a `> ` prefix
    echo: bool,

    /// Console statistics (shared)
    stats: Arc<ConsoleStats>,
}

impl<R, W> ConsoleSession<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a new session. Command echo is on by default.
    pub fn new(
        reader: R,
        writer: W,
        command_handler: CommandHandler,
        stats: Arc<ConsoleStats>,
    ) -> Self {
        Self {
            reader,
            writer: BufWriter::new(writer),
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            history: History::new(),
            echo: true,
            stats,
        }
    }

    /// Turns the `> command` echo lines on or off.
    ///
    /// The history records commands either way.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// The log recorded so far.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Runs the session until EOF or a quit command.
    ///
    /// # Returns
    ///
    /// The full history of the session.
    pub async fn run(mut self) -> Result<History, ConsoleError> {
        info!("Console session started");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(
                commands = self.history.commands().count(),
                "Console session ended"
            ),
            Err(e) => error!(error = %e, "Console session failed"),
        }

        result.map(|()| self.history)
    }

    /// The read-process-write loop.
    async fn main_loop(&mut self) -> Result<(), ConsoleError> {
        loop {
            while let Some(line) = self.try_take_line() {
                if !self.handle_line(&line).await? {
                    return Ok(());
                }
            }

            if !self.read_more_data().await? {
                // EOF: whatever is left is the last line
                if !self.buffer.is_empty() {
                    let rest = self.buffer.split();
                    let line = String::from_utf8_lossy(&rest).into_owned();
                    self.handle_line(&line).await?;
                }
                return Ok(());
            }
        }
    }

    /// Splits one complete line off the front of the buffer.
    fn try_take_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let line = self.buffer.split_to(end + 1);

        trace!(bytes = line.len(), remaining = self.buffer.len(), "Split line");
        Some(String::from_utf8_lossy(&line[..end]).into_owned())
    }

    /// Reads more input into the buffer. Returns `false` at EOF.
    async fn read_more_data(&mut self) -> Result<bool, ConsoleError> {
        if self.buffer.len() >= MAX_LINE_LENGTH {
            error!(size = self.buffer.len(), "Line length limit exceeded");
            return Err(ConsoleError::LineTooLong {
                limit: MAX_LINE_LENGTH,
            });
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.reader.read_buf(&mut self.buffer).await?;
        if n == 0 {
            return Ok(false);
        }

        self.stats.bytes_read(n);
        trace!(bytes = n, "Read input");
        Ok(true)
    }

    /// Processes one line. Returns `false` if the session should stop.
    async fn handle_line(&mut self, line: &str) -> Result<bool, ConsoleError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(true);
        }

        if QUIT_COMMANDS.iter().any(|q| line.eq_ignore_ascii_case(q)) {
            debug!("Quit requested");
            return Ok(false);
        }

        let reply = self.command_handler.process(line);
        self.stats.command_processed(reply.is_error());

        let mut out = String::new();
        for entry in self.history.record(line, &reply) {
            if entry.kind == EntryKind::Command && !self.echo {
                continue;
            }
            out.push_str(&entry.to_string());
            out.push('\n');
        }

        self.writer.write_all(out.as_bytes()).await?;
        self.writer.flush().await?;
        self.stats.bytes_written(out.len());

        Ok(true)
    }
}

/// Runs a console session to completion.
///
/// This is a convenience function that creates a [`ConsoleSession`] and runs
/// it.
pub async fn run_console<R, W>(
    reader: R,
    writer: W,
    command_handler: CommandHandler,
    stats: Arc<ConsoleStats>,
    echo: bool,
) -> Result<History, ConsoleError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    ConsoleSession::new(reader, writer, command_handler, stats)
        .with_echo(echo)
        .run()
        .await
}
