//! Command Handler Module
//!
//! This module implements every minikv command.
//! It tokenizes a raw command line and dispatches it to the matching handler.
//!
//! ## Supported Commands
//!
//! ### Scalar Commands
//! - `GET key` - Get a key's value, in double quotes
//! - `SET key value` - Set a key; quotes in `value` are removed
//!
//! ### Set Commands
//! - `SADD key member [member ...]` - Add members, creating the set if needed
//! - `SREM key member [member ...]` - Remove members
//! - `SMEMBERS key` - List members, numbered from 1
//!
//! ### Key Commands
//! - `KEYS` - List every key, numbered from 1
//! - `DEL key` - Delete a key and cancel its TTL
//! - `EXPIRE key seconds` - Delete the key after `seconds`
//! - `TTL key` - Seconds left before the key expires
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ parse_line()│───>│  dispatch() │───>│   cmd_*()   │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │                                          │         │        │
//! │                                          ▼         ▼        │
//! │                              StorageEngine   ExpiryRegistry │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Handlers never panic on bad input: every failure comes back as
//! [`Reply::Error`].

use crate::protocol::{parse_line, strip_quotes, Reply};
use crate::storage::{ExpiryRegistry, StorageEngine, StoreError};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Handles command lines by dispatching them to the appropriate handlers.
#[derive(Clone)]
pub struct CommandHandler {
    /// The storage engine
    storage: Arc<StorageEngine>,
    /// TTL bookkeeping; also the path for deletes
    expiry: Arc<ExpiryRegistry>,
}

impl CommandHandler {
    /// Creates a command handler over the registry and the storage engine it
    /// manages.
    pub fn new(expiry: Arc<ExpiryRegistry>) -> Self {
        Self {
            storage: Arc::clone(expiry.storage()),
            expiry,
        }
    }

    /// The storage engine commands run against.
    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// The expiry registry commands run against.
    pub fn expiry(&self) -> &Arc<ExpiryRegistry> {
        &self.expiry
    }

    /// Processes one command line and returns the reply.
    ///
    /// # Example
    ///
    /// ```
    /// use minikv::commands::CommandHandler;
    /// use minikv::protocol::Reply;
    /// use minikv::storage::{ExpiryRegistry, StorageEngine};
    /// use std::sync::Arc;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let storage = Arc::new(StorageEngine::new());
    /// let handler = CommandHandler::new(ExpiryRegistry::new(
    ///     storage,
    ///     tokio::runtime::Handle::current(),
    /// ));
    ///
    /// assert_eq!(handler.process("SET a 1"), Reply::ok());
    /// assert_eq!(handler.process("GET a").to_string(), "\"1\"");
    /// # }
    /// ```
    pub fn process(&self, line: &str) -> Reply {
        let command = match parse_line(line) {
            Ok(command) => command,
            Err(_) => return Reply::error("Invalid command ''"),
        };

        let reply = self.dispatch(&command.verb(), command.name, &command.args);

        if reply.is_error() {
            debug!(command = command.name, reply = %reply, "Command failed");
        } else {
            trace!(command = command.name, args = command.args.len(), "Command executed");
        }

        reply
    }

    /// Dispatches a command to its handler.
    fn dispatch(&self, verb: &str, name: &str, args: &[&str]) -> Reply {
        match verb {
            // Scalar commands
            "GET" => self.cmd_get(args),
            "SET" => self.cmd_set(args),

            // Set commands
            "SADD" => self.cmd_sadd(args),
            "SREM" => self.cmd_srem(args),
            "SMEMBERS" => self.cmd_smembers(args),

            // Key commands
            "KEYS" => self.cmd_keys(args),
            "DEL" => self.cmd_del(args),
            "EXPIRE" => self.cmd_expire(args),
            "TTL" => self.cmd_ttl(args),

            // Unknown command
            _ => Reply::error(format!("Invalid command '{}'", name)),
        }
    }

    // ========================================================================
    // Helper functions
    // ========================================================================

    /// The reply for missing, extra, or unusable arguments.
    fn invalid_parameters(cmd: &str) -> Reply {
        Reply::error(format!("{} command: Invalid parameters", cmd))
    }

    /// Turns a storage error into a reply for `cmd`.
    fn failure(cmd: &str, err: StoreError) -> Reply {
        match err {
            StoreError::InvalidArgument(_) => Self::invalid_parameters(cmd),
            StoreError::Backend(_) => {
                warn!(command = cmd, error = %err, "Storage backend failure");
                Reply::error(format!("{} command: {}", cmd, err))
            }
            _ => Reply::error(format!("{} command: {}", cmd, err)),
        }
    }

    // ========================================================================
    // Scalar Commands
    // ========================================================================

    /// GET key
    fn cmd_get(&self, args: &[&str]) -> Reply {
        let [key] = args else {
            return Self::invalid_parameters("GET");
        };

        match self.storage.get(key) {
            Ok(value) => Reply::quoted(&value),
            Err(StoreError::NotFound(_)) => Reply::error("Key not found"),
            Err(e) => Self::failure("GET", e),
        }
    }

    /// SET key value
    fn cmd_set(&self, args: &[&str]) -> Reply {
        let [key, value] = args else {
            return Self::invalid_parameters("SET");
        };

        match self.storage.set(key, strip_quotes(value)) {
            Ok(()) => Reply::ok(),
            Err(e) => Self::failure("SET", e),
        }
    }

    // ========================================================================
    // Set Commands
    // ========================================================================

    /// SADD key member [member ...]
    fn cmd_sadd(&self, args: &[&str]) -> Reply {
        let [key, members @ ..] = args else {
            return Self::invalid_parameters("SADD");
        };
        if members.is_empty() {
            return Self::invalid_parameters("SADD");
        }

        match self.storage.sadd(key, members.iter().copied()) {
            Ok(_) => Reply::ok(),
            Err(e) => Self::failure("SADD", e),
        }
    }

    /// SREM key member [member ...]
    fn cmd_srem(&self, args: &[&str]) -> Reply {
        let [key, members @ ..] = args else {
            return Self::invalid_parameters("SREM");
        };
        if members.is_empty() {
            return Self::invalid_parameters("SREM");
        }

        match self.storage.srem(key, members.iter().copied()) {
            Ok(_) => Reply::ok(),
            Err(e) => Self::failure("SREM", e),
        }
    }

    /// SMEMBERS key
    fn cmd_smembers(&self, args: &[&str]) -> Reply {
        let [key] = args else {
            return Reply::error("SMEMBERS command: Invalid key");
        };

        match self.storage.smembers(key) {
            Ok(members) => Reply::numbered(members),
            Err(e) => Self::failure("SMEMBERS", e),
        }
    }

    // ========================================================================
    // Key Commands
    // ========================================================================

    /// KEYS
    fn cmd_keys(&self, args: &[&str]) -> Reply {
        if !args.is_empty() {
            return Self::invalid_parameters("KEYS");
        }

        let keys = self.storage.keys();
        if keys.is_empty() {
            return Reply::status("No keys in storage");
        }
        Reply::numbered(keys)
    }

    /// DEL key
    fn cmd_del(&self, args: &[&str]) -> Reply {
        let [key] = args else {
            return Self::invalid_parameters("DEL");
        };

        match self.expiry.remove_key(key) {
            Ok(()) => Reply::ok(),
            Err(e) => Self::failure("DEL", e),
        }
    }

    /// EXPIRE key seconds
    fn cmd_expire(&self, args: &[&str]) -> Reply {
        let [key, seconds] = args else {
            return Self::invalid_parameters("EXPIRE");
        };

        let seconds: i64 = match seconds.parse() {
            Ok(s) => s,
            Err(_) => return Self::invalid_parameters("EXPIRE"),
        };

        if seconds <= 0 {
            return Reply::error("EXPIRE command: [seconds] parameter must be positive");
        }

        match self.expiry.expire(key, seconds) {
            Ok(()) => Reply::ok(),
            Err(e) => Self::failure("EXPIRE", e),
        }
    }

    /// TTL key
    fn cmd_ttl(&self, args: &[&str]) -> Reply {
        let [key] = args else {
            return Reply::error("TTL command: 'key' parameter not valid");
        };

        match self.expiry.ttl(key) {
            Ok(secs) => Reply::integer(secs),
            Err(e) => Self::failure("TTL", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::runtime::Handle;

    fn create_handler() -> CommandHandler {
        let storage = Arc::new(StorageEngine::new());
        CommandHandler::new(ExpiryRegistry::new(storage, Handle::current()))
    }

    fn error_text(reply: &Reply) -> String {
        assert!(reply.is_error(), "expected an error, got {:?}", reply);
        reply.to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn test_walkthrough() {
        let handler = create_handler();

        assert_eq!(handler.process("SET a 1"), Reply::ok());
        assert_eq!(handler.process("GET a"), Reply::status("\"1\""));
        assert_eq!(handler.process("SADD s x y x"), Reply::ok());
        assert_eq!(
            handler.process("SMEMBERS s"),
            Reply::List(vec!["1) x".to_string(), "2) y".to_string()])
        );
        assert_eq!(handler.process("DEL a"), Reply::ok());
        assert_eq!(handler.process("GET a").to_string(), "ERROR: Key not found");
        assert_eq!(handler.process("EXPIRE s 1"), Reply::ok());

        let ttl = handler.process("TTL s");
        assert!(ttl == Reply::status("1") || ttl == Reply::status("0"));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(
            handler.process("SMEMBERS s").to_string(),
            "ERROR: SMEMBERS command: Key 's' not in storage"
        );
        assert_eq!(handler.process("GET s").to_string(), "ERROR: Key not found");
        assert_eq!(handler.process("KEYS"), Reply::status("No keys in storage"));
    }

    #[tokio::test]
    async fn test_set_get() {
        let handler = create_handler();

        assert_eq!(handler.process("SET key value"), Reply::ok());
        assert_eq!(handler.process("GET key").to_string(), "\"value\"");

        assert_eq!(handler.process("SET key other"), Reply::ok());
        assert_eq!(handler.process("GET key").to_string(), "\"other\"");
    }

    #[tokio::test]
    async fn test_set_strips_quotes() {
        let handler = create_handler();

        handler.process("SET a \"hello\"");
        handler.process("SET b 'it's'");
        handler.process("SET c mid\"dle");

        assert_eq!(handler.storage().get("a").unwrap(), "hello");
        assert_eq!(handler.storage().get("b").unwrap(), "its");
        assert_eq!(handler.storage().get("c").unwrap(), "middle");

        // Nothing left once quotes are gone
        assert_eq!(
            error_text(&handler.process("SET d \"\"")),
            "ERROR: SET command: Invalid parameters"
        );
        assert!(!handler.storage().exists("d"));
    }

    #[tokio::test]
    async fn test_verbs_are_case_insensitive() {
        let handler = create_handler();

        assert_eq!(handler.process("set k v"), Reply::ok());
        assert_eq!(handler.process("Get k").to_string(), "\"v\"");
        assert_eq!(handler.process("sAdD s m"), Reply::ok());
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let handler = create_handler();

        assert_eq!(
            error_text(&handler.process("FLUSHALL now")),
            "ERROR: Invalid command 'FLUSHALL'"
        );
        assert_eq!(error_text(&handler.process("hello")), "ERROR: Invalid command 'hello'");
        assert_eq!(error_text(&handler.process("   ")), "ERROR: Invalid command ''");
    }

    #[tokio::test]
    async fn test_arity_errors() {
        let handler = create_handler();

        let cases = [
            ("GET", "ERROR: GET command: Invalid parameters"),
            ("GET a b", "ERROR: GET command: Invalid parameters"),
            ("SET a", "ERROR: SET command: Invalid parameters"),
            ("SET a b c", "ERROR: SET command: Invalid parameters"),
            ("SADD", "ERROR: SADD command: Invalid parameters"),
            ("SADD s", "ERROR: SADD command: Invalid parameters"),
            ("SREM s", "ERROR: SREM command: Invalid parameters"),
            ("SMEMBERS", "ERROR: SMEMBERS command: Invalid key"),
            ("KEYS *", "ERROR: KEYS command: Invalid parameters"),
            ("DEL", "ERROR: DEL command: Invalid parameters"),
            ("EXPIRE a", "ERROR: EXPIRE command: Invalid parameters"),
            ("EXPIRE a soon", "ERROR: EXPIRE command: Invalid parameters"),
            ("TTL", "ERROR: TTL command: 'key' parameter not valid"),
        ];

        for (line, expected) in cases {
            assert_eq!(error_text(&handler.process(line)), expected, "line: {}", line);
        }
    }

    #[tokio::test]
    async fn test_sadd_srem_smembers() {
        let handler = create_handler();

        handler.process("SADD colors red green");
        handler.process("SADD colors blue red");
        assert_eq!(
            handler.process("SMEMBERS colors").lines(),
            vec!["1) blue", "2) green", "3) red"]
        );

        assert_eq!(handler.process("SREM colors green purple"), Reply::ok());
        assert_eq!(handler.process("SMEMBERS colors").lines(), vec!["1) blue", "2) red"]);

        // Removing non-members is fine
        assert_eq!(handler.process("SREM colors purple"), Reply::ok());

        assert_eq!(
            error_text(&handler.process("SREM nothing x")),
            "ERROR: SREM command: Key 'nothing' not in storage"
        );
    }

    #[tokio::test]
    async fn test_set_commands_on_scalar() {
        let handler = create_handler();
        handler.process("SET k v");

        assert_eq!(
            error_text(&handler.process("SADD k a")),
            "ERROR: SADD command: Key 'k' does not hold a set"
        );
        assert_eq!(
            error_text(&handler.process("SMEMBERS k")),
            "ERROR: SMEMBERS command: Key 'k' does not hold a set"
        );
        assert_eq!(handler.process("GET k").to_string(), "\"v\"");
    }

    #[tokio::test]
    async fn test_keys() {
        let handler = create_handler();

        assert_eq!(handler.process("keys"), Reply::status("No keys in storage"));

        handler.process("SET b 1");
        handler.process("SADD a x");
        assert_eq!(handler.process("KEYS").lines(), vec!["1) a", "2) b"]);
    }

    #[tokio::test]
    async fn test_del() {
        let handler = create_handler();

        handler.process("SET k v");
        assert_eq!(handler.process("DEL k"), Reply::ok());
        assert_eq!(
            error_text(&handler.process("DEL k")),
            "ERROR: DEL command: Key 'k' not in storage"
        );
    }

    #[tokio::test]
    async fn test_expire_and_ttl_errors() {
        let handler = create_handler();
        handler.process("SET k v");

        assert_eq!(
            error_text(&handler.process("EXPIRE k 0")),
            "ERROR: EXPIRE command: [seconds] parameter must be positive"
        );
        assert_eq!(
            error_text(&handler.process("EXPIRE k -5")),
            "ERROR: EXPIRE command: [seconds] parameter must be positive"
        );
        assert_eq!(
            error_text(&handler.process("EXPIRE nope 5")),
            "ERROR: EXPIRE command: Key 'nope' not in storage"
        );
        assert_eq!(
            error_text(&handler.process("TTL nope")),
            "ERROR: TTL command: Key 'nope' not in storage"
        );
        assert_eq!(
            error_text(&handler.process("TTL k")),
            "ERROR: TTL command: Key 'k' is not expiring"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reexpire_extends_lifetime() {
        let handler = create_handler();
        handler.process("SET k v");

        assert_eq!(handler.process("EXPIRE k 1"), Reply::ok());
        assert_eq!(handler.process("EXPIRE k 3"), Reply::ok());
        assert_eq!(handler.process("TTL k"), Reply::integer(3));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(handler.process("GET k").to_string(), "\"v\"");
        assert_eq!(handler.process("TTL k"), Reply::integer(2));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(handler.process("GET k").to_string(), "ERROR: Key not found");
    }

    #[tokio::test(start_paused = true)]
    async fn test_del_cancels_ttl() {
        let handler = create_handler();
        handler.process("SET k v");
        handler.process("EXPIRE k 1");

        assert_eq!(handler.process("DEL k"), Reply::ok());
        assert_eq!(handler.expiry().pending(), 0);

        handler.process("SET k fresh");
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(handler.process("GET k").to_string(), "\"fresh\"");
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_keeps_existing_ttl() {
        let handler = create_handler();
        handler.process("SET k v");
        handler.process("EXPIRE k 2");

        handler.process("SET k w");
        assert_eq!(handler.process("TTL k"), Reply::integer(2));

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(handler.process("GET k").to_string(), "ERROR: Key not found");
    }
}
