//! Command Line Parser
//!
//! A command line is a verb followed by whitespace-separated arguments:
//!
//! ```text
//! SADD colors red green   →  name: "SADD", args: ["colors", "red", "green"]
//! get  name               →  name: "get",  args: ["name"]
//! ```
//!
//! Tokens borrow from the input line; nothing is copied until a handler
//! decides to store a value. There is no quoting syntax: quotes are ordinary
//! characters here, and `SET` removes them itself with [`strip_quotes`].

use thiserror::Error;

/// Errors that can occur while parsing a command line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line is empty or only whitespace
    #[error("empty input")]
    EmptyInput,
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// A tokenized command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine<'a> {
    /// The first token, exactly as typed
    pub name: &'a str,
    /// Every token after the first
    pub args: Vec<&'a str>,
}

impl CommandLine<'_> {
    /// The verb in upper case, for case-insensitive matching.
    pub fn verb(&self) -> String {
        self.name.to_uppercase()
    }
}

/// Splits a command line into its verb and arguments.
///
/// # Example
///
/// ```
/// use minikv::protocol::parse_line;
///
/// let cmd = parse_line("  sadd s  x\ty ").unwrap();
/// assert_eq!(cmd.verb(), "SADD");
/// assert_eq!(cmd.args, vec!["s", "x", "y"]);
/// ```
pub fn parse_line(line: &str) -> ParseResult<CommandLine<'_>> {
    let mut tokens = line.split_whitespace();
    let name = tokens.next().ok_or(ParseError::EmptyInput)?;

    Ok(CommandLine {
        name,
        args: tokens.collect(),
    })
}

/// Removes every single and double quote character from `value`.
///
/// Quotes are dropped wherever they appear, not only at the ends.
///
/// ```
/// use minikv::protocol::strip_quotes;
/// assert_eq!(strip_quotes("\"it's\""), "its");
/// ```
pub fn strip_quotes(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, '\'' | '"')).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let cmd = parse_line("GET name").unwrap();
        assert_eq!(cmd.name, "GET");
        assert_eq!(cmd.args, vec!["name"]);
    }

    #[test]
    fn test_parse_no_args() {
        let cmd = parse_line("keys").unwrap();
        assert_eq!(cmd.verb(), "KEYS");
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn test_parse_collapses_whitespace() {
        let cmd = parse_line("\tSADD   s a \t b\r\n").unwrap();
        assert_eq!(cmd.args, vec!["s", "a", "b"]);
    }

    #[test]
    fn test_name_keeps_typed_case() {
        let cmd = parse_line("ExPiRe k 10").unwrap();
        assert_eq!(cmd.name, "ExPiRe");
        assert_eq!(cmd.verb(), "EXPIRE");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse_line(""), Err(ParseError::EmptyInput));
        assert_eq!(parse_line("   \t "), Err(ParseError::EmptyInput));
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"hello\""), "hello");
        assert_eq!(strip_quotes("'hello'"), "hello");
        assert_eq!(strip_quotes("he\"ll'o"), "hello");
        assert_eq!(strip_quotes("plain"), "plain");
        assert_eq!(strip_quotes("\"\""), "");
    }
}
