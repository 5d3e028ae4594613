//! Command Line Parser
//!
//! This module turns one memcached command line (terminator already stripped)
//! into a typed [`Command`].
//!
//! ## Design Philosophy
//!
//! 1. **Exact keywords**: Commands are matched case-sensitively on their
//!    protocol keyword, nothing clever.
//! 2. **Strict storage lines**: A `set` line with the wrong number of fields
//!    or a garbled integer is rejected with a client error instead of being
//!    read as zero.
//! 3. **No I/O**: The parser only looks at the line. Reading the data block of
//!    a storage command is the connection handler's job, driven by
//!    [`StoreSpec::length`].

use bytes::Bytes;
use thiserror::Error;

/// Literal token that suppresses the reply to a storage command.
pub const NOREPLY: &[u8] = b"noreply";

/// Minimum length of a `set` line (`set k 0 0 1`).
const MIN_SET_LINE: usize = 11;

/// Minimum length of a `delete` line (`delete k`).
const MIN_DELETE_LINE: usize = 8;

/// Largest data block a storage command may declare (1 MiB, memcached's
/// default item size limit and the size of the connection's read buffer).
pub const MAX_VALUE_SIZE: usize = 1024 * 1024;

/// Errors that can occur while parsing a command line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line is not a command this server understands.
    /// Answered with `ERROR`.
    #[error("unknown command")]
    UnknownCommand,

    /// A storage command line that cannot be used.
    /// Answered with `CLIENT_ERROR bad command line format`.
    #[error("bad command line format: {0}")]
    BadCommandLine(String),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Metadata of a storage command, everything but the data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSpec {
    pub key: String,
    /// Opaque client tag, stored and returned untouched
    pub flags: u32,
    /// Expiry in seconds, relative or absolute (see `Item::set_expires`)
    pub exptime: i64,
    /// Length of the data block, excluding the trailing CRLF
    pub length: usize,
    pub noreply: bool,
}

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `get <key>`
    Lookup(String),
    /// `set <key> <flags> <exptime> <bytes> [noreply]`
    Store(StoreSpec),
    /// `delete <key>`
    Delete(String),
    /// `stats`
    Stats,
    /// `version`
    Version,
    /// `quit`
    Quit,
}

impl Command {
    /// Protocol keyword of this command, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Lookup(_) => "get",
            Command::Store(_) => "set",
            Command::Delete(_) => "delete",
            Command::Stats => "stats",
            Command::Version => "version",
            Command::Quit => "quit",
        }
    }
}

/// Parses a single command line.
///
/// # Example
///
/// ```
/// use memtext::protocol::{parse_command, Command};
///
/// let cmd = parse_command(b"get name").unwrap();
/// assert_eq!(cmd, Command::Lookup("name".to_string()));
/// ```
pub fn parse_command(line: &[u8]) -> ParseResult<Command> {
    if line.len() < 4 {
        return Err(ParseError::UnknownCommand);
    }

    if let Some(rest) = line.strip_prefix(b"get ") {
        let key = std::str::from_utf8(rest)
            .map_err(|_| ParseError::UnknownCommand)?
            .trim();
        return Ok(Command::Lookup(key.to_string()));
    }

    if line.starts_with(b"set ") {
        if line.len() < MIN_SET_LINE {
            return Err(ParseError::UnknownCommand);
        }
        return parse_storage_line(&line[4..]).map(Command::Store);
    }

    if line.starts_with(b"delete ") {
        if line.len() < MIN_DELETE_LINE {
            return Err(ParseError::UnknownCommand);
        }
        let key = std::str::from_utf8(&line[7..]).map_err(|_| ParseError::UnknownCommand)?;
        return Ok(Command::Delete(key.to_string()));
    }

    match line {
        b"stats" => Ok(Command::Stats),
        b"version" => Ok(Command::Version),
        b"quit" => Ok(Command::Quit),
        _ => Err(ParseError::UnknownCommand),
    }
}

/// Parses the arguments of a storage command: `<key> <flags> <exptime> <bytes> [noreply]`.
fn parse_storage_line(args: &[u8]) -> ParseResult<StoreSpec> {
    let fields: Vec<&[u8]> = args
        .split(|b| b.is_ascii_whitespace())
        .filter(|f| !f.is_empty())
        .collect();

    if fields.len() != 4 && fields.len() != 5 {
        return Err(ParseError::BadCommandLine(format!(
            "expected 4 or 5 fields, got {}",
            fields.len()
        )));
    }

    let key = std::str::from_utf8(fields[0])
        .map_err(|_| ParseError::BadCommandLine("key is not valid UTF-8".to_string()))?
        .to_string();

    let length: usize = parse_field(fields[3], "bytes")?;
    if length > MAX_VALUE_SIZE {
        return Err(ParseError::BadCommandLine(format!(
            "data block of {} bytes exceeds {}",
            length, MAX_VALUE_SIZE
        )));
    }

    Ok(StoreSpec {
        key,
        flags: parse_field(fields[1], "flags")?,
        exptime: parse_field(fields[2], "exptime")?,
        length,
        noreply: fields.get(4).is_some_and(|f| *f == NOREPLY),
    })
}

fn parse_field<T: std::str::FromStr>(field: &[u8], name: &str) -> ParseResult<T> {
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            ParseError::BadCommandLine(format!(
                "invalid {}: {}",
                name,
                String::from_utf8_lossy(field)
            ))
        })
}

/// Checks a data block read for `spec` and strips its terminator.
///
/// `block` must be exactly `spec.length + 2` bytes. Returns `None` when the
/// block does not end in CRLF, i.e. the client sent a different number of
/// bytes than it declared.
pub fn take_data_block(spec: &StoreSpec, mut block: Bytes) -> Option<Bytes> {
    if block.len() != spec.length + 2 || !block.ends_with(b"\r\n") {
        return None;
    }
    block.truncate(spec.length);
    Some(block)
}
