//! Memcached Response Types
//!
//! This module defines the replies a memcached text-protocol server can send.
//! Every reply is one or more ASCII lines from a small fixed vocabulary.
//!
//! ## Protocol Format
//!
//! All lines are terminated with CRLF (`\r\n`):
//! - `STORED`, `NOT_STORED`, `EXISTS` for storage commands
//! - `DELETED`, `NOT_FOUND` for delete
//! - `VALUE <key> <flags> <bytes>` followed by the data block for hits
//! - `END` terminates a retrieval or stats reply
//! - `STAT <name> <value>` for each statistic
//! - `ERROR`, `CLIENT_ERROR <msg>`, `SERVER_ERROR <msg>` for failures
//!
//! ## Examples
//!
//! Hit: `VALUE name 0 4\r\nAriz\r\nEND\r\n`
//! Miss: `END\r\n`
//! Bad payload: `CLIENT_ERROR bad chunk data\r\n`

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used in the text protocol
pub const CRLF: &[u8] = b"\r\n";

/// Fixed status lines of the protocol, terminator included.
pub mod status {
    pub const END: &[u8] = b"END\r\n";
    pub const ERROR: &[u8] = b"ERROR\r\n";
    pub const STORED: &[u8] = b"STORED\r\n";
    pub const NOT_STORED: &[u8] = b"NOT_STORED\r\n";
    pub const EXISTS: &[u8] = b"EXISTS\r\n";
    pub const NOT_FOUND: &[u8] = b"NOT_FOUND\r\n";
    pub const DELETED: &[u8] = b"DELETED\r\n";
}

/// Message sent with `CLIENT_ERROR` when a data block is malformed.
pub const BAD_CHUNK_DATA: &str = "bad chunk data";

/// Message sent with `CLIENT_ERROR` when a storage command line is malformed.
pub const BAD_COMMAND_LINE: &str = "bad command line format";

/// A reply to a single client command.
///
/// Backends build these (usually `Value`, or one of the storage statuses)
/// and the connection handler serializes them onto the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The item was stored.
    /// Format: `STORED\r\n`
    Stored,

    /// The item was not stored because a condition was not met.
    /// Format: `NOT_STORED\r\n`
    NotStored,

    /// The item was modified since it was last fetched.
    /// Format: `EXISTS\r\n`
    Exists,

    /// The item was deleted.
    /// Format: `DELETED\r\n`
    Deleted,

    /// The item does not exist.
    /// Format: `NOT_FOUND\r\n`
    NotFound,

    /// Terminates a retrieval or stats reply.
    /// Format: `END\r\n`
    End,

    /// Unknown or unsupported command.
    /// Format: `ERROR\r\n`
    Error,

    /// The client sent something that violates the protocol.
    /// Format: `CLIENT_ERROR <message>\r\n`
    ClientError(String),

    /// The server failed to carry out the command.
    /// Format: `SERVER_ERROR <message>\r\n` (or `SERVER_ERROR\r\n` without one)
    ServerError(String),

    /// A retrieved item.
    /// Format: `VALUE <key> <flags> <bytes>\r\n<data>\r\n`
    Value { key: String, flags: u32, data: Bytes },

    /// A single statistic.
    /// Format: `STAT <name> <value>\r\n`
    Stat { name: String, value: String },

    /// The server version.
    /// Format: `VERSION <version>\r\n`
    Version(String),
}

impl Response {
    /// Creates a value response for a hit.
    ///
    /// # Example
    /// ```
    /// use memtext::protocol::Response;
    /// let hit = Response::value("name", 0, "Ariz");
    /// assert_eq!(hit.serialize(), b"VALUE name 0 4\r\nAriz\r\n");
    /// ```
    pub fn value(key: impl Into<String>, flags: u32, data: impl Into<Bytes>) -> Self {
        Response::Value {
            key: key.into(),
            flags,
            data: data.into(),
        }
    }

    /// Creates a client error response.
    pub fn client_error(message: impl Into<String>) -> Self {
        Response::ClientError(message.into())
    }

    /// Creates a server error response.
    pub fn server_error(message: impl Into<String>) -> Self {
        Response::ServerError(message.into())
    }

    /// Creates a stat line.
    pub fn stat(name: impl Into<String>, value: impl ToString) -> Self {
        Response::Stat {
            name: name.into(),
            value: value.to_string(),
        }
    }

    /// Serializes the response to bytes for sending over the wire.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the response into an existing buffer.
    ///
    /// This is more efficient than `serialize()` when you want to reuse a buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Response::Stored => buf.extend_from_slice(status::STORED),
            Response::NotStored => buf.extend_from_slice(status::NOT_STORED),
            Response::Exists => buf.extend_from_slice(status::EXISTS),
            Response::Deleted => buf.extend_from_slice(status::DELETED),
            Response::NotFound => buf.extend_from_slice(status::NOT_FOUND),
            Response::End => buf.extend_from_slice(status::END),
            Response::Error => buf.extend_from_slice(status::ERROR),
            Response::ClientError(message) => {
                buf.extend_from_slice(b"CLIENT_ERROR ");
                buf.extend_from_slice(message.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Response::ServerError(message) => {
                buf.extend_from_slice(b"SERVER_ERROR");
                if !message.is_empty() {
                    buf.push(b' ');
                    buf.extend_from_slice(message.as_bytes());
                }
                buf.extend_from_slice(CRLF);
            }
            Response::Value { key, flags, data } => {
                buf.extend_from_slice(b"VALUE ");
                buf.extend_from_slice(key.as_bytes());
                buf.push(b' ');
                buf.extend_from_slice(flags.to_string().as_bytes());
                buf.push(b' ');
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            Response::Stat { name, value } => {
                buf.extend_from_slice(b"STAT ");
                buf.extend_from_slice(name.as_bytes());
                buf.push(b' ');
                buf.extend_from_slice(value.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Response::Version(version) => {
                buf.extend_from_slice(b"VERSION ");
                buf.extend_from_slice(version.as_bytes());
                buf.extend_from_slice(CRLF);
            }
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Stored => write!(f, "STORED"),
            Response::NotStored => write!(f, "NOT_STORED"),
            Response::Exists => write!(f, "EXISTS"),
            Response::Deleted => write!(f, "DELETED"),
            Response::NotFound => write!(f, "NOT_FOUND"),
            Response::End => write!(f, "END"),
            Response::Error => write!(f, "ERROR"),
            Response::ClientError(m) => write!(f, "CLIENT_ERROR {}", m),
            Response::ServerError(m) => write!(f, "SERVER_ERROR {}", m),
            Response::Value { key, flags, data } => {
                write!(f, "VALUE {} {} ({} bytes)", key, flags, data.len())
            }
            Response::Stat { name, value } => write!(f, "STAT {} {}", name, value),
            Response::Version(v) => write!(f, "VERSION {}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialize() {
        assert_eq!(Response::Stored.serialize(), b"STORED\r\n");
        assert_eq!(Response::NotStored.serialize(), b"NOT_STORED\r\n");
        assert_eq!(Response::Exists.serialize(), b"EXISTS\r\n");
        assert_eq!(Response::Deleted.serialize(), b"DELETED\r\n");
        assert_eq!(Response::NotFound.serialize(), b"NOT_FOUND\r\n");
        assert_eq!(Response::End.serialize(), b"END\r\n");
        assert_eq!(Response::Error.serialize(), b"ERROR\r\n");
    }

    #[test]
    fn test_client_error_serialize() {
        let value = Response::client_error(BAD_CHUNK_DATA);
        assert_eq!(value.serialize(), b"CLIENT_ERROR bad chunk data\r\n");
    }

    #[test]
    fn test_server_error_serialize() {
        assert_eq!(
            Response::server_error("out of memory").serialize(),
            b"SERVER_ERROR out of memory\r\n"
        );
        assert_eq!(Response::server_error("").serialize(), b"SERVER_ERROR\r\n");
    }

    #[test]
    fn test_value_serialize() {
        let value = Response::value("greeting", 42, Bytes::from("hello"));
        assert_eq!(value.serialize(), b"VALUE greeting 42 5\r\nhello\r\n");
    }

    #[test]
    fn test_value_binary_safe() {
        let value = Response::value("bin", 0, Bytes::from(&b"a\r\nb\x00"[..]));
        assert_eq!(value.serialize(), b"VALUE bin 0 5\r\na\r\nb\x00\r\n");
    }

    #[test]
    fn test_stat_and_version_serialize() {
        assert_eq!(
            Response::stat("cmd_get", 7).serialize(),
            b"STAT cmd_get 7\r\n"
        );
        assert_eq!(
            Response::Version("1.2.3".to_string()).serialize(),
            b"VERSION 1.2.3\r\n"
        );
    }

    #[test]
    fn test_serialize_into_appends() {
        let mut buf = Vec::new();
        Response::value("k", 1, "v").serialize_into(&mut buf);
        Response::End.serialize_into(&mut buf);
        assert_eq!(buf, b"VALUE k 1 1\r\nv\r\nEND\r\n");
    }
}
