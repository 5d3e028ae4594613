//! Memcached Text Protocol Implementation
//!
//! This module implements the wire side of the memcached ASCII protocol:
//! reading command lines and data blocks, parsing commands, and encoding
//! replies.
//!
//! ## Overview
//!
//! Clients send one CRLF-terminated command line per request. Storage
//! commands announce the size of a data block that follows the line:
//!
//! ```text
//! set <key> <flags> <exptime> <bytes> [noreply]\r\n
//! <data block>\r\n
//! ```
//!
//! ## Modules
//!
//! - `reader`: Buffered line and data block reader
//! - `parser`: Command line parser
//! - `types`: The `Response` vocabulary and its serialization
//!
//! ## Example
//!
//! ```
//! use memtext::protocol::{parse_command, Command, Response};
//!
//! let cmd = parse_command(b"set name 0 0 4").unwrap();
//! assert!(matches!(cmd, Command::Store(ref spec) if spec.length == 4));
//!
//! let reply = Response::value("name", 0, "Ariz");
//! assert_eq!(reply.serialize(), b"VALUE name 0 4\r\nAriz\r\n");
//! ```

pub mod parser;
pub mod reader;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_command, take_data_block, Command, ParseError, ParseResult, StoreSpec};
pub use reader::LineReader;
pub use types::Response;
