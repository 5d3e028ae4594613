//! # memtext - A Framework for memcached Text-Protocol Servers
//!
//! memtext speaks the memcached ASCII protocol on the wire and leaves
//! storage to you. Implement one or more of the backend capability traits,
//! hand the result to a [`Server`], and every connected client gets the
//! protocol framing, error handling and statistics for free.
//!
//! ## Features
//!
//! - **Pluggable Backends**: `get`, `set` and `delete` are routed to the
//!   [`Getter`], [`Setter`] and [`Deleter`] capabilities of a
//!   [`RequestHandler`]. Anything it doesn't provide answers `ERROR`.
//! - **Binary-Safe Values**: Data blocks are read by length, never by line.
//! - **Statistics**: A shared registry of atomic counters backs `stats`.
//! - **Async I/O**: Built on Tokio, one task per connection.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              memtext                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────────────────────┐  │
//! │  │   Server    │───>│ Connection  │───>│      RequestHandler         │  │
//! │  │ (Listener)  │    │  Handler    │    │  Getter / Setter / Deleter  │  │
//! │  └─────────────┘    └──────┬──────┘    └─────────────────────────────┘  │
//! │                            │                                            │
//! │              ┌─────────────┴─────────────┐                              │
//! │              ▼                           ▼                              │
//! │  ┌─────────────────────┐    ┌─────────────────────┐                     │
//! │  │  Command Parser &   │    │       Stats         │                     │
//! │  │  Response Encoder   │    │  (atomic counters)  │                     │
//! │  └─────────────────────┘    └─────────────────────┘                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use memtext::backend::{Getter, RequestHandler};
//! use memtext::protocol::Response;
//! use memtext::Server;
//! use std::sync::Arc;
//!
//! struct Greeter;
//!
//! impl Getter for Greeter {
//!     fn get(&self, key: &str) -> Option<Response> {
//!         Some(Response::value(key, 0, format!("hello, {}", key)))
//!     }
//! }
//!
//! impl RequestHandler for Greeter {
//!     fn getter(&self) -> Option<&dyn Getter> {
//!         Some(self)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     Server::new("127.0.0.1:11211", Arc::new(Greeter))
//!         .listen_and_serve()
//!         .await
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `get <key>`
//! - `set <key> <flags> <exptime> <bytes> [noreply]`
//! - `delete <key>`
//! - `stats`
//! - `version`
//! - `quit`
//!
//! ## Module Overview
//!
//! - [`protocol`]: Command parser, line reader and response encoder
//! - [`backend`]: Capability traits and the [`Item`] type
//! - [`connection`]: Per-client read/dispatch/respond loop
//! - [`server`]: TCP listener
//! - [`stats`]: Server-wide counters
//! - [`storage`]: An in-memory reference backend with expiry

pub mod backend;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod stats;
pub mod storage;

// Re-export commonly used types for convenience
pub use backend::{BackendError, Deleter, Getter, Item, RequestHandler, Setter};
pub use connection::{handle_connection, ConnectionError};
pub use protocol::{parse_command, Command, ParseError, Response};
pub use server::Server;
pub use stats::{Counter, Stats};
pub use storage::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper, MemoryStore};

/// The default port (same as memcached)
pub const DEFAULT_PORT: u16 = 11211;

/// The default host to bind to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// The address used when a server is given an empty one
pub const DEFAULT_ADDR: &str = "0.0.0.0:11211";

/// Version of memtext, reported by the `version` and `stats` commands
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
