//! Connection Handler Module
//!
//! Each accepted client is served by its own async task running a
//! [`ConnectionHandler`]. The handler reads one command line, dispatches it
//! to the backend, writes and flushes the response, and repeats until the
//! client quits, hangs up or breaks the stream.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read line   │───>│ Parse cmd   │───>│ Call backend│     │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘     │
//! │                            │ set              │             │
//! │                            ▼                  ▼             │
//! │                    ┌─────────────┐    ┌─────────────┐       │
//! │                    │ Read block  │    │ Send + flush│       │
//! │                    └─────────────┘    └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use memtext::connection::handle_connection;
//! use memtext::stats::Stats;
//! use memtext::storage::MemoryStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let stats = Arc::new(Stats::new());
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, store.clone(), stats.clone()));
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler};
