//! Reference Storage Backend
//!
//! memtext leaves storage to the embedding application. This module ships
//! one backend anyway: a sharded, thread-safe in-memory item store with
//! expiry, used by the `memtext` binary and the tests.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      MemoryStore                            │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use memtext::backend::{Item, RequestHandler};
//! use memtext::storage::MemoryStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//!
//! // Capabilities are what the connection handler calls
//! let setter = store.setter().unwrap();
//! setter.set(Item::new("name", 0, "Ariz"));
//!
//! assert!(store.get_item("name").is_some());
//! ```

pub mod engine;
pub mod expiry;

// Re-export commonly used types
pub use engine::MemoryStore;
pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper};
