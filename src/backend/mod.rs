//! Backend Capability Interfaces
//!
//! memtext does not store anything itself. Every cache operation is delegated
//! to a backend supplied by the embedding application, through three optional
//! capabilities:
//!
//! ```text
//!            ┌───────────────────┐
//!            │ ConnectionHandler │
//!            └─────────┬─────────┘
//!                      │ getter() / setter() / deleter()
//!                      ▼
//!            ┌───────────────────┐
//!            │  RequestHandler   │  (your backend)
//!            ├───────────────────┤
//!            │ Getter   get      │
//!            │ Setter   set      │
//!            │ Deleter  delete   │
//!            └───────────────────┘
//! ```
//!
//! A backend implements any subset. When a client issues a command whose
//! capability is missing, the connection answers `ERROR` and carries on.
//!
//! ## Example
//!
//! ```
//! use memtext::backend::{Getter, RequestHandler};
//! use memtext::protocol::Response;
//!
//! /// Answers every lookup with the key itself.
//! struct Echo;
//!
//! impl Getter for Echo {
//!     fn get(&self, key: &str) -> Option<Response> {
//!         Some(Response::value(key, 0, key.to_string()))
//!     }
//! }
//!
//! impl RequestHandler for Echo {
//!     fn getter(&self) -> Option<&dyn Getter> {
//!         Some(self)
//!     }
//! }
//! ```

pub mod item;

pub use item::Item;

use crate::protocol::Response;
use thiserror::Error;

/// Failure outcomes a backend can report for a delete.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The key does not exist
    #[error("key not found")]
    NotFound,

    /// Any other backend failure
    #[error("backend error: {0}")]
    Other(String),
}

/// Retrieval capability.
pub trait Getter: Send + Sync {
    /// Looks up `key`.
    ///
    /// Returns the reply for a hit (normally [`Response::Value`]) or `None`
    /// for a miss. The connection writes the terminating `END` itself.
    fn get(&self, key: &str) -> Option<Response>;
}

/// Storage capability.
pub trait Setter: Send + Sync {
    /// Stores `item`.
    ///
    /// Returns the reply to send, or `None` for the default `STORED`. For
    /// `noreply` commands this runs on a detached blocking task and whatever
    /// it returns is discarded.
    fn set(&self, item: Item) -> Option<Response>;
}

/// Deletion capability.
pub trait Deleter: Send + Sync {
    /// Removes `key`. `Ok` is answered with `DELETED`, any error with
    /// `NOT_FOUND`.
    fn delete(&self, key: &str) -> Result<(), BackendError>;
}

/// A backend, advertising which capabilities it implements.
///
/// Every accessor defaults to `None`; override the ones you support,
/// usually by returning `Some(self)`.
pub trait RequestHandler: Send + Sync + 'static {
    fn getter(&self) -> Option<&dyn Getter> {
        None
    }

    fn setter(&self) -> Option<&dyn Setter> {
        None
    }

    fn deleter(&self) -> Option<&dyn Deleter> {
        None
    }
}
