//! Sharded In-Memory Item Store
//!
//! This module implements [`MemoryStore`], a thread-safe map from keys to
//! [`Item`]s that implements every backend capability. It is what the
//! `memtext` binary serves, and a starting point for real backends.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Instead of one big lock, keys are spread over 64
//!    shards, each behind its own `RwLock`.
//! 2. **Lazy Expiry**: An expired item is dropped when a lookup finds it.
//! 3. **Active Expiry**: [`MemoryStore::purge_expired`] removes expired items
//!    nobody asks for; the [`ExpirySweeper`](super::ExpirySweeper) calls it
//!    periodically.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       MemoryStore                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::backend::{BackendError, Deleter, Getter, Item, RequestHandler, Setter};
use crate::protocol::Response;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::SystemTime;

/// Number of shards for the store.
/// More shards = less lock contention, but more memory overhead.
const NUM_SHARDS: usize = 64;

type Shard = RwLock<HashMap<String, Item>>;

/// The reference backend.
///
/// # Thread Safety
///
/// Wrap it in an `Arc` and share it between the server and the sweeper.
/// All operations are thread-safe.
///
/// # Example
///
/// ```
/// use memtext::backend::Item;
/// use memtext::storage::MemoryStore;
///
/// let store = MemoryStore::new();
/// store.insert(Item::new("name", 0, "Ariz"));
///
/// let item = store.get_item("name").unwrap();
/// assert_eq!(item.value, "Ariz");
/// ```
pub struct MemoryStore {
    /// Sharded storage for reduced lock contention
    shards: Vec<Shard>,

    /// Statistics: total number of items (approximate)
    item_count: AtomicU64,

    /// Statistics: number of expired items cleaned up
    expired_count: AtomicU64,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("shards", &self.shards.len())
            .field("item_count", &self.item_count.load(Ordering::Relaxed))
            .field("expired_count", &self.expired_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| RwLock::new(HashMap::new())).collect();

        Self {
            shards,
            item_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard(&self, key: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    /// Stores `item`, replacing any previous item with the same key.
    ///
    /// Returns `true` if the key was new.
    pub fn insert(&self, item: Item) -> bool {
        let mut data = self.shard(&item.key).write().unwrap();

        let is_new = data.insert(item.key.clone(), item).is_none();
        if is_new {
            self.item_count.fetch_add(1, Ordering::Relaxed);
        }

        is_new
    }

    /// Gets a copy of the item stored under `key`.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    /// Expired items are removed on the way out.
    pub fn get_item(&self, key: &str) -> Option<Item> {
        let shard = self.shard(key);

        // First, try a read lock (fast path for live items)
        {
            let data = shard.read().unwrap();
            match data.get(key) {
                Some(item) if !item.is_expired() => return Some(item.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Item exists but is expired - need write lock to remove it
        let mut data = shard.write().unwrap();
        if let Some(item) = data.get(key) {
            if item.is_expired() {
                data.remove(key);
                self.item_count.fetch_sub(1, Ordering::Relaxed);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            // Race: another thread may have replaced the item
            return Some(item.clone());
        }

        None
    }

    /// Removes the item stored under `key`.
    ///
    /// Returns `true` if a live item was removed.
    pub fn remove(&self, key: &str) -> bool {
        let mut data = self.shard(key).write().unwrap();

        match data.remove(key) {
            Some(item) => {
                self.item_count.fetch_sub(1, Ordering::Relaxed);
                if item.is_expired() {
                    self.expired_count.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
                true
            }
            None => false,
        }
    }

    /// Removes every expired item.
    ///
    /// Returns the number of items removed.
    pub fn purge_expired(&self) -> u64 {
        let now = SystemTime::now();
        let mut purged = 0;

        for shard in &self.shards {
            let mut data = shard.write().unwrap();
            let before = data.len();
            data.retain(|_, item| !item.is_expired_at(now));
            purged += (before - data.len()) as u64;
        }

        if purged > 0 {
            self.item_count.fetch_sub(purged, Ordering::Relaxed);
            self.expired_count.fetch_add(purged, Ordering::Relaxed);
        }

        purged
    }

    /// Number of items held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.item_count.load(Ordering::Relaxed) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of expired items removed so far.
    pub fn expired_count(&self) -> u64 {
        self.expired_count.load(Ordering::Relaxed)
    }
}

impl Getter for MemoryStore {
    fn get(&self, key: &str) -> Option<Response> {
        self.get_item(key)
            .map(|item| Response::value(item.key, item.flags, item.value))
    }
}

impl Setter for MemoryStore {
    fn set(&self, item: Item) -> Option<Response> {
        self.insert(item);
        None
    }
}

impl Deleter for MemoryStore {
    fn delete(&self, key: &str) -> Result<(), BackendError> {
        if self.remove(key) {
            Ok(())
        } else {
            Err(BackendError::NotFound)
        }
    }
}

impl RequestHandler for MemoryStore {
    fn getter(&self) -> Option<&dyn Getter> {
        Some(self)
    }

    fn setter(&self) -> Option<&dyn Setter> {
        Some(self)
    }

    fn deleter(&self) -> Option<&dyn Deleter> {
        Some(self)
    }
}
