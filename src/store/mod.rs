//! Keyed, time-expiring stores.
//!
//! [`Store`] is the contract shared by every backing medium. Two media ship
//! with pylon:
//!
//! | Store | Medium | Expiry |
//! |---|---|---|
//! | [`MemoryStore`] | process memory | enforced lazily on `get` |
//! | [`FileStore`]   | one JSON file per key | not enforced |
//!
//! `FileStore` keeps no in-process index, so it cannot know when an entry
//! was written. Callers that need expiry on disk must enforce it themselves
//! (for example by clearing the directory on a schedule).

mod entry;
mod file;
mod memory;

use std::time::Duration;

use crate::error::StoreError;

pub use entry::Entry;
pub use file::FileStore;
pub use memory::MemoryStore;

/// A keyed store with optional per-entry expiry, safe for concurrent use.
///
/// A `ttl` of [`Duration::ZERO`] stores the entry without expiry.
pub trait Store<V>: Send + Sync {
    /// Inserts or overwrites `key`. Fails only on a backing-medium fault.
    fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), StoreError>;

    /// Returns the live value for `key`.
    ///
    /// An expired entry reads as absent and is removed by the same call.
    /// Backing-medium faults read as absent too.
    fn get(&self, key: &str) -> Option<V>;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Removes every entry.
    fn clear(&self) -> Result<(), StoreError>;
}
