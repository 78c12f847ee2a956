//! Shared In-Memory Store
//!
//! Holds the two namespaces every connection operates on:
//!
//! - `keys`: scalar values with an optional expiry timestamp
//! - `lists`: ordered lists of values
//!
//! A key may exist in both at once. Commands for one type never look at the
//! other.
//!
//! ## Locking
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                    Store                      │
//! │  ┌─────────────────────────────────────────┐  │
//! │  │             RwLock<Inner>               │  │
//! │  │  keys:  HashMap<Bytes, Entry>           │  │
//! │  │  lists: HashMap<Bytes, VecDeque<Bytes>> │  │
//! │  └─────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Every public method takes the lock exactly once for its whole
//! read-modify-write, so no partial update is ever visible. The one exception
//! is [`Store::get`], which reads under the shared lock and only re-acquires
//! it exclusively when it has found a stale entry to remove.
//!
//! ## Invariants
//!
//! - A list key is present only while the list is non-empty.
//! - An entry whose expiry is in the past is never returned.

use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A scalar value with optional expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub value: Bytes,
    /// Expiry as a Unix timestamp in milliseconds. `None` or `Some(0)` never expires.
    pub expires_at: Option<u64>,
}

impl Entry {
    pub fn new(value: Bytes) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    /// Creates an entry that expires `ttl` from now.
    pub fn with_ttl(value: Bytes, ttl: Duration) -> Self {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        Self {
            value,
            expires_at: Some(unix_millis().saturating_add(ttl_ms)),
        }
    }

    /// An entry is stale once `now` is strictly past its expiry.
    #[inline]
    pub fn is_expired_at(&self, now: u64) -> bool {
        match self.expires_at {
            Some(at) if at > 0 => now > at,
            _ => false,
        }
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_millis())
    }
}

#[derive(Debug, Default)]
struct Inner {
    keys: HashMap<Bytes, Entry>,
    lists: HashMap<Bytes, VecDeque<Bytes>>,
}

/// The process-wide store, shared between connections behind an `Arc`.
///
/// # Example
///
/// ```
/// use flintkv::storage::Store;
/// use bytes::Bytes;
///
/// let store = Store::new();
///
/// store.set(Bytes::from("name"), Bytes::from("Ariz"));
/// assert_eq!(store.get(b"name"), Some(Bytes::from("Ariz")));
///
/// store.rpush(Bytes::from("queue"), vec![Bytes::from("a"), Bytes::from("b")]);
/// assert_eq!(store.lrange(b"queue", 0, -1), vec![Bytes::from("a"), Bytes::from("b")]);
/// ```
#[derive(Default)]
pub struct Store {
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("keys", &self.key_count())
            .field("lists", &self.list_count())
            .finish()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave either map half-updated,
    // so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Scalar operations
    // ========================================================================

    /// Sets a value without expiry, replacing any previous entry.
    pub fn set(&self, key: Bytes, value: Bytes) {
        self.write().keys.insert(key, Entry::new(value));
    }

    /// Sets a value that expires after `ttl`, replacing any previous entry.
    pub fn set_with_ttl(&self, key: Bytes, value: Bytes, ttl: Duration) {
        self.write().keys.insert(key, Entry::with_ttl(value, ttl));
    }

    /// Gets the value for a key.
    ///
    /// A stale entry is removed and reported as absent. The removal happens
    /// under a second, exclusive acquisition, so the entry is checked again
    /// first: if another connection replaced it in between, the new value
    /// wins and is returned.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        {
            let inner = self.read();
            let entry = inner.keys.get(key)?;
            if !entry.is_expired() {
                return Some(entry.value.clone());
            }
        }

        let mut inner = self.write();
        let entry = inner.keys.get(key)?;
        if entry.is_expired() {
            inner.keys.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Number of scalar entries, including stale ones not yet removed.
    pub fn key_count(&self) -> usize {
        self.read().keys.len()
    }

    // ========================================================================
    // List operations
    // ========================================================================

    /// Appends values to the tail of a list, creating it if needed.
    ///
    /// # Returns
    /// The length of the list after the push.
    pub fn rpush(&self, key: Bytes, values: impl IntoIterator<Item = Bytes>) -> usize {
        let mut inner = self.write();
        let list = inner.lists.entry(key.clone()).or_default();
        list.extend(values);
        let len = list.len();

        // Pushing nothing onto a new key must not leave an empty list behind
        if len == 0 {
            inner.lists.remove(&key);
        }
        len
    }

    /// Pushes values onto the head of a list one at a time, creating it if
    /// needed. `LPUSH key a b c` leaves the list as `c, b, a`.
    ///
    /// # Returns
    /// The length of the list after the push.
    pub fn lpush(&self, key: Bytes, values: impl IntoIterator<Item = Bytes>) -> usize {
        let mut inner = self.write();
        let list = inner.lists.entry(key.clone()).or_default();
        for value in values {
            list.push_front(value);
        }
        let len = list.len();

        if len == 0 {
            inner.lists.remove(&key);
        }
        len
    }

    /// Removes and returns the head of a list.
    ///
    /// Deletes the key when the list becomes empty.
    pub fn lpop(&self, key: &[u8]) -> Option<Bytes> {
        let mut inner = self.write();
        let list = inner.lists.get_mut(key)?;
        let value = list.pop_front();

        if list.is_empty() {
            inner.lists.remove(key);
        }
        value
    }

    /// Removes and returns up to `count` elements from the head of a list.
    ///
    /// Returns an empty vector for a missing list. Deletes the key when the
    /// list becomes empty.
    pub fn lpop_count(&self, key: &[u8], count: usize) -> Vec<Bytes> {
        let mut inner = self.write();
        let Some(list) = inner.lists.get_mut(key) else {
            return Vec::new();
        };

        let take = count.min(list.len());
        let popped: Vec<Bytes> = list.drain(..take).collect();

        if list.is_empty() {
            inner.lists.remove(key);
        }
        popped
    }

    /// Returns the length of a list, or 0 if it does not exist.
    pub fn llen(&self, key: &[u8]) -> usize {
        self.read().lists.get(key).map_or(0, VecDeque::len)
    }

    /// Returns the elements between `start` and `stop`, both inclusive.
    ///
    /// Indices past the end are clamped and negative indices count from the
    /// end of the list. An out-of-range or inverted range is empty.
    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> Vec<Bytes> {
        let inner = self.read();
        let Some(list) = inner.lists.get(key) else {
            return Vec::new();
        };

        match resolve_range(list.len(), start, stop) {
            Some((from, to)) => list.range(from..=to).cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Number of lists currently stored.
    pub fn list_count(&self) -> usize {
        self.read().lists.len()
    }
}

/// Maps LRANGE bounds onto concrete inclusive positions in a list of `len`.
///
/// The order of the checks matters: a `start` at or past the end yields
/// nothing before negative indices are resolved, and `stop` is clamped to the
/// last element before it is resolved.
fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    if len == 0 || start >= len {
        return None;
    }

    let stop = stop.min(len - 1);
    let from_end = |index: i64| {
        if index < 0 {
            len.saturating_add(index).max(0)
        } else {
            index
        }
    };

    let (start, stop) = (from_end(start), from_end(stop));
    if start > stop {
        return None;
    }
    Some((start as usize, stop as usize))
}
