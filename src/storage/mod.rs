//! Storage Module
//!
//! The concurrency-safe store shared by every connection: scalar values with
//! optional millisecond expiry, and ordered lists.
//!
//! ## Features
//!
//! - **Single RwLock**: Concurrent readers, exclusive writers, one lock for both namespaces
//! - **Lazy Expiry**: Stale values are removed when a read observes them
//! - **Self-Cleaning Lists**: A list that is drained to zero elements is deleted
//!
//! ## Example
//!
//! ```
//! use flintkv::storage::Store;
//! use bytes::Bytes;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let store = Arc::new(Store::new());
//!
//! store.set_with_ttl(
//!     Bytes::from("session"),
//!     Bytes::from("token123"),
//!     Duration::from_secs(3600),
//! );
//! assert_eq!(store.get(b"session"), Some(Bytes::from("token123")));
//!
//! store.lpush(Bytes::from("jobs"), vec![Bytes::from("a"), Bytes::from("b")]);
//! assert_eq!(store.lpop(b"jobs"), Some(Bytes::from("b")));
//! ```

pub mod store;

pub use store::{unix_millis, Entry, Store};
