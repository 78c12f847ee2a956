//! Connection Module
//!
//! One async task per client. Each task owns its half of the socket and a
//! handle to the shared store; the only thing tasks ever wait on besides the
//! network is the store's lock.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (main.rs)                                │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ accept(), spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌──────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Decode frame │───>│ Execute cmd │───>│ Send reply  │     │
//! │  └──────────────┘    └─────────────┘    └─────────────┘     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use flintkv::connection::{handle_connection, ConnectionStats};
//! use flintkv::commands::CommandHandler;
//! use flintkv::storage::Store;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(Store::new());
//! let stats = Arc::new(ConnectionStats::new());
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! let handler = CommandHandler::new(Arc::clone(&storage));
//! tokio::spawn(handle_connection(stream, addr, handler, Arc::clone(&stats)));
//! ```

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
