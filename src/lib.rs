//! # FlintKV - A Small In-Memory Data-Structure Server
//!
//! FlintKV speaks the RESP request/response protocol and keeps two kinds of
//! data in memory: scalar values (optionally expiring) and ordered lists.
//! Any number of clients can connect at once; every command is atomic with
//! respect to the shared store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            FlintKV                              │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐          │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │          │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │          │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘          │
//! │                            │                  │                 │
//! │                            ▼                  ▼                 │
//! │                     ┌─────────────┐    ┌──────────────────────┐ │
//! │                     │   Frame     │    │        Store         │ │
//! │                     │   Decoder   │    │  RwLock { keys,      │ │
//! │                     └─────────────┘    │           lists }    │ │
//! │                                        └──────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use flintkv::commands::CommandHandler;
//! use flintkv::connection::{handle_connection, ConnectionStats};
//! use flintkv::storage::Store;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage = Arc::new(Store::new());
//!     let stats = Arc::new(ConnectionStats::new());
//!     let listener = TcpListener::bind("0.0.0.0:6379").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         let handler = CommandHandler::new(Arc::clone(&storage));
//!         tokio::spawn(handle_connection(stream, addr, handler, Arc::clone(&stats)));
//!     }
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `PING`
//! - `ECHO [message]`
//! - `SET key value [PX milliseconds]`
//! - `GET key`
//! - `RPUSH key value [value ...]` / `LPUSH key value [value ...]`
//! - `LLEN key`
//! - `LRANGE key start stop`
//! - `LPOP key [count]`
//!
//! ## Module Overview
//!
//! - [`protocol`]: Request frame decoder and reply encoding
//! - [`storage`]: The shared store with lazy expiry
//! - [`commands`]: Command dispatch and execution
//! - [`connection`]: Per-client connection loop
//!
//! ## Design Highlights
//!
//! ### One Lock, Whole Operations
//!
//! Scalars and lists live behind a single `RwLock`. Each store operation
//! holds it for its entire read-modify-write, so concurrent clients only ever
//! see whole commands applied.
//!
//! ### Lazy Expiry
//!
//! Expired values are not swept in the background. A `GET` that finds a
//! stale value removes it and answers nil.
//!
//! ### Decode Failures Are Terminal
//!
//! A malformed or truncated frame closes the connection. Command errors such
//! as a wrong argument count are ordinary replies.

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod storage;

pub use commands::{CommandError, CommandHandler};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{read_command, Command, DecodeError, RespValue};
pub use storage::Store;

/// The default port FlintKV listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host FlintKV binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Version of FlintKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
