//! Command Execution Module
//!
//! Takes a decoded [`Command`](crate::protocol::Command), runs it against the
//! shared [`Store`](crate::storage::Store), and returns the reply.
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Frame Decoder  │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Validate     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │     Store       │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - Server: `PING`, `ECHO`
//! - Strings: `SET`, `GET`
//! - Lists: `RPUSH`, `LPUSH`, `LLEN`, `LRANGE`, `LPOP`

pub mod error;
pub mod handler;

pub use error::CommandError;
pub use handler::CommandHandler;
