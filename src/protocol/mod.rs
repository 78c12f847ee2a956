//! RESP Protocol Implementation
//!
//! Requests arrive as arrays of bulk strings and are decoded one frame at a
//! time from a buffered stream. Replies are built as [`RespValue`]s and
//! serialized straight onto the socket.
//!
//! ## Modules
//!
//! - `decoder`: Reads one request frame into a [`Command`]
//! - `types`: Defines [`RespValue`] and its wire encoding
//!
//! ## Example
//!
//! ```
//! use flintkv::protocol::{read_command, RespValue};
//! use bytes::Bytes;
//!
//! # tokio_test::block_on(async {
//! let mut input: &[u8] = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let command = read_command(&mut input).await.unwrap();
//! assert_eq!(command.args(), &[Bytes::from("name")]);
//!
//! let reply = RespValue::bulk_string(Bytes::from("Ariz"));
//! assert_eq!(reply.serialize(), b"$4\r\nAriz\r\n");
//! # });
//! ```

pub mod decoder;
pub mod types;

pub use decoder::{read_command, Command, DecodeError, DecodeResult};
pub use types::RespValue;
