//! Command Handler Module
//!
//! Executes decoded commands against the [`Store`] and builds the reply.
//!
//! ## Supported Commands
//!
//! - `PING` - Test connection
//! - `ECHO [message]` - Echo message (empty if omitted)
//! - `SET key value [PX milliseconds]` - Set a value, optionally expiring
//! - `GET key` - Get a value
//! - `RPUSH key value [value ...]` - Append to a list
//! - `LPUSH key value [value ...]` - Prepend to a list, one value at a time
//! - `LLEN key` - Length of a list
//! - `LRANGE key start stop` - Inclusive slice of a list
//! - `LPOP key [count]` - Remove from the head of a list
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │  execute()  │───>│  dispatch() │───>│   cmd_*()   │     │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                             Store           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each `cmd_*` checks its argument count and parses its integers before it
//! touches the store, so a [`CommandError`] never leaves a partial mutation.

use crate::commands::error::CommandError;
use crate::protocol::{Command, RespValue};
use crate::storage::Store;
use bytes::Bytes;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

type CommandResult = Result<RespValue, CommandError>;

/// Executes commands against a shared store.
///
/// Cheap to clone: every connection gets its own handle to the same store.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    storage: Arc<Store>,
}

impl CommandHandler {
    pub fn new(storage: Arc<Store>) -> Self {
        Self { storage }
    }

    /// Executes a command and returns the reply.
    ///
    /// Command-level failures come back as [`RespValue::Error`]; they are
    /// never fatal to the connection.
    pub fn execute(&self, command: &Command) -> RespValue {
        let Some(verb) = command.verb() else {
            return CommandError::EmptyCommand.into();
        };

        let name = String::from_utf8_lossy(verb);
        self.dispatch(&name.to_ascii_uppercase(), command.args())
            .unwrap_or_else(|| Err(CommandError::UnknownCommand(name.into_owned())))
            .unwrap_or_else(RespValue::from)
    }

    /// Routes an upper-cased verb to its handler. `None` means unknown.
    fn dispatch(&self, cmd: &str, args: &[Bytes]) -> Option<CommandResult> {
        let result = match cmd {
            "PING" => self.cmd_ping(args),
            "ECHO" => self.cmd_echo(args),

            "SET" => self.cmd_set(args),
            "GET" => self.cmd_get(args),

            "RPUSH" => self.cmd_rpush(args),
            "LPUSH" => self.cmd_lpush(args),
            "LLEN" => self.cmd_llen(args),
            "LRANGE" => self.cmd_lrange(args),
            "LPOP" => self.cmd_lpop(args),

            _ => return None,
        };
        Some(result)
    }

    // ========================================================================
    // Server Commands
    // ========================================================================

    /// PING
    ///
    /// Always `+PONG`; trailing arguments are ignored.
    fn cmd_ping(&self, _args: &[Bytes]) -> CommandResult {
        Ok(RespValue::pong())
    }

    /// ECHO [message]
    fn cmd_echo(&self, args: &[Bytes]) -> CommandResult {
        match args {
            [] => Ok(RespValue::bulk_string(Bytes::new())),
            [message] => Ok(RespValue::bulk_string(message.clone())),
            _ => Err(CommandError::WrongArity("ECHO")),
        }
    }

    // ========================================================================
    // String Commands
    // ========================================================================

    /// SET key value [PX milliseconds]
    ///
    /// An option other than `PX` is ignored and the value is stored without
    /// expiry.
    fn cmd_set(&self, args: &[Bytes]) -> CommandResult {
        let (key, value, ttl) = match args {
            [key, value] => (key, value, None),
            [key, value, option, ms] if option.eq_ignore_ascii_case(b"PX") => {
                let ms = parse_integer::<u64>(ms)?;
                (key, value, Some(Duration::from_millis(ms)))
            }
            [key, value, _, _] => (key, value, None),
            _ => return Err(CommandError::WrongArity("SET")),
        };

        match ttl {
            Some(ttl) => self.storage.set_with_ttl(key.clone(), value.clone(), ttl),
            None => self.storage.set(key.clone(), value.clone()),
        }
        Ok(RespValue::ok())
    }

    /// GET key
    fn cmd_get(&self, args: &[Bytes]) -> CommandResult {
        let [key] = args else {
            return Err(CommandError::WrongArity("GET"));
        };

        Ok(self
            .storage
            .get(key)
            .map_or_else(RespValue::null, RespValue::BulkString))
    }

    // ========================================================================
    // List Commands
    // ========================================================================

    /// RPUSH key value [value ...]
    fn cmd_rpush(&self, args: &[Bytes]) -> CommandResult {
        let [key, values @ ..] = args else {
            return Err(CommandError::WrongArity("RPUSH"));
        };
        if values.is_empty() {
            return Err(CommandError::WrongArity("RPUSH"));
        }

        let len = self.storage.rpush(key.clone(), values.iter().cloned());
        Ok(RespValue::integer(len as i64))
    }

    /// LPUSH key value [value ...]
    fn cmd_lpush(&self, args: &[Bytes]) -> CommandResult {
        let [key, values @ ..] = args else {
            return Err(CommandError::WrongArity("LPUSH"));
        };
        if values.is_empty() {
            return Err(CommandError::WrongArity("LPUSH"));
        }

        let len = self.storage.lpush(key.clone(), values.iter().cloned());
        Ok(RespValue::integer(len as i64))
    }

    /// LLEN key
    fn cmd_llen(&self, args: &[Bytes]) -> CommandResult {
        let [key] = args else {
            return Err(CommandError::WrongArity("LLEN"));
        };

        Ok(RespValue::integer(self.storage.llen(key) as i64))
    }

    /// LRANGE key start stop
    fn cmd_lrange(&self, args: &[Bytes]) -> CommandResult {
        let [key, start, stop] = args else {
            return Err(CommandError::WrongArity("LRANGE"));
        };
        let start = parse_integer::<i64>(start)?;
        let stop = parse_integer::<i64>(stop)?;

        Ok(RespValue::bulk_array(self.storage.lrange(key, start, stop)))
    }

    /// LPOP key [count]
    ///
    /// Without a count the reply is a single bulk string (nil when empty).
    /// With a count it is always an array, empty rather than nil.
    fn cmd_lpop(&self, args: &[Bytes]) -> CommandResult {
        match args {
            [key] => Ok(self
                .storage
                .lpop(key)
                .map_or_else(RespValue::null, RespValue::BulkString)),
            [key, count] => {
                let count = parse_integer::<usize>(count)?;
                Ok(RespValue::bulk_array(self.storage.lpop_count(key, count)))
            }
            _ => Err(CommandError::WrongArity("LPOP")),
        }
    }
}

/// Parses a decimal integer argument.
fn parse_integer<T: FromStr>(arg: &[u8]) -> Result<T, CommandError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(CommandError::NotAnInteger)
}
