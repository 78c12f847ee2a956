//! Command-level errors.
//!
//! These are reported to the client as error replies. The connection stays
//! open, and a command that fails never touches the store.

use crate::protocol::RespValue;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Argument count outside what the command accepts
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),

    /// A PX value, LPOP count, or LRANGE bound that is not a valid integer
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR empty command")]
    EmptyCommand,
}

impl From<CommandError> for RespValue {
    fn from(err: CommandError) -> Self {
        RespValue::error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_replies() {
        let reply: RespValue = CommandError::WrongArity("LPOP").into();
        assert_eq!(
            reply.serialize(),
            b"-ERR wrong number of arguments for 'LPOP' command\r\n"
        );

        let reply: RespValue = CommandError::UnknownCommand("FOO".to_string()).into();
        assert_eq!(reply.serialize(), b"-ERR unknown command 'FOO'\r\n");
    }
}
