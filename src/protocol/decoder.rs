//! Request Frame Decoder
//!
//! Turns the next frame on a buffered byte stream into a [`Command`].
//!
//! ## Frame Format
//!
//! ```text
//! *<argc>\r\n
//! $<len>\r\n<len bytes>\r\n      (repeated argc times)
//! ```
//!
//! ## Failure Model
//!
//! Every [`DecodeError`] is terminal for the connection. There is no resync:
//! once a frame is malformed or truncated, the position of the next frame on
//! the stream is unknown, so the caller closes the connection instead of
//! retrying. [`DecodeError::ConnectionClosed`] is the one expected outcome,
//! reported when the peer hangs up between frames.
//!
//! The decoder keeps no state between calls; everything it needs lives in the
//! reader's buffer.

use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Errors that can occur while decoding a request frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The stream ended cleanly before a new frame started
    #[error("connection closed")]
    ConnectionClosed,

    /// The stream ended in the middle of a frame
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// A line started with the wrong type byte
    #[error("unexpected type byte {found:#04x} (expected {expected:#04x})")]
    UnexpectedPrefix { expected: u8, found: u8 },

    /// A count or length was not a decimal integer
    #[error("invalid integer: {0:?}")]
    InvalidInteger(String),

    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// A line or bulk payload was not followed by CRLF
    #[error("missing CRLF terminator")]
    MissingCrlf,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// Returns true when the peer simply went away between frames.
    pub fn is_clean_close(&self) -> bool {
        matches!(self, DecodeError::ConnectionClosed)
    }
}

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// One decoded request: the verb followed by its arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    parts: Vec<Bytes>,
}

impl Command {
    pub fn new(parts: Vec<Bytes>) -> Self {
        Self { parts }
    }

    /// The first part, naming the operation.
    pub fn verb(&self) -> Option<&Bytes> {
        self.parts.first()
    }

    /// Everything after the verb.
    pub fn args(&self) -> &[Bytes] {
        self.parts.get(1..).unwrap_or(&[])
    }

    pub fn parts(&self) -> &[Bytes] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Encodes the command as a request frame that [`read_command`] accepts.
    ///
    /// # Example
    /// ```
    /// use flintkv::protocol::Command;
    /// let cmd: Command = ["GET", "name"].into_iter().collect();
    /// assert_eq!(cmd.encode(), b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n");
    /// ```
    pub fn encode(&self) -> Vec<u8> {
        RespValue::bulk_array(self.parts.iter().cloned()).serialize()
    }
}

impl<T: Into<Bytes>> FromIterator<T> for Command {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

/// Reads exactly one request frame from `reader`.
///
/// The reader is left positioned at the start of the following frame on
/// success. On error its position is unspecified.
pub async fn read_command<R>(reader: &mut R) -> DecodeResult<Command>
where
    R: AsyncBufRead + Unpin,
{
    let header = match read_line(reader).await? {
        Some(line) => line,
        None => return Err(DecodeError::ConnectionClosed),
    };

    let count = parse_prefixed(&header, prefix::ARRAY)?;
    if count < 0 {
        return Err(DecodeError::InvalidArrayLength(count));
    }

    // Never trust the advertised count for the allocation
    let mut parts = Vec::with_capacity((count as usize).min(64));
    for _ in 0..count {
        parts.push(read_bulk(reader).await?);
    }

    Ok(Command::new(parts))
}

/// Reads one `$<len>\r\n<bytes>\r\n` element.
async fn read_bulk<R>(reader: &mut R) -> DecodeResult<Bytes>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_line(reader).await?.ok_or(DecodeError::UnexpectedEof)?;

    let len = parse_prefixed(&line, prefix::BULK_STRING)?;
    if len < 0 {
        return Err(DecodeError::InvalidBulkLength(len));
    }
    let len = len as u64;

    // The buffer grows with the bytes that actually arrive, not with `len`
    let mut data = Vec::new();
    let read = (&mut *reader).take(len).read_to_end(&mut data).await?;
    if (read as u64) < len {
        return Err(DecodeError::UnexpectedEof);
    }

    let mut terminator = [0u8; 2];
    reader.read_exact(&mut terminator).await.map_err(eof_aware)?;
    if terminator != CRLF {
        return Err(DecodeError::MissingCrlf);
    }

    Ok(Bytes::from(data))
}

/// Reads a CRLF-terminated line and returns it without the terminator.
///
/// Returns `Ok(None)` if the stream is already at EOF.
async fn read_line<R>(reader: &mut R) -> DecodeResult<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let n = reader.read_until(b'\n', &mut line).await?;
    if n == 0 {
        return Ok(None);
    }

    if !line.ends_with(b"\n") {
        return Err(DecodeError::UnexpectedEof);
    }
    if !line.ends_with(CRLF) {
        return Err(DecodeError::MissingCrlf);
    }

    line.truncate(line.len() - CRLF.len());
    Ok(Some(line))
}

/// Parses `<prefix><decimal integer>`.
fn parse_prefixed(line: &[u8], expected: u8) -> DecodeResult<i64> {
    match line.first() {
        Some(&found) if found == expected => {}
        Some(&found) => return Err(DecodeError::UnexpectedPrefix { expected, found }),
        None => return Err(DecodeError::InvalidInteger(String::new())),
    }

    let digits = &line[1..];
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| DecodeError::InvalidInteger(String::from_utf8_lossy(digits).into_owned()))
}

fn eof_aware(err: std::io::Error) -> DecodeError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        DecodeError::UnexpectedEof
    } else {
        DecodeError::Io(err)
    }
}
