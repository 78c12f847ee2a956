//! Connection Handler Module
//!
//! Each client gets its own handler task that runs in a loop, decoding one
//! frame at a time and writing back one reply per frame.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects, handler task spawned
//!        │
//!        ▼
//! 2. ┌──────────────────────────────┐
//!    │  Decode next frame           │◄─────┐
//!    └───────────┬──────────────────┘      │
//!                ▼                         │
//!    ┌──────────────────────────────┐      │
//!    │  Execute against the store   │      │
//!    └───────────┬──────────────────┘      │
//!                ▼                         │
//!    ┌──────────────────────────────┐      │
//!    │  Write and flush the reply   │──────┘
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 3. EOF, decode failure, or write error: handler task ends
//! ```
//!
//! A decode failure always ends the connection without a reply. Command
//! errors are just replies and the loop carries on.

use crate::commands::CommandHandler;
use crate::protocol::{read_command, DecodeError, RespValue};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, ReadHalf, WriteHalf};
use tracing::{debug, info, trace, warn};

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands executed
    pub commands_processed: AtomicU64,
    /// Total reply bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Serves a single client connection.
pub struct ConnectionHandler<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: BufWriter<WriteHalf<S>>,

    /// Client's address (for logging)
    addr: SocketAddr,

    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The client stream, usually a `TcpStream`
    /// * `addr` - The client's socket address
    /// * `command_handler` - The command handler for executing commands
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();
        let (read_half, write_half) = tokio::io::split(stream);

        Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            addr,
            command_handler,
            stats,
        }
    }

    /// Runs the connection loop until the client goes away or sends
    /// something that cannot be decoded.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => debug!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(ConnectionError::Decode(e)) => {
                warn!(client = %self.addr, error = %e, "Protocol error, closing connection")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The decode-execute-reply loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            let command = match read_command(&mut self.reader).await {
                Ok(command) => command,
                Err(e) if e.is_clean_close() => return Ok(()),
                Err(e) => return Err(e.into()),
            };

            if command.is_empty() {
                debug!(client = %self.addr, "Empty command, closing connection");
                return Ok(());
            }

            trace!(client = %self.addr, parts = command.len(), "Decoded command");

            let response = self.command_handler.execute(&command);
            self.stats.command_processed();

            self.send_response(&response).await?;
        }
    }

    /// Writes one reply and flushes it.
    async fn send_response(&mut self, response: &RespValue) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(client = %self.addr, bytes = bytes.len(), "Sent response");
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error while writing a reply
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The client sent a malformed or truncated frame
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Serves a client connection to completion.
///
/// The outcome is logged by [`ConnectionHandler::run`]; nothing is returned.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    let _ = handler.run().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Command;
    use crate::storage::Store;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};

    async fn create_test_server() -> (SocketAddr, Arc<Store>, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let storage = Arc::new(Store::new());
        let stats = Arc::new(ConnectionStats::new());

        let storage_clone = Arc::clone(&storage);
        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let handler = CommandHandler::new(Arc::clone(&storage_clone));
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(stream, client_addr, handler, stats));
            }
        });

        (addr, storage, stats)
    }

    fn frame(parts: &[&str]) -> Vec<u8> {
        parts
            .iter()
            .map(|s| s.to_string())
            .collect::<Command>()
            .encode()
    }

    /// Reads exactly `expected.len()` bytes and compares them.
    async fn expect_reply<R: AsyncRead + Unpin>(client: &mut R, expected: &[u8]) {
        let mut buf = vec![0u8; expected.len()];
        tokio::time::timeout(Duration::from_secs(2), client.read_exact(&mut buf))
            .await
            .expect("timed out waiting for reply")
            .unwrap();
        assert_eq!(
            String::from_utf8_lossy(&buf),
            String::from_utf8_lossy(expected)
        );
    }

    /// Asserts the server closed its side of the connection.
    async fn expect_closed(client: &mut TcpStream) {
        let mut buf = [0u8; 64];
        let result = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .expect("connection was not closed");
        // Depending on timing the close can surface as EOF or as a reset
        assert!(matches!(result, Ok(0) | Err(_)), "got {:?}", result);
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        expect_reply(&mut client, b"+PONG\r\n").await;
    }

    #[tokio::test]
    async fn test_set_get() {
        let (addr, storage, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$4\r\nname\r\n$4\r\nAriz\r\n")
            .await
            .unwrap();
        expect_reply(&mut client, b"+OK\r\n").await;

        client
            .write_all(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n")
            .await
            .unwrap();
        expect_reply(&mut client, b"$4\r\nAriz\r\n").await;

        assert_eq!(storage.get(b"name").as_deref(), Some(&b"Ariz"[..]));
    }

    #[tokio::test]
    async fn test_multiple_commands_in_one_write() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let mut batch = Vec::new();
        batch.extend(frame(&["RPUSH", "l", "a", "b", "c"]));
        batch.extend(frame(&["LPOP", "l", "2"]));
        batch.extend(frame(&["LLEN", "l"]));
        batch.extend(frame(&["LPOP", "missing"]));
        batch.extend(frame(&["LPOP", "missing", "2"]));
        client.write_all(&batch).await.unwrap();

        expect_reply(
            &mut client,
            b":3\r\n*2\r\n$1\r\na\r\n$1\r\nb\r\n:1\r\n$-1\r\n*0\r\n",
        )
        .await;
    }

    #[tokio::test]
    async fn test_command_error_keeps_connection_open() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(&frame(&["FOO"])).await.unwrap();
        expect_reply(&mut client, b"-ERR unknown command 'FOO'\r\n").await;

        client.write_all(&frame(&["GET"])).await.unwrap();
        expect_reply(&mut client, b"-ERR wrong number of arguments for 'GET' command\r\n").await;

        client.write_all(&frame(&["PING"])).await.unwrap();
        expect_reply(&mut client, b"+PONG\r\n").await;
    }

    #[tokio::test]
    async fn test_malformed_frame_closes_connection() {
        let (addr, _, stats) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"PING\r\n").await.unwrap();
        expect_closed(&mut client).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_empty_command_closes_connection() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*0\r\n").await.unwrap();
        expect_closed(&mut client).await;
    }

    #[tokio::test]
    async fn test_truncated_frame_then_disconnect() {
        let (addr, storage, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$5\r\nval")
            .await
            .unwrap();
        client.shutdown().await.unwrap();
        expect_closed(&mut client).await;

        assert_eq!(storage.get(b"k"), None);
    }

    #[tokio::test]
    async fn test_concurrent_rpush_from_many_clients() {
        let (addr, storage, _) = create_test_server().await;
        let clients = 32;

        let tasks: Vec<_> = (0..clients)
            .map(|i| {
                tokio::spawn(async move {
                    let mut client = TcpStream::connect(addr).await.unwrap();
                    let value = format!("v{}", i);
                    client
                        .write_all(&frame(&["RPUSH", "shared", value.as_str()]))
                        .await
                        .unwrap();

                    // Reply is the length at that moment, anywhere from 1 to N
                    let mut buf = [0u8; 16];
                    let n = client.read(&mut buf).await.unwrap();
                    assert_eq!(buf[0], b':');
                    assert!(buf[..n].ends_with(b"\r\n"));
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(storage.llen(b"shared"), clients);

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&frame(&["LLEN", "shared"])).await.unwrap();
        expect_reply(&mut client, b":32\r\n").await;
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, _, stats) = create_test_server().await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        expect_reply(&mut client, b"+PONG\r\n").await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_written.load(Ordering::Relaxed), 7);

        drop(client);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_handler_over_in_memory_stream() {
        let (mut client, server) = tokio::io::duplex(1024);
        let handler = CommandHandler::new(Arc::new(Store::new()));
        let stats = Arc::new(ConnectionStats::new());
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();

        let task = tokio::spawn(handle_connection(server, addr, handler, Arc::clone(&stats)));

        client.write_all(&frame(&["ECHO", "hi"])).await.unwrap();
        expect_reply(&mut client, b"$2\r\nhi\r\n").await;

        client.write_all(&frame(&["SET", "k", "v", "PX", "100"])).await.unwrap();
        expect_reply(&mut client, b"+OK\r\n").await;

        client.write_all(&frame(&["get", "k"])).await.unwrap();
        expect_reply(&mut client, b"$1\r\nv\r\n").await;

        // Closing the client ends the handler cleanly
        drop(client);
        task.await.unwrap();
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 3);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct LogCapture(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_clean_disconnect_is_not_logged_at_info() {
        let capture = LogCapture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (client, server) = tokio::io::duplex(64);
        let handler = CommandHandler::new(Arc::new(Store::new()));
        let stats = Arc::new(ConnectionStats::new());
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();

        drop(client);
        let result = ConnectionHandler::new(server, addr, handler, stats).run().await;
        assert!(result.is_ok());

        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Client connected"), "output: {output}");
        assert!(!output.contains("Client disconnected"), "output: {output}");
    }
}
