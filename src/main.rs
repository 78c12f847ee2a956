//! FlintKV server entry point.
//!
//! Sets up logging, the shared store, and the TCP listener, then spawns one
//! task per accepted connection.

use anyhow::{bail, Context};
use flintkv::commands::CommandHandler;
use flintkv::connection::{handle_connection, ConnectionStats};
use flintkv::storage::Store;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: flintkv::DEFAULT_HOST.to_string(),
            port: flintkv::DEFAULT_PORT,
        }
    }
}

/// What the command line asked for.
#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    Serve(Config),
    Help,
    Version,
}

impl Config {
    /// Parse configuration from command-line arguments (without the program name)
    fn from_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Invocation> {
        let mut config = Config::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => {
                    config.host = args.next().context("--host requires a value")?;
                }
                "--port" | "-p" => {
                    let value = args.next().context("--port requires a value")?;
                    config.port = value
                        .parse()
                        .with_context(|| format!("invalid port number: {value}"))?;
                }
                "--help" => return Ok(Invocation::Help),
                "--version" | "-v" => return Ok(Invocation::Version),
                other => bail!("unknown argument: {other}"),
            }
        }

        Ok(Invocation::Serve(config))
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn print_help() {
    println!(
        r#"
FlintKV - A Small In-Memory Data-Structure Server

USAGE:
    flintkv [OPTIONS]

OPTIONS:
    -h, --host <HOST>    Host to bind to (default: {host})
    -p, --port <PORT>    Port to listen on (default: {port})
    -v, --version        Print version information
        --help           Print this help message

LOGGING:
    Set RUST_LOG to change verbosity, e.g. RUST_LOG=flintkv=debug

CONNECTING:
    $ redis-cli -p {port}
    127.0.0.1:{port}> RPUSH queue a b c
    (integer) 3
    127.0.0.1:{port}> LRANGE queue 0 -1
    1) "a"
    2) "b"
    3) "c"
"#,
        host = flintkv::DEFAULT_HOST,
        port = flintkv::DEFAULT_PORT,
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::from_args(std::env::args().skip(1)) {
        Ok(Invocation::Serve(config)) => config,
        Ok(Invocation::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Invocation::Version) => {
            println!("FlintKV version {}", flintkv::VERSION);
            return Ok(());
        }
        Err(e) => {
            print_help();
            return Err(e);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Shared by every connection for the lifetime of the process
    let storage = Arc::new(Store::new());
    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_address()))?;
    info!(version = flintkv::VERSION, "Listening on {}", config.bind_address());

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    tokio::select! {
        _ = accept_loop(listener, Arc::clone(&storage), Arc::clone(&stats)) => {}
        _ = shutdown => {}
    }

    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        store = ?storage,
        "Server shutdown complete"
    );
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(listener: TcpListener, storage: Arc<Store>, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = CommandHandler::new(Arc::clone(&storage));
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Invocation> {
        Config::from_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_defaults() {
        let Invocation::Serve(config) = parse(&[]).unwrap() else {
            panic!("expected a serve invocation");
        };
        assert_eq!(config.bind_address(), "0.0.0.0:6379");
    }

    #[test]
    fn test_host_and_port() {
        let invocation = parse(&["--host", "127.0.0.1", "-p", "6380"]).unwrap();
        assert_eq!(
            invocation,
            Invocation::Serve(Config {
                host: "127.0.0.1".to_string(),
                port: 6380,
            })
        );
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse(&["--help"]).unwrap(), Invocation::Help);
        assert_eq!(parse(&["-v"]).unwrap(), Invocation::Version);
    }

    #[test]
    fn test_bad_arguments() {
        assert!(parse(&["--port"]).is_err());
        assert!(parse(&["--port", "seventy"]).is_err());
        assert!(parse(&["--port", "70000"]).is_err());
        assert!(parse(&["--verbose"]).is_err());
    }
}
