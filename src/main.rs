//! memtext - memcached Text-Protocol Server
//!
//! This is the entry point for the `memtext` binary. It serves the
//! in-memory reference backend over the memcached ASCII protocol.

use memtext::storage::{ExpiryConfig, ExpirySweeper, MemoryStore};
use memtext::Server;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Base interval of the expiry sweeper
    sweep_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: memtext::DEFAULT_HOST.to_string(),
            port: memtext::DEFAULT_PORT,
            sweep_interval: ExpiryConfig::default().base_interval,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    config.host = value_of(&args, i, "--host").to_string();
                    i += 2;
                }
                "--port" | "-p" => {
                    config.port = value_of(&args, i, "--port").parse().unwrap_or_else(|_| {
                        eprintln!("Error: invalid port number");
                        std::process::exit(1);
                    });
                    i += 2;
                }
                "--sweep-interval-ms" => {
                    let ms: u64 = value_of(&args, i, "--sweep-interval-ms")
                        .parse()
                        .unwrap_or_else(|_| {
                            eprintln!("Error: invalid sweep interval");
                            std::process::exit(1);
                        });
                    config.sweep_interval = Duration::from_millis(ms.max(1));
                    i += 2;
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("memtext version {}", memtext::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn expiry_config(&self) -> ExpiryConfig {
        let defaults = ExpiryConfig::default();
        ExpiryConfig {
            base_interval: self.sweep_interval,
            min_interval: defaults.min_interval.min(self.sweep_interval),
            max_interval: defaults.max_interval.max(self.sweep_interval),
            ..defaults
        }
    }
}

/// Returns the value following the flag at `i`, or exits.
fn value_of<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value,
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"
memtext - memcached text-protocol server

USAGE:
    memtext [OPTIONS]

OPTIONS:
    -h, --host <HOST>              Host to bind to (default: 0.0.0.0)
    -p, --port <PORT>              Port to listen on (default: 11211)
        --sweep-interval-ms <MS>   Base interval of the expiry sweeper (default: 1000)
    -v, --version                  Print version information
        --help                     Print this help message

LOGGING:
    Set RUST_LOG to adjust verbosity, e.g. RUST_LOG=memtext=debug

CONNECTING:
    $ printf 'set name 0 0 4\r\nAriz\r\nget name\r\n' | nc localhost 11211
    STORED
    VALUE name 0 4
    Ariz
    END
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!("memtext v{}", memtext::VERSION);

    // The reference backend, shared by every connection
    let store = Arc::new(MemoryStore::new());
    let _sweeper = ExpirySweeper::start(Arc::clone(&store), config.expiry_config());

    let server = Server::new(config.bind_address(), store);
    let listener = TcpListener::bind(server.addr()).await?;
    info!("Listening on {}", listener.local_addr()?);

    // Set up graceful shutdown
    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, stopping server..."),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    };

    tokio::select! {
        result = server.serve(listener) => {
            if let Err(e) = result {
                error!("Failed to accept connection: {}", e);
                return Err(e.into());
            }
        }
        _ = shutdown => {}
    }

    info!("Server shutdown complete");
    Ok(())
}
