//! TCP Listener
//!
//! [`Server`] binds a listener and spawns one [`ConnectionHandler`] task per
//! accepted client. There is no connection limit and no worker pool: every
//! client costs one task for as long as it stays connected, including
//! clients that stall mid-command.
//!
//! ## Example
//!
//! ```ignore
//! use memtext::server::Server;
//! use memtext::storage::MemoryStore;
//! use std::sync::Arc;
//!
//! let server = Server::new("127.0.0.1:11211", Arc::new(MemoryStore::new()));
//! server.listen_and_serve().await?;
//! ```
//!
//! [`ConnectionHandler`]: crate::connection::ConnectionHandler

use crate::backend::RequestHandler;
use crate::connection::handle_connection;
use crate::stats::Stats;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// A memcached text-protocol server.
pub struct Server {
    addr: String,
    handler: Arc<dyn RequestHandler>,
    stats: Arc<Stats>,
}

impl Server {
    /// Creates a server for `addr` backed by `handler`.
    ///
    /// An empty `addr` means [`DEFAULT_ADDR`](crate::DEFAULT_ADDR).
    pub fn new(addr: impl Into<String>, handler: Arc<dyn RequestHandler>) -> Self {
        Self::with_stats(addr, handler, Arc::new(Stats::new()))
    }

    /// Creates a server that reports into an existing statistics registry.
    pub fn with_stats(
        addr: impl Into<String>,
        handler: Arc<dyn RequestHandler>,
        stats: Arc<Stats>,
    ) -> Self {
        let mut addr = addr.into();
        if addr.is_empty() {
            addr = crate::DEFAULT_ADDR.to_string();
        }

        Self {
            addr,
            handler,
            stats,
        }
    }

    /// The address the server binds to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// The statistics registry shared by all connections.
    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Binds the configured address and serves until accepting fails.
    pub async fn listen_and_serve(&self) -> io::Result<()> {
        let listener = TcpListener::bind(&self.addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        self.serve(listener).await
    }

    /// Accepts connections on `listener` forever.
    ///
    /// Returns only when `accept` fails; that error ends serving.
    /// Connections already running are not affected.
    pub async fn serve(&self, listener: TcpListener) -> io::Result<()> {
        loop {
            let (stream, addr) = listener.accept().await?;

            if let Err(e) = stream.set_nodelay(true) {
                warn!(client = %addr, error = %e, "Failed to set up connection, dropping it");
                continue;
            }

            let handler = Arc::clone(&self.handler);
            let stats = Arc::clone(&self.stats);

            tokio::spawn(async move {
                handle_connection(stream, addr, handler, stats).await;
            });
        }
    }
}
