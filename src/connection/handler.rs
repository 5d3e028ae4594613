//! Connection Handler Module
//!
//! This module runs the memcached text protocol for one client connection.
//! Each client gets its own handler task that loops, reading a command,
//! calling the backend, and writing the reply.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌─────────────────────────────────────┐
//!    │          AwaitingCommand            │◄─────────┐
//!    │  read line ── EOF / empty ──► Closed│          │
//!    └──────────────┬──────────────────────┘          │
//!                   │ parse                           │
//!        ┌──────────┴──────────┐                      │
//!        ▼                     ▼                      │
//!   Dispatching          PayloadPending               │
//!   get/delete/stats     set: read <bytes>+2          │
//!        │                     │                      │
//!        └──────────┬──────────┘                      │
//!                   ▼                                 │
//!             ResponseSent (flush) ───────────────────┘
//!        │
//!        ▼
//! 4. quit / client disconnects / I/O error
//!        │
//!        ▼
//! 5. Handler task ends
//! ```
//!
//! ## Error Handling
//!
//! Protocol mistakes never close the connection: an unknown command gets
//! `ERROR`, a garbled storage line gets `CLIENT_ERROR`, and a data block that
//! does not match its declared length gets `CLIENT_ERROR bad chunk data`
//! after which the rest of the offending line is discarded. Only a closed
//! stream or a failed read/write ends the session.

use crate::backend::{Item, RequestHandler};
use crate::protocol::types::{BAD_CHUNK_DATA, BAD_COMMAND_LINE};
use crate::protocol::{
    parse_command, take_data_block, Command, LineReader, ParseError, Response, StoreSpec,
};
use crate::stats::{Counter, Stats};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter, ReadHalf, WriteHalf};
use tracing::{debug, info, trace};

/// Initial capacity of the outgoing reply buffer
const INITIAL_REPLY_SIZE: usize = 4096;

/// What the main loop does after a command.
enum Flow {
    Continue,
    Quit,
}

/// Handles a single client connection.
///
/// This struct owns the buffered reader and writer for one connected client
/// along with handles to the shared backend and statistics.
pub struct ConnectionHandler<S> {
    /// Read half of the stream, buffered
    reader: LineReader<ReadHalf<S>>,

    /// Write half of the stream, buffered
    writer: BufWriter<WriteHalf<S>>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Reply being assembled for the current command
    reply: Vec<u8>,

    /// The backend (shared across connections)
    handler: Arc<dyn RequestHandler>,

    /// Server statistics (shared)
    stats: Arc<Stats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The stream for this connection
    /// * `addr` - The client's socket address
    /// * `handler` - The backend that serves commands
    /// * `stats` - Shared server statistics
    pub fn new(
        stream: S,
        addr: SocketAddr,
        handler: Arc<dyn RequestHandler>,
        stats: Arc<Stats>,
    ) -> Self {
        stats.connection_opened();

        let (read_half, write_half) = tokio::io::split(stream);

        Self {
            reader: LineReader::new(read_half),
            writer: BufWriter::new(write_half),
            addr,
            reply: Vec::with_capacity(INITIAL_REPLY_SIZE),
            handler,
            stats,
        }
    }

    /// Runs the main connection loop.
    ///
    /// This method reads commands from the client and answers them until
    /// the client quits, disconnects, or an I/O error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => debug!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-dispatch-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            let line = match self.reader.read_line().await? {
                Some(line) if !line.is_empty() => line,
                _ => return Ok(()),
            };

            let command = match parse_command(&line) {
                Ok(command) => command,
                Err(ParseError::UnknownCommand) => {
                    debug!(
                        client = %self.addr,
                        line = %String::from_utf8_lossy(&line),
                        "Unknown command"
                    );
                    self.send(&Response::Error).await?;
                    continue;
                }
                Err(e @ ParseError::BadCommandLine(_)) => {
                    debug!(client = %self.addr, error = %e, "Malformed command line");
                    self.send(&Response::client_error(BAD_COMMAND_LINE)).await?;
                    continue;
                }
            };

            trace!(client = %self.addr, command = command.name(), "Parsed command");

            if let Flow::Quit = self.dispatch(command).await? {
                return Ok(());
            }
        }
    }

    /// Executes one parsed command.
    async fn dispatch(&mut self, command: Command) -> Result<Flow, ConnectionError> {
        match command {
            Command::Lookup(key) => self.lookup(&key).await?,
            Command::Store(spec) => self.store(spec).await?,
            Command::Delete(key) => self.delete(&key).await?,
            Command::Stats => self.report_stats().await?,
            Command::Version => {
                self.send(&Response::Version(crate::VERSION.to_string()))
                    .await?
            }
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// get <key>
    async fn lookup(&mut self, key: &str) -> Result<(), ConnectionError> {
        let handler = Arc::clone(&self.handler);
        let Some(getter) = handler.getter() else {
            return self.unsupported("get").await;
        };

        self.stats.increment(Counter::CmdGet);
        match getter.get(key) {
            Some(response) => {
                self.stats.increment(Counter::GetHits);
                response.serialize_into(&mut self.reply);
            }
            None => self.stats.increment(Counter::GetMisses),
        }

        self.send(&Response::End).await
    }

    /// set <key> <flags> <exptime> <bytes> [noreply]
    async fn store(&mut self, spec: StoreSpec) -> Result<(), ConnectionError> {
        let handler = Arc::clone(&self.handler);
        if handler.setter().is_none() {
            return self.unsupported("set").await;
        }

        let block = match self.reader.read_exact(spec.length + 2).await {
            Ok(block) => block,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                // The stream is gone, this is a courtesy
                let _ = self.send(&Response::client_error(BAD_CHUNK_DATA)).await;
                return Err(ConnectionError::UnexpectedEof);
            }
            Err(e) => return Err(e.into()),
        };

        let at_line_end = block.ends_with(b"\n");
        let Some(value) = take_data_block(&spec, block) else {
            debug!(
                client = %self.addr,
                key = %spec.key,
                declared = spec.length,
                "Data block does not match its declared length"
            );
            self.send(&Response::client_error(BAD_CHUNK_DATA)).await?;
            if !at_line_end {
                self.reader.skip_line().await?;
            }
            return Ok(());
        };

        let mut item = Item::new(spec.key, spec.flags, value);
        item.set_expires(spec.exptime);
        self.stats.increment(Counter::CmdSet);

        if spec.noreply {
            // Detached: no completion signal and no ordering with later commands
            tokio::task::spawn_blocking(move || {
                if let Some(setter) = handler.setter() {
                    let _ = setter.set(item);
                }
            });
            return Ok(());
        }

        let response = handler
            .setter()
            .and_then(|setter| setter.set(item))
            .unwrap_or(Response::Stored);
        self.send(&response).await
    }

    /// delete <key>
    async fn delete(&mut self, key: &str) -> Result<(), ConnectionError> {
        let handler = Arc::clone(&self.handler);
        let Some(deleter) = handler.deleter() else {
            return self.unsupported("delete").await;
        };

        self.stats.increment(Counter::CmdDelete);
        let response = match deleter.delete(key) {
            Ok(()) => Response::Deleted,
            Err(e) => {
                trace!(client = %self.addr, key = %key, error = %e, "Delete failed");
                Response::NotFound
            }
        };

        self.send(&response).await
    }

    /// stats
    async fn report_stats(&mut self) -> Result<(), ConnectionError> {
        for (name, value) in self.stats.snapshot() {
            Response::stat(name, value).serialize_into(&mut self.reply);
        }
        self.send(&Response::End).await
    }

    /// Answers a command the backend has no capability for.
    async fn unsupported(&mut self, command: &str) -> Result<(), ConnectionError> {
        debug!(client = %self.addr, command = command, "Backend does not support command");
        self.send(&Response::Error).await
    }

    /// Appends `response` to the pending reply and flushes it to the client.
    async fn send(&mut self, response: &Response) -> Result<(), ConnectionError> {
        response.serialize_into(&mut self.reply);
        self.writer.write_all(&self.reply).await?;
        self.writer.flush().await?;
        trace!(
            client = %self.addr,
            bytes = self.reply.len(),
            "Sent response"
        );
        self.reply.clear();
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream ended in the middle of a data block
    #[error("Unexpected end of stream")]
    UnexpectedEof,
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
///
/// # Arguments
///
/// * `stream` - The stream for this connection
/// * `addr` - The client's socket address
/// * `handler` - The backend that serves commands
/// * `stats` - Shared server statistics
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    handler: Arc<dyn RequestHandler>,
    stats: Arc<Stats>,
) where
    S: AsyncRead + AsyncWrite,
{
    let connection = ConnectionHandler::new(stream, addr, handler, stats);
    // Already logged by run(); nothing is reported to the client
    let _ = connection.run().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, Deleter, Getter, Setter};
    use crate::storage::MemoryStore;
    use bytes::Bytes;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio_test::io::{Builder, Mock};

    fn test_addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    async fn run_stream<S: AsyncRead + AsyncWrite>(
        stream: S,
        backend: Arc<dyn RequestHandler>,
        stats: Arc<Stats>,
    ) -> Result<(), ConnectionError> {
        ConnectionHandler::new(stream, test_addr(), backend, stats)
            .run()
            .await
    }

    async fn run(
        mock: Mock,
        backend: Arc<dyn RequestHandler>,
        stats: Arc<Stats>,
    ) -> Result<(), ConnectionError> {
        run_stream(mock, backend, stats).await
    }

    async fn run_with_store(mock: Mock) -> (Arc<MemoryStore>, Arc<Stats>) {
        let store = Arc::new(MemoryStore::new());
        let stats = Arc::new(Stats::new());
        run(mock, store.clone(), Arc::clone(&stats)).await.unwrap();
        (store, stats)
    }

    /// Backend that only supports lookups
    struct ReadOnly;

    impl Getter for ReadOnly {
        fn get(&self, key: &str) -> Option<Response> {
            Some(Response::value(key, 7, "fixed"))
        }
    }

    impl RequestHandler for ReadOnly {
        fn getter(&self) -> Option<&dyn Getter> {
            Some(self)
        }
    }

    /// Backend that refuses every store and records delete calls
    #[derive(Default)]
    struct Picky {
        deleted: Mutex<Vec<String>>,
    }

    impl Setter for Picky {
        fn set(&self, _item: Item) -> Option<Response> {
            Some(Response::NotStored)
        }
    }

    impl Deleter for Picky {
        fn delete(&self, key: &str) -> Result<(), BackendError> {
            self.deleted.lock().unwrap().push(key.to_string());
            Err(BackendError::Other("read-only".to_string()))
        }
    }

    impl RequestHandler for Picky {
        fn setter(&self) -> Option<&dyn Setter> {
            Some(self)
        }

        fn deleter(&self) -> Option<&dyn Deleter> {
            Some(self)
        }
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let mock = Builder::new()
            .read(b"set name 3 0 4\r\nAriz\r\n")
            .write(b"STORED\r\n")
            .read(b"get name\r\n")
            .write(b"VALUE name 3 4\r\nAriz\r\nEND\r\n")
            .build();

        let (store, stats) = run_with_store(mock).await;

        assert_eq!(store.len(), 1);
        assert_eq!(stats.get(Counter::CmdSet), 1);
        assert_eq!(stats.get(Counter::CmdGet), 1);
        assert_eq!(stats.get(Counter::GetHits), 1);
        assert_eq!(stats.get(Counter::GetMisses), 0);
    }

    #[tokio::test]
    async fn test_get_miss() {
        let mock = Builder::new()
            .read(b"get nothing\r\n")
            .write(b"END\r\n")
            .build();

        let (_, stats) = run_with_store(mock).await;

        assert_eq!(stats.get(Counter::CmdGet), 1);
        assert_eq!(stats.get(Counter::GetHits), 0);
        assert_eq!(stats.get(Counter::GetMisses), 1);
    }

    #[tokio::test]
    async fn test_get_empty_key_is_a_miss() {
        let mock = Builder::new()
            .read(b"get \r\n")
            .write(b"END\r\n")
            .build();

        let (_, stats) = run_with_store(mock).await;

        assert_eq!(stats.get(Counter::CmdGet), 1);
        assert_eq!(stats.get(Counter::GetMisses), 1);
    }

    #[tokio::test]
    async fn test_binary_value_with_crlf_inside() {
        let mock = Builder::new()
            .read(b"set bin 0 0 6\r\na\r\nb\x00c\r\n")
            .write(b"STORED\r\n")
            .read(b"get bin\r\n")
            .write(b"VALUE bin 0 6\r\na\r\nb\x00c\r\nEND\r\n")
            .build();

        run_with_store(mock).await;
    }

    #[tokio::test]
    async fn test_bad_chunk_resynchronizes() {
        // Declared 3 bytes, sent 4
        let mock = Builder::new()
            .read(b"set k 0 0 3\r\nabcd\r\n")
            .write(b"CLIENT_ERROR bad chunk data\r\n")
            .read(b"get k\r\n")
            .write(b"END\r\n")
            .build();

        let (store, stats) = run_with_store(mock).await;

        assert!(store.is_empty());
        assert_eq!(stats.get(Counter::CmdSet), 0);
    }

    #[tokio::test]
    async fn test_bad_chunk_short_block() {
        // Declared 5 bytes, sent 4: the next line's first byte completes
        // the block, which then does not end in CRLF
        let mock = Builder::new()
            .read(b"set k 0 0 5\r\nabcd\r\n")
            .read(b"XX\r\n")
            .write(b"CLIENT_ERROR bad chunk data\r\n")
            .read(b"set k 0 0 1\r\nz\r\n")
            .write(b"STORED\r\n")
            .build();

        let (store, _) = run_with_store(mock).await;
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_eof_inside_data_block() {
        let (mut client, server) = tokio::io::duplex(1024);
        let store = Arc::new(MemoryStore::new());
        let stats = Arc::new(Stats::new());

        let task = tokio::spawn(run_stream(server, store.clone(), Arc::clone(&stats)));

        client.write_all(b"set k 0 0 10\r\nabc").await.unwrap();
        client.shutdown().await.unwrap();

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, b"CLIENT_ERROR bad chunk data\r\n");

        let result = task.await.unwrap();
        assert!(matches!(result, Err(ConnectionError::UnexpectedEof)));
        assert!(store.is_empty());
        assert_eq!(stats.get(Counter::CurrConnections), 0);
    }

    #[tokio::test]
    async fn test_noreply_writes_nothing() {
        let mock = Builder::new()
            .read(b"set quiet 0 0 5 noreply\r\nhello\r\n")
            .read(b"get other\r\n")
            .write(b"END\r\n")
            .build();

        let (store, stats) = run_with_store(mock).await;
        assert_eq!(stats.get(Counter::CmdSet), 1);

        // The store runs detached; wait for it to land
        for _ in 0..100 {
            if !store.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            store.get_item("quiet").map(|item| item.value),
            Some(Bytes::from("hello"))
        );
    }

    #[tokio::test]
    async fn test_backend_response_replaces_stored() {
        let backend = Arc::new(Picky::default());
        let mock = Builder::new()
            .read(b"set k 0 0 1\r\nv\r\n")
            .write(b"NOT_STORED\r\n")
            .build();

        run(mock, backend, Arc::new(Stats::new())).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete() {
        let mock = Builder::new()
            .read(b"set k 0 0 1\r\nv\r\n")
            .write(b"STORED\r\n")
            .read(b"delete k\r\n")
            .write(b"DELETED\r\n")
            .read(b"delete k\r\n")
            .write(b"NOT_FOUND\r\n")
            .build();

        let (store, stats) = run_with_store(mock).await;
        assert!(store.is_empty());
        assert_eq!(stats.get(Counter::CmdDelete), 2);
    }

    #[tokio::test]
    async fn test_delete_failure_is_not_found() {
        let backend = Arc::new(Picky::default());
        let mock = Builder::new()
            .read(b"delete k\r\n")
            .write(b"NOT_FOUND\r\n")
            .build();

        run(mock, backend.clone(), Arc::new(Stats::new()))
            .await
            .unwrap();
        assert_eq!(*backend.deleted.lock().unwrap(), vec!["k".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_capabilities() {
        let mock = Builder::new()
            .read(b"delete k\r\n")
            .write(b"ERROR\r\n")
            // The data block is then read as a (too short) command line
            .read(b"set k 0 0 1\r\nv\r\n")
            .write(b"ERROR\r\n")
            .write(b"ERROR\r\n")
            .read(b"get k\r\n")
            .write(b"VALUE k 7 5\r\nfixed\r\nEND\r\n")
            .build();

        let stats = Arc::new(Stats::new());
        run(mock, Arc::new(ReadOnly), Arc::clone(&stats)).await.unwrap();

        assert_eq!(stats.get(Counter::CmdSet), 0);
        assert_eq!(stats.get(Counter::CmdDelete), 0);
        assert_eq!(stats.get(Counter::GetHits), 1);
    }

    #[tokio::test]
    async fn test_unknown_command_keeps_connection() {
        let mock = Builder::new()
            .read(b"flush_all\r\n")
            .write(b"ERROR\r\n")
            .read(b"ab\r\n")
            .write(b"ERROR\r\n")
            .read(b"get k\r\n")
            .write(b"END\r\n")
            .build();

        run_with_store(mock).await;
    }

    #[tokio::test]
    async fn test_malformed_set_line() {
        let mock = Builder::new()
            .read(b"set k flags 0 1\r\n")
            .write(b"CLIENT_ERROR bad command line format\r\n")
            .read(b"set k 0 0\r\n")
            .write(b"ERROR\r\n")
            .read(b"set key 0 0 1 noreply extra\r\n")
            .write(b"CLIENT_ERROR bad command line format\r\n")
            .build();

        let (store, _) = run_with_store(mock).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_set_is_rejected_before_reading() {
        let line = format!("set big 0 0 {}\r\n", crate::protocol::parser::MAX_VALUE_SIZE + 1);
        let mock = Builder::new()
            .read(line.as_bytes())
            .write(b"CLIENT_ERROR bad command line format\r\n")
            .read(b"get big\r\n")
            .write(b"END\r\n")
            .build();

        let (store, stats) = run_with_store(mock).await;
        assert!(store.is_empty());
        assert_eq!(stats.get(Counter::CmdSet), 0);
    }

    #[tokio::test]
    async fn test_version() {
        let expected = format!("VERSION {}\r\n", crate::VERSION);
        let mock = Builder::new()
            .read(b"version\r\n")
            .write(expected.as_bytes())
            .build();

        run_with_store(mock).await;
    }

    #[tokio::test]
    async fn test_quit_stops_reading() {
        // Everything after quit is left unread and unanswered
        let mock = Builder::new().read(b"quit\r\nget k\r\n").build();

        let (_, stats) = run_with_store(mock).await;
        assert_eq!(stats.get(Counter::CmdGet), 0);
    }

    #[tokio::test]
    async fn test_empty_line_ends_session() {
        let mock = Builder::new().read(b"\r\nget k\r\n").build();

        let (_, stats) = run_with_store(mock).await;
        assert_eq!(stats.get(Counter::CmdGet), 0);
    }

    #[tokio::test]
    async fn test_connection_counters() {
        let mock = Builder::new().build();

        let (_, stats) = run_with_store(mock).await;
        assert_eq!(stats.get(Counter::TotalConnections), 1);
        assert_eq!(stats.get(Counter::CurrConnections), 0);
    }
}
