//! Connection management.

use crate::error::ClientError;
use dfadev_protocol::message::*;
use dfadev_protocol::{Decoder, Encoder, PROTOCOL_VERSION};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout.
    pub request_timeout: Duration,
    /// Client name for HELLO.
    pub client_name: Option<String>,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            client_name: None,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }
}

/// A connection to a dfadev server.
///
/// Requests may be issued from several tasks at once; responses are matched
/// to their callers by request ID in [`Connection::read_loop`].
pub struct Connection {
    config: ConnectionConfig,
    writer: Mutex<Option<WriteHalf<TcpStream>>>,
    reader: Mutex<Option<ReadHalf<TcpStream>>>,
    decoder: Mutex<Decoder>,
    pending: Mutex<HashMap<String, oneshot::Sender<Response>>>,
    next_id: AtomicU64,
    connected: AtomicBool,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            decoder: Mutex::new(Decoder::new()),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            connected: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connects to the server and performs the HELLO handshake.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let addr = self.config.addr;
        tracing::debug!(%addr, "connecting");

        let connecting = TcpStream::connect(addr);
        let stream = match tokio::time::timeout(self.config.connect_timeout, connecting).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::debug!(%addr, error = %e, "connect failed");
                return Err(ClientError::Io(e));
            }
            Err(_) => return Err(ClientError::Timeout),
        };
        stream.set_nodelay(true).ok();

        let (read_half, write_half) = tokio::io::split(stream);
        *self.reader.lock().await = Some(read_half);
        *self.writer.lock().await = Some(write_half);
        self.decoder.lock().await.clear();

        let hello = HelloParams {
            protocol_version: PROTOCOL_VERSION,
            client_name: self.config.client_name.clone(),
        };
        let request = Request::new(self.allocate_id(), Operation::Hello)
            .with_params(serde_json::to_value(hello)?);
        self.send(&request).await?;

        // read_loop is not running yet, so the HELLO reply is read inline
        let reply = tokio::time::timeout(self.config.request_timeout, self.next_response())
            .await
            .map_err(|_| ClientError::Timeout)??;
        into_result(reply)?;

        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!(%addr, "handshake complete");
        Ok(())
    }

    fn allocate_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::SeqCst).to_string()
    }

    async fn send(&self, request: &Request) -> Result<(), ClientError> {
        let frame = Encoder::encode_request(request)?;
        let mut writer = self.writer.lock().await;
        writer
            .as_mut()
            .ok_or(ClientError::NotConnected)?
            .write_all(&frame)
            .await?;
        Ok(())
    }

    /// Reads from the socket into the decoder. Returns false on EOF.
    async fn fill(&self, buf: &mut [u8]) -> Result<bool, ClientError> {
        let n = {
            let mut reader = self.reader.lock().await;
            reader
                .as_mut()
                .ok_or(ClientError::NotConnected)?
                .read(buf)
                .await?
        };
        if n > 0 {
            self.decoder.lock().await.extend(&buf[..n]);
        }
        Ok(n > 0)
    }

    /// Reads until one whole response is decoded.
    async fn next_response(&self) -> Result<Response, ClientError> {
        let mut buf = vec![0u8; self.config.read_buffer_size];
        loop {
            if let Some(response) = self.decoder.lock().await.decode_response()? {
                return Ok(response);
            }
            if !self.fill(&mut buf).await? {
                return Err(ClientError::ConnectionClosed);
            }
        }
    }

    /// Sends a request and waits for its response. Requires `read_loop` to be
    /// running in another task.
    pub async fn request(
        &self,
        op: Operation,
        params: serde_json::Value,
    ) -> Result<Response, ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let id = self.allocate_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        tracing::debug!(%id, op = op.as_str(), "sending request");
        if let Err(e) = self.send(&Request::new(&id, op).with_params(params)).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.config.request_timeout, rx).await {
            Ok(reply) => reply.map_err(|_| ClientError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                tracing::debug!(%id, "request timed out");
                Err(ClientError::Timeout)
            }
        }
    }

    /// Reads responses and hands each to its waiting request. Run this in a
    /// background task after [`Connection::connect`].
    pub async fn read_loop(&self) -> Result<(), ClientError> {
        let mut buf = vec![0u8; self.config.read_buffer_size];

        while self.fill(&mut buf).await? {
            let mut decoder = self.decoder.lock().await;
            let mut pending = self.pending.lock().await;
            while let Some(response) = decoder.decode_response()? {
                match pending.remove(&response.id) {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => tracing::debug!(id = %response.id, "response for unknown request"),
                }
            }
        }

        tracing::debug!("server closed the connection");
        self.connected.store(false, Ordering::SeqCst);
        // Dropping the senders wakes every waiter with ConnectionClosed
        self.pending.lock().await.clear();
        Err(ClientError::ConnectionClosed)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Shuts down the write half and fails any outstanding requests.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        self.pending.lock().await.clear();
        tracing::debug!("connection closed");
        Ok(())
    }

    /// Returns the number of requests awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.try_lock().map(|p| p.len()).unwrap_or(0)
    }
}

/// Converts an error response into [`ClientError::ServerError`].
pub(crate) fn into_result(response: Response) -> Result<serde_json::Value, ClientError> {
    match (response.result, response.error) {
        (_, Some(err)) => Err(ClientError::ServerError {
            code: err.code,
            message: err.message,
            retryable: err.retryable,
        }),
        (Some(result), None) => Ok(result),
        (None, None) => Ok(serde_json::Value::Null),
    }
}
