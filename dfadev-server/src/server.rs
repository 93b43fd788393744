//! TCP server implementation.

use crate::error::ServerError;
use crate::handler::CommandHandler;
use crate::session::{Session, SessionState};
use dfadev_protocol::message::Operation;
use dfadev_protocol::{Decoder, Encoder, DEFAULT_PORT};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            idle_timeout: Duration::from_secs(300),
            max_connections: 64,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            bind_addr: config.network.bind_addr,
            idle_timeout: config.network.idle_timeout(),
            max_connections: config.network.max_connections,
        }
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// TCP server for dfadev.
pub struct Server {
    config: ServerConfig,
    handler: Arc<CommandHandler>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
    local_addr: parking_lot::Mutex<Option<SocketAddr>>,
}

impl Server {
    pub fn new(config: ServerConfig, handler: CommandHandler) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            handler: Arc::new(handler),
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
            local_addr: parking_lot::Mutex::new(None),
        }
    }

    /// Binds the listener and serves until [`Server::shutdown`] is called or
    /// a PREPARE_UPDATE completes.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serves on an already-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        *self.local_addr.lock() = Some(local_addr);
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("Server listening on {}", local_addr);

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

                            let handler = self.handler.clone();
                            let stats = self.stats.clone();
                            let config = self.config.clone();
                            let shutdown = self.shutdown.clone();

                            tokio::spawn(async move {
                                let result = Self::handle_connection(
                                    stream,
                                    addr,
                                    handler,
                                    stats.clone(),
                                    config,
                                    shutdown,
                                )
                                .await;

                                if let Err(e) = result {
                                    tracing::debug!("Connection {} error: {}", addr, e);
                                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                                }

                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                tracing::info!("Client disconnected: {}", addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn handle_connection(
        mut stream: TcpStream,
        addr: SocketAddr,
        handler: Arc<CommandHandler>,
        stats: Arc<ServerStats>,
        config: ServerConfig,
        shutdown: broadcast::Sender<()>,
    ) -> Result<(), ServerError> {
        tracing::info!("Client connected: {}", addr);

        let mut shutdown_rx = shutdown.subscribe();
        let mut session = Session::new(addr);
        let mut decoder = Decoder::new();
        let mut buf = [0u8; 8192];

        loop {
            tokio::select! {
                result = stream.read(&mut buf) => {
                    match result {
                        Ok(0) => {
                            tracing::debug!("[{}] Connection closed by client", addr);
                            return Ok(());
                        }
                        Ok(n) => {
                            tracing::debug!("[{}] Received {} bytes", addr, n);
                            decoder.extend(&buf[..n]);
                        }
                        Err(e) => {
                            tracing::debug!("[{}] Read error: {}", addr, e);
                            return Err(ServerError::Io(e));
                        }
                    }
                }

                _ = tokio::time::sleep(config.idle_timeout) => {
                    if session.idle_duration() > config.idle_timeout {
                        tracing::debug!("[{}] Idle timeout", addr);
                        return Ok(());
                    }
                }

                _ = shutdown_rx.recv() => {
                    tracing::debug!("[{}] Shutdown signal received", addr);
                    return Err(ServerError::ShuttingDown);
                }
            }

            while let Some(request) = decoder.decode_request()? {
                tracing::debug!(
                    "[{}] Request: {} (id={})",
                    addr,
                    request.op.as_str(),
                    request.id
                );
                stats.requests_total.fetch_add(1, Ordering::Relaxed);

                let response = handler.handle(&mut session, &request).await;
                if response.is_error() {
                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                }

                tracing::debug!(
                    "[{}] Response: {} (id={})",
                    addr,
                    if response.is_ok() { "OK" } else { "ERROR" },
                    response.id
                );

                let response_bytes = Encoder::encode_response(&response)?;
                stream.write_all(&response_bytes).await?;

                if request.op == Operation::PrepareUpdate && response.is_ok() {
                    tracing::info!("[{}] Update prepared, stopping server", addr);
                    stream.flush().await?;
                    let _ = shutdown.send(());
                    return Ok(());
                }

                if session.state() == SessionState::Closing {
                    tracing::debug!("[{}] Session closing", addr);
                    return Ok(());
                }
            }
        }
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns the bound address once the server is listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    pub fn handler(&self) -> &CommandHandler {
        &self.handler
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}
