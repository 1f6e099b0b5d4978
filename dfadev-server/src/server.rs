//! TCP server implementation.

use crate::config::NetworkConfig;
use crate::dispatcher::DispatcherHandle;
use crate::error::ServerError;
use crate::handler::CommandHandler;
use dfadev_protocol::{Decoder, Encoder, ErrorCode, Response, ResponseError, DEFAULT_PORT};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
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

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

impl From<&NetworkConfig> for ServerConfig {
    fn from(network: &NetworkConfig) -> Self {
        Self {
            bind_addr: network.bind_addr,
            idle_timeout: network.idle_timeout(),
            max_connections: network.max_connections,
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

/// TCP host for the device.
pub struct Server {
    config: ServerConfig,
    handler: Arc<CommandHandler>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server in front of a dispatcher.
    pub fn new(config: ServerConfig, dispatcher: DispatcherHandle) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            handler: Arc::new(CommandHandler::new(dispatcher)),
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Sender that stops the server when signalled. The dispatcher uses it
    /// to stop the host after a HANDOFF.
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown.clone()
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        Ok(TcpListener::bind(self.config.bind_addr).await?)
    }

    /// Binds and serves until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serves connections from `listener` until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let mut shutdown_rx = self.shutdown.subscribe();
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("Server listening on {}", listener.local_addr()?);

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
                            let idle_timeout = self.config.idle_timeout;
                            let mut conn_shutdown = self.shutdown.subscribe();

                            tokio::spawn(async move {
                                let result = Self::handle_connection(
                                    stream,
                                    addr,
                                    handler,
                                    stats.clone(),
                                    idle_timeout,
                                    &mut conn_shutdown,
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

    /// Handles a single connection.
    async fn handle_connection(
        mut stream: TcpStream,
        addr: SocketAddr,
        handler: Arc<CommandHandler>,
        stats: Arc<ServerStats>,
        idle_timeout: Duration,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        tracing::info!("Client connected: {}", addr);

        let mut decoder = Decoder::new();
        let mut buf = [0u8; 8192];
        let mut last_activity = Instant::now();

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
                            last_activity = Instant::now();
                        }
                        Err(e) => return Err(ServerError::Io(e)),
                    }
                }

                _ = tokio::time::sleep(idle_timeout) => {
                    if last_activity.elapsed() >= idle_timeout {
                        tracing::debug!("[{}] Idle timeout", addr);
                        return Ok(());
                    }
                }

                _ = shutdown.recv() => {
                    tracing::debug!("[{}] Shutdown signal received", addr);
                    return Ok(());
                }
            }

            loop {
                let request = match decoder.decode_request() {
                    Ok(Some(request)) => request,
                    Ok(None) => break,
                    Err(e) => {
                        // No id to correlate with; answer once and drop the connection.
                        tracing::debug!("[{}] Malformed request: {}", addr, e);
                        stats.errors_total.fetch_add(1, Ordering::Relaxed);
                        let response = Response::error(
                            "",
                            ResponseError::new(ErrorCode::BadRequest, e.to_string()),
                        );
                        let response_bytes = Encoder::encode_response(&response)?;
                        stream.write_all(&response_bytes).await?;
                        return Err(e.into());
                    }
                };
                tracing::debug!("[{}] Request: {:?} (id={})", addr, request.op, request.id);
                stats.requests_total.fetch_add(1, Ordering::Relaxed);

                let response = handler.handle(&request).await;
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
            }
        }
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}
