//! Connection management.
//!
//! Requests are written from the caller's task; a reader task owned by the
//! connection decodes responses and completes the matching waiter by id.

use crate::error::ClientError;
use dfadev_protocol::message::{Operation, Request, Response};
use dfadev_protocol::{Decoder, Encoder};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

type Waiters = Arc<Mutex<HashMap<String, oneshot::Sender<Response>>>>;

/// A connection to a dfadev host.
pub struct Connection {
    config: ConnectionConfig,
    writer: Mutex<Option<OwnedWriteHalf>>,
    waiters: Waiters,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
    connected: Arc<AtomicBool>,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            writer: Mutex::new(None),
            waiters: Arc::new(Mutex::new(HashMap::new())),
            reader: std::sync::Mutex::new(None),
            next_id: AtomicU64::new(1),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Connects to the server and starts the reader task.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let addr = self.config.addr;
        let stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ClientError::Timeout)??;
        stream.set_nodelay(true).ok();

        let (read_half, write_half) = stream.into_split();
        *self.writer.lock().await = Some(write_half);
        self.connected.store(true, Ordering::SeqCst);

        let reader = tokio::spawn(read_responses(
            read_half,
            self.config.read_buffer_size,
            self.waiters.clone(),
            self.connected.clone(),
        ));
        if let Ok(mut slot) = self.reader.lock() {
            if let Some(old) = slot.replace(reader) {
                old.abort();
            }
        }

        tracing::debug!("Connected to {}", addr);
        Ok(())
    }

    /// Sends a request and waits for its response.
    pub async fn request(
        &self,
        op: Operation,
        params: serde_json::Value,
    ) -> Result<Response, ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let encoded = Encoder::encode_request(&Request::new(&id, op).with_params(&params)?)?;

        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.insert(id.clone(), tx);

        let sent = match self.writer.lock().await.as_mut() {
            Some(writer) => writer.write_all(&encoded).await.map_err(ClientError::from),
            None => Err(ClientError::NotConnected),
        };
        if let Err(e) = sent {
            self.waiters.lock().await.remove(&id);
            return Err(e);
        }
        tracing::debug!("Sent {:?} (id={}, {} bytes)", op, id, encoded.len());

        match tokio::time::timeout(self.config.request_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                self.waiters.lock().await.remove(&id);
                Err(ClientError::Timeout)
            }
        }
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Closes the connection and fails every outstanding request.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        if let Ok(mut slot) = self.reader.lock() {
            if let Some(reader) = slot.take() {
                reader.abort();
            }
        }
        self.waiters.lock().await.clear();
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.reader.lock() {
            if let Some(reader) = slot.take() {
                reader.abort();
            }
        }
    }
}

async fn read_responses(
    mut reader: OwnedReadHalf,
    buffer_size: usize,
    waiters: Waiters,
    connected: Arc<AtomicBool>,
) {
    let mut decoder = Decoder::new();
    let mut buf = vec![0u8; buffer_size];

    let reason = loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break "closed by server".to_string(),
            Ok(n) => n,
            Err(e) => break e.to_string(),
        };
        decoder.extend(&buf[..n]);

        let mut decoded = Vec::new();
        let failure = loop {
            match decoder.decode_response() {
                Ok(Some(response)) => decoded.push(response),
                Ok(None) => break None,
                Err(e) => break Some(e.to_string()),
            }
        };

        let mut waiters = waiters.lock().await;
        for response in decoded {
            match waiters.remove(&response.id) {
                Some(tx) => {
                    let _ = tx.send(response);
                }
                None => tracing::debug!("Dropping response for unknown id={}", response.id),
            }
        }
        drop(waiters);

        if let Some(reason) = failure {
            break reason;
        }
    };

    tracing::debug!("Connection reader stopped: {}", reason);
    connected.store(false, Ordering::SeqCst);
    // Dropping the senders fails every waiter with ConnectionClosed.
    waiters.lock().await.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let config = ConnectionConfig::new("127.0.0.1:7411".parse().unwrap())
            .with_connect_timeout(Duration::from_secs(1))
            .with_request_timeout(Duration::from_millis(250));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
    }

    #[tokio::test]
    async fn test_server_close_fails_waiters() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept, read one byte, then hang up without answering.
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut byte = [0u8; 1];
            let _ = stream.read(&mut byte).await;
        });

        let conn = Connection::new(ConnectionConfig::new(addr));
        conn.connect().await.unwrap();
        let err = conn
            .request(Operation::Ping, serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed));
        assert!(!conn.is_connected());
    }
}
