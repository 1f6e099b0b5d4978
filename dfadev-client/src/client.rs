//! High-level client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use dfadev_core::{ControlRequest, State, Symbol};
use dfadev_protocol::message::*;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

/// High-level client for a dfadev host.
pub struct Client {
    conn: Arc<Connection>,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            conn: Arc::new(Connection::new(config)),
        }
    }

    /// Connects to the server.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.conn.connect().await
    }

    /// Returns whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> Arc<Connection> {
        self.conn.clone()
    }

    // =========================================================================
    // Helper methods
    // =========================================================================

    async fn request(&self, op: Operation, params: Value) -> Result<Value, ClientError> {
        let response = self.conn.request(op, params).await?;

        if let Some(err) = response.error {
            return Err(ClientError::ServerError {
                code: err.code,
                message: err.message,
                retryable: err.retryable,
            });
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn request_as<T: DeserializeOwned>(
        &self,
        op: Operation,
        params: Value,
    ) -> Result<T, ClientError> {
        let result = self.request(op, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    // =========================================================================
    // System operations
    // =========================================================================

    /// Pings the server.
    pub async fn ping(&self) -> Result<(), ClientError> {
        self.request(Operation::Ping, json!({})).await?;
        Ok(())
    }

    /// Gets host and engine info.
    pub async fn info(&self) -> Result<InfoResult, ClientError> {
        self.request_as(Operation::Info, json!({})).await
    }

    // =========================================================================
    // Device operations
    // =========================================================================

    /// Feeds symbols to the automaton. Returns the number consumed.
    pub async fn feed(&self, symbols: &[Symbol]) -> Result<usize, ClientError> {
        let params = serde_json::to_value(WriteParams::new(symbols.to_vec()))?;
        let result: WriteResult = self.request_as(Operation::Write, params).await?;
        Ok(result.consumed)
    }

    /// Reads `size` copies of the current verdict.
    pub async fn poll(&self, size: usize) -> Result<Vec<u8>, ClientError> {
        let result: ReadResult = self
            .request_as(Operation::Read, json!({ "size": size }))
            .await?;
        Ok(result.data)
    }

    /// Sends a raw control code with its payload.
    pub async fn control(&self, code: u32, payload: &[u8]) -> Result<ControlResult, ClientError> {
        let params = serde_json::to_value(ControlParams {
            code,
            payload: payload.to_vec(),
        })?;
        self.request_as(Operation::Control, params).await
    }

    async fn send_control(&self, request: ControlRequest) -> Result<(), ClientError> {
        let (code, payload) = request.encode();
        self.control(code, &payload).await?;
        Ok(())
    }

    /// Returns the automaton to state 0.
    pub async fn reset(&self) -> Result<(), ClientError> {
        self.send_control(ControlRequest::Reset).await
    }

    /// Sets `state --symbol--> next`.
    pub async fn add_transition(
        &self,
        state: State,
        symbol: Symbol,
        next: State,
    ) -> Result<(), ClientError> {
        self.send_control(ControlRequest::AddTransition {
            state,
            symbol,
            next,
        })
        .await
    }

    pub async fn mark_accepting(&self, state: State) -> Result<(), ClientError> {
        self.send_control(ControlRequest::MarkAccepting(state)).await
    }

    pub async fn mark_rejecting(&self, state: State) -> Result<(), ClientError> {
        self.send_control(ControlRequest::MarkRejecting(state)).await
    }

    /// Publishes the automaton for the next host version. The host stops
    /// serving afterwards.
    pub async fn handoff(&self) -> Result<HandoffResult, ClientError> {
        self.request_as(Operation::Handoff, json!({})).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfadev_core::EngineConfig;
    use dfadev_exchange::{initialize, DirExchange, Exchange, InitKind, MemoryExchange};
    use dfadev_protocol::ErrorCode;
    use dfadev_server::{Dispatcher, DispatcherOutcome, Server, ServerConfig};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::task::JoinHandle;
    use tokio_test::assert_ok;

    struct Host {
        addr: SocketAddr,
        serve: JoinHandle<()>,
        dispatcher: JoinHandle<DispatcherOutcome>,
    }

    async fn start_host(kind: InitKind, exchange: Arc<dyn Exchange>) -> Host {
        let startup = initialize(kind, EngineConfig::default(), exchange.as_ref());
        let (dispatcher, handle) = Dispatcher::new(startup, exchange);

        let server = Server::new(ServerConfig::new("127.0.0.1:0".parse().unwrap()), handle);
        let dispatcher = dispatcher.with_shutdown(server.shutdown_sender()).spawn();
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let serve = tokio::spawn(async move {
            server.serve(listener).await.unwrap();
        });

        Host {
            addr,
            serve,
            dispatcher,
        }
    }

    async fn connect(addr: SocketAddr) -> Client {
        let client = Client::new(ConnectionConfig::new(addr));
        client.connect().await.unwrap();
        client
    }

    #[tokio::test]
    async fn test_request_before_connect() {
        let client = Client::new(ConnectionConfig::new("127.0.0.1:1".parse().unwrap()));
        assert!(matches!(client.ping().await, Err(ClientError::NotConnected)));
    }

    #[tokio::test]
    async fn test_device_operations() {
        let host = start_host(InitKind::Fresh, Arc::new(MemoryExchange::new())).await;
        let client = connect(host.addr).await;

        assert_ok!(client.ping().await);
        assert_ok!(client.add_transition(0, b'a', 1).await);
        assert_ok!(client.add_transition(1, b'b', 2).await);
        assert_ok!(client.mark_accepting(2).await);

        assert_eq!(client.feed(b"ab").await.unwrap(), 2);
        assert_eq!(client.poll(2).await.unwrap(), b"YY");

        // Mark operations never move the current state.
        client.mark_rejecting(2).await.unwrap();
        assert_eq!(client.poll(1).await.unwrap(), b"N");
        assert_eq!(client.info().await.unwrap().current_state, 2);

        client.reset().await.unwrap();
        assert_eq!(client.info().await.unwrap().current_state, 0);

        let err = client.control(0x20007a99, &[]).await.unwrap_err();
        assert_eq!(err.server_code(), Some(ErrorCode::UnsupportedOperation));

        client.close().await.unwrap();
        host.serve.abort();
    }

    #[tokio::test]
    async fn test_live_update_across_hosts() {
        let dir = tempfile::tempdir().unwrap();
        let exchange: Arc<dyn Exchange> = Arc::new(DirExchange::open(dir.path()).unwrap());

        // First version builds an automaton and hands it off.
        let old = start_host(InitKind::Fresh, exchange.clone()).await;
        let client = connect(old.addr).await;
        client.add_transition(0, b'x', 5).await.unwrap();
        client.add_transition(5, b'y', 6).await.unwrap();
        client.mark_accepting(6).await.unwrap();
        client.feed(b"x").await.unwrap();

        let handoff = client.handoff().await.unwrap();
        assert_eq!(handoff.current_state, 5);
        old.serve.await.unwrap();
        drop(client);
        assert!(old.dispatcher.await.unwrap().handed_off);

        // The next version resumes mid-word.
        let new = start_host(InitKind::LiveUpdate, exchange.clone()).await;
        let client = connect(new.addr).await;

        let info = client.info().await.unwrap();
        assert_eq!(info.lifecycle, "live_update");
        assert_eq!(info.current_state, 5);
        assert!(info.restore_error.is_none());

        client.feed(b"y").await.unwrap();
        assert_eq!(client.poll(1).await.unwrap(), b"Y");

        // Each blob is consumed by the restore.
        assert!(!exchange.contains("automaton.transitionTable").unwrap());
        new.serve.abort();
    }

    #[tokio::test]
    async fn test_mutations_rejected_after_handoff() {
        let host = start_host(InitKind::Fresh, Arc::new(MemoryExchange::new())).await;
        let first = connect(host.addr).await;
        let second = Client::new(
            ConnectionConfig::new(host.addr).with_request_timeout(Duration::from_secs(2)),
        );
        second.connect().await.unwrap();
        second.ping().await.unwrap();

        first.handoff().await.unwrap();

        // The other connection is closed by the host or refused by the engine.
        let err = second.feed(b"a").await.unwrap_err();
        assert!(err.is_retryable() || matches!(err, ClientError::NotConnected));
    }
}
