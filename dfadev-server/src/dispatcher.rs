//! Single-owner engine dispatcher.
//!
//! The engine is not shared. One task owns it and serves device requests
//! from a channel in arrival order, so the engine only ever sees one request
//! at a time and no request is interleaved with another.

use crate::error::ServerError;
use dfadev_core::{ControlCode, CoreError, DfaEngine, GrantBuffer, SnapshotPart, State};
use dfadev_exchange::{publish_snapshot, Exchange, InitKind, Startup};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

/// Largest READ or WRITE accepted in one request (1 MiB).
pub const MAX_TRANSFER_SIZE: usize = 1024 * 1024;

/// Queue depth between connections and the dispatcher.
const REQUEST_QUEUE_DEPTH: usize = 256;

/// A device request routed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceRequest {
    /// Poll `size` verdict bytes.
    Read { size: usize },
    /// Feed `size` symbols taken from `data`.
    Write { size: usize, data: Vec<u8> },
    /// Apply a raw control code.
    Control { code: u32, payload: Vec<u8> },
    /// Describe the engine.
    Info,
    /// Publish the automaton and stop accepting mutations.
    Handoff,
}

/// Engine description returned for `Info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub lifecycle: InitKind,
    pub current_state: State,
    pub accepting: bool,
    pub accepting_states: Vec<State>,
    pub configured_transitions: usize,
    pub chunk_size: usize,
    pub accept_sentinel: u8,
    pub reject_sentinel: u8,
    pub reset_on_add_transition: bool,
    pub symbols_fed: u64,
    pub polls: u64,
    pub control_requests: u64,
    pub restore_error: Option<String>,
    pub handed_off: bool,
}

/// Reply to a [`DeviceRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceReply {
    Read(Vec<u8>),
    Written(usize),
    Controlled(ControlCode),
    Info(Box<DeviceInfo>),
    HandedOff {
        parts: Vec<SnapshotPart>,
        current_state: State,
    },
}

type Envelope = (DeviceRequest, oneshot::Sender<Result<DeviceReply, ServerError>>);

/// Cloneable sender side of the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<Envelope>,
}

impl DispatcherHandle {
    /// Sends a request and waits for the engine's reply.
    pub async fn call(&self, request: DeviceRequest) -> Result<DeviceReply, ServerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((request, reply_tx))
            .await
            .map_err(|_| ServerError::ShuttingDown)?;
        reply_rx.await.map_err(|_| ServerError::ShuttingDown)?
    }
}

/// What the dispatcher hands back when it stops.
#[derive(Debug)]
pub struct DispatcherOutcome {
    pub engine: DfaEngine,
    /// Whether a HANDOFF already published the automaton.
    pub handed_off: bool,
}

/// Owner of the engine.
pub struct Dispatcher {
    engine: DfaEngine,
    lifecycle: InitKind,
    restore_error: Option<String>,
    exchange: Arc<dyn Exchange>,
    rx: mpsc::Receiver<Envelope>,
    shutdown: Option<broadcast::Sender<()>>,
    handed_off: bool,
}

impl Dispatcher {
    /// Creates a dispatcher around an initialized engine.
    pub fn new(startup: Startup, exchange: Arc<dyn Exchange>) -> (Self, DispatcherHandle) {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let dispatcher = Self {
            engine: startup.engine,
            lifecycle: startup.kind,
            restore_error: startup.restore_error.map(|e| e.to_string()),
            exchange,
            rx,
            shutdown: None,
            handed_off: false,
        };
        (dispatcher, DispatcherHandle { tx })
    }

    /// Signals `shutdown` once a HANDOFF has published the automaton.
    pub fn with_shutdown(mut self, shutdown: broadcast::Sender<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Spawns the dispatcher onto the runtime.
    pub fn spawn(self) -> JoinHandle<DispatcherOutcome> {
        tokio::spawn(self.run())
    }

    /// Serves requests until every handle is dropped.
    pub async fn run(mut self) -> DispatcherOutcome {
        tracing::debug!("Dispatcher started ({})", self.lifecycle);

        while let Some((request, reply)) = self.rx.recv().await {
            let result = self.execute(request);
            if reply.send(result).is_err() {
                tracing::debug!("Requester went away before the reply");
            }
        }

        tracing::debug!("Dispatcher stopped");
        DispatcherOutcome {
            engine: self.engine,
            handed_off: self.handed_off,
        }
    }

    /// Runs one request against the engine.
    pub fn execute(&mut self, request: DeviceRequest) -> Result<DeviceReply, ServerError> {
        match request {
            DeviceRequest::Read { size } => {
                check_transfer_size(size)?;
                let mut grant = GrantBuffer::zeroed(size);
                self.engine.poll(&mut grant, size)?;
                Ok(DeviceReply::Read(grant.into_inner()))
            }
            DeviceRequest::Write { size, data } => {
                self.reject_after_handoff()?;
                check_transfer_size(size)?;
                let mut grant = GrantBuffer::from_vec(data);
                let consumed = self.engine.feed(&mut grant, size)?;
                Ok(DeviceReply::Written(consumed))
            }
            DeviceRequest::Control { code, payload } => {
                self.reject_after_handoff()?;
                let mut grant = GrantBuffer::from_vec(payload);
                self.engine.control(code, &mut grant)?;
                match ControlCode::from_raw(code) {
                    Some(applied) => Ok(DeviceReply::Controlled(applied)),
                    None => Err(CoreError::UnsupportedOperation { code }.into()),
                }
            }
            DeviceRequest::Info => Ok(DeviceReply::Info(Box::new(self.info()))),
            DeviceRequest::Handoff => self.handoff(),
        }
    }

    fn reject_after_handoff(&self) -> Result<(), ServerError> {
        if self.handed_off {
            return Err(ServerError::ShuttingDown);
        }
        Ok(())
    }

    fn handoff(&mut self) -> Result<DeviceReply, ServerError> {
        self.reject_after_handoff()?;
        publish_snapshot(&self.engine, self.exchange.as_ref())?;
        self.handed_off = true;

        if let Some(ref shutdown) = self.shutdown {
            tracing::info!("Automaton handed off, stopping the host");
            let _ = shutdown.send(());
        }

        Ok(DeviceReply::HandedOff {
            parts: SnapshotPart::ALL.to_vec(),
            current_state: self.engine.current_state(),
        })
    }

    fn info(&self) -> DeviceInfo {
        let config = self.engine.config();
        let stats = self.engine.stats();
        DeviceInfo {
            lifecycle: self.lifecycle,
            current_state: self.engine.current_state(),
            accepting: self.engine.is_accepting(),
            accepting_states: self.engine.accepting().states(),
            configured_transitions: self.engine.table().configured_count(),
            chunk_size: config.chunk_size,
            accept_sentinel: config.accept_sentinel,
            reject_sentinel: config.reject_sentinel,
            reset_on_add_transition: config.reset_on_add_transition,
            symbols_fed: stats.symbols_fed,
            polls: stats.polls,
            control_requests: stats.control_requests,
            restore_error: self.restore_error.clone(),
            handed_off: self.handed_off,
        }
    }
}

fn check_transfer_size(size: usize) -> Result<(), ServerError> {
    if size > MAX_TRANSFER_SIZE {
        return Err(ServerError::InvalidRequest(format!(
            "transfer of {} bytes exceeds the {} byte limit",
            size, MAX_TRANSFER_SIZE
        )));
    }
    Ok(())
}
