//! Request handlers.
//!
//! Translates protocol requests into device requests for the dispatcher and
//! device replies back into protocol responses.

use crate::dispatcher::{DeviceReply, DeviceRequest, DispatcherHandle};
use crate::error::ServerError;
use dfadev_protocol::message::*;
use dfadev_protocol::PROTOCOL_VERSION;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// Host identity reported by INFO.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "dfadev".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Command handler.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    dispatcher: DispatcherHandle,
    info: ServerInfo,
}

impl CommandHandler {
    pub fn new(dispatcher: DispatcherHandle) -> Self {
        Self {
            dispatcher,
            info: ServerInfo::default(),
        }
    }

    pub fn with_info(mut self, info: ServerInfo) -> Self {
        self.info = info;
        self
    }

    /// Handles a request and returns a response.
    pub async fn handle(&self, request: &Request) -> Response {
        let result = match request.op {
            Operation::Ping => Ok(json!({"pong": true})),
            Operation::Info => self.handle_info().await,
            Operation::Read => self.handle_read(request).await,
            Operation::Write => self.handle_write(request).await,
            Operation::Control => self.handle_control(request).await,
            Operation::Handoff => self.handle_handoff().await,
        };

        match result {
            Ok(value) => Response::ok(&request.id, value),
            Err(e) => {
                tracing::debug!("Request {} ({:?}) failed: {}", request.id, request.op, e);
                let mut error = ResponseError::new(e.error_code(), e.to_string());
                if let ServerError::Core(ref core) = e {
                    error = error.with_detail("errno", core.errno());
                }
                Response::error(&request.id, error)
            }
        }
    }

    fn params<T: DeserializeOwned>(request: &Request) -> Result<T, ServerError> {
        request
            .parse_params()
            .map_err(|e| ServerError::InvalidRequest(e.to_string()))
    }

    async fn handle_info(&self) -> Result<Value, ServerError> {
        let DeviceReply::Info(info) = self.dispatcher.call(DeviceRequest::Info).await? else {
            return Err(unexpected_reply("INFO"));
        };

        let result = InfoResult {
            server_name: self.info.name.clone(),
            server_version: self.info.version.clone(),
            protocol_version: PROTOCOL_VERSION,
            lifecycle: info.lifecycle.to_string(),
            current_state: info.current_state,
            accepting: info.accepting,
            accepting_states: info.accepting_states,
            configured_transitions: info.configured_transitions,
            chunk_size: info.chunk_size,
            accept_sentinel: info.accept_sentinel,
            reject_sentinel: info.reject_sentinel,
            reset_on_add_transition: info.reset_on_add_transition,
            symbols_fed: info.symbols_fed,
            polls: info.polls,
            control_requests: info.control_requests,
            restore_error: info.restore_error,
        };
        Ok(serde_json::to_value(result)?)
    }

    async fn handle_read(&self, request: &Request) -> Result<Value, ServerError> {
        let params: ReadParams = Self::params(request)?;
        let reply = self
            .dispatcher
            .call(DeviceRequest::Read { size: params.size })
            .await?;

        match reply {
            DeviceReply::Read(data) => Ok(serde_json::to_value(ReadResult { data })?),
            _ => Err(unexpected_reply("READ")),
        }
    }

    async fn handle_write(&self, request: &Request) -> Result<Value, ServerError> {
        let params: WriteParams = Self::params(request)?;
        let reply = self
            .dispatcher
            .call(DeviceRequest::Write {
                size: params.size,
                data: params.data,
            })
            .await?;

        match reply {
            DeviceReply::Written(consumed) => Ok(serde_json::to_value(WriteResult { consumed })?),
            _ => Err(unexpected_reply("WRITE")),
        }
    }

    async fn handle_control(&self, request: &Request) -> Result<Value, ServerError> {
        let params: ControlParams = Self::params(request)?;
        let reply = self
            .dispatcher
            .call(DeviceRequest::Control {
                code: params.code,
                payload: params.payload,
            })
            .await?;

        match reply {
            DeviceReply::Controlled(code) => Ok(serde_json::to_value(ControlResult {
                applied: code.name().to_string(),
            })?),
            _ => Err(unexpected_reply("CONTROL")),
        }
    }

    async fn handle_handoff(&self) -> Result<Value, ServerError> {
        match self.dispatcher.call(DeviceRequest::Handoff).await? {
            DeviceReply::HandedOff {
                parts,
                current_state,
            } => Ok(serde_json::to_value(HandoffResult {
                published: parts.iter().map(|p| p.key().to_string()).collect(),
                current_state,
            })?),
            _ => Err(unexpected_reply("HANDOFF")),
        }
    }
}

fn unexpected_reply(op: &str) -> ServerError {
    ServerError::InvalidRequest(format!("dispatcher answered {} with the wrong reply", op))
}
