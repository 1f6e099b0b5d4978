//! JSON message types for requests and responses.

use crate::error::{ErrorCode, ProtocolError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Operations understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Ping,
    Info,

    // Device dispatch contract
    Read,
    Write,
    Control,

    /// Publish the automaton to the exchange and stop serving.
    Handoff,
}

/// Request message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Message type, always "request".
    #[serde(rename = "type")]
    pub msg_type: String,

    /// Request ID for correlation.
    pub id: String,

    pub op: Operation,

    #[serde(default)]
    pub params: Value,
}

impl Request {
    pub fn new(id: impl Into<String>, op: Operation) -> Self {
        Self {
            msg_type: "request".to_string(),
            id: id.into(),
            op,
            params: Value::Object(Default::default()),
        }
    }

    pub fn with_params<T: Serialize>(mut self, params: &T) -> Result<Self, ProtocolError> {
        self.params = serde_json::to_value(params)?;
        Ok(self)
    }

    /// Parses the params object into an operation-specific type.
    pub fn parse_params<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        Ok(serde_json::from_value(self.params.clone())?)
    }
}

/// Response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// Error details in a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: ErrorCode,

    pub message: String,

    pub retryable: bool,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, Value>,
}

impl ResponseError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            retryable: code.is_retryable(),
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Response message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Message type, always "response".
    #[serde(rename = "type")]
    pub msg_type: String,

    pub id: String,

    pub status: ResponseStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl Response {
    pub fn ok(id: impl Into<String>, result: Value) -> Self {
        Self {
            msg_type: "response".to_string(),
            id: id.into(),
            status: ResponseStatus::Ok,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: impl Into<String>, error: ResponseError) -> Self {
        Self {
            msg_type: "response".to_string(),
            id: id.into(),
            status: ResponseStatus::Error,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    pub fn is_error(&self) -> bool {
        self.status == ResponseStatus::Error
    }

    /// Parses the result object into an operation-specific type.
    pub fn parse_result<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let value = self.result.clone().unwrap_or(Value::Null);
        Ok(serde_json::from_value(value)?)
    }
}

/// Serializes byte strings as lowercase hex.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Operation-specific parameter types
// ============================================================================

/// Parameters for READ. Reads poll the verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadParams {
    /// Accepted for the dispatch contract, ignored by the device.
    #[serde(default)]
    pub offset: u64,
    pub size: usize,
}

/// Result for READ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResult {
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

/// Parameters for WRITE. Writes feed symbols.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteParams {
    /// Accepted for the dispatch contract, ignored by the device.
    #[serde(default)]
    pub offset: u64,
    /// Number of symbols to feed. A size larger than `data` faults once the
    /// supplied bytes run out.
    pub size: usize,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl WriteParams {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            offset: 0,
            size: data.len(),
            data,
        }
    }
}

/// Result for WRITE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResult {
    pub consumed: usize,
}

/// Parameters for CONTROL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlParams {
    pub code: u32,
    #[serde(default, with = "hex_bytes")]
    pub payload: Vec<u8>,
}

/// Result for CONTROL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResult {
    /// Name of the applied control code.
    pub applied: String,
}

/// Result for INFO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResult {
    pub server_name: String,
    pub server_version: String,
    pub protocol_version: u16,
    /// How the host was started: fresh, restart or live_update.
    pub lifecycle: String,
    pub current_state: u8,
    pub accepting: bool,
    pub accepting_states: Vec<u8>,
    pub configured_transitions: usize,
    pub chunk_size: usize,
    pub accept_sentinel: u8,
    pub reject_sentinel: u8,
    pub reset_on_add_transition: bool,
    pub symbols_fed: u64,
    pub polls: u64,
    pub control_requests: u64,
    /// Set when the live-update restore did not complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_error: Option<String>,
}

/// Result for HANDOFF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffResult {
    /// Exchange keys written, in publish order.
    pub published: Vec<String>,
    pub current_state: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::new("1", Operation::Ping);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""op":"PING""#));
        assert!(json.contains(r#""type":"request""#));
    }

    #[test]
    fn test_write_params_hex() {
        let req = Request::new("7", Operation::Write)
            .with_params(&WriteParams::new(b"ab\x00\xff".to_vec()))
            .unwrap();
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""data":"616200ff""#));
        assert!(json.contains(r#""size":4"#));

        let parsed: WriteParams = req.parse_params().unwrap();
        assert_eq!(parsed.data, b"ab\x00\xff");
        assert_eq!(parsed.offset, 0);
    }

    #[test]
    fn test_control_params_defaults() {
        let req: Request =
            serde_json::from_str(r#"{"type":"request","id":"1","op":"CONTROL","params":{"code":536902145}}"#)
                .unwrap();
        let params: ControlParams = req.parse_params().unwrap();
        assert_eq!(params.code, 0x20007a01);
        assert!(params.payload.is_empty());
    }

    #[test]
    fn test_bad_hex_rejected() {
        let req = Request::new("1", Operation::Write)
            .with_params(&serde_json::json!({"size": 1, "data": "zz"}))
            .unwrap();
        assert!(req.parse_params::<WriteParams>().is_err());
    }

    #[test]
    fn test_read_params_offset_optional() {
        let req = Request::new("1", Operation::Read)
            .with_params(&serde_json::json!({"size": 3}))
            .unwrap();
        let params: ReadParams = req.parse_params().unwrap();
        assert_eq!((params.offset, params.size), (0, 3));
    }

    #[test]
    fn test_response_ok_serialization() {
        let resp = Response::ok("1", serde_json::json!({"pong": true}));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""status":"ok""#));
        assert!(!json.contains("error"));
        assert!(resp.is_ok());
    }

    #[test]
    fn test_response_error_serialization() {
        let err = ResponseError::new(ErrorCode::UnsupportedOperation, "unsupported operation")
            .with_detail("code", 0xdeadu32);
        let resp = Response::error("1", err);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""code":"UNSUPPORTED_OPERATION""#));
        assert!(json.contains(r#""retryable":false"#));
        assert!(resp.is_error());
    }

    #[test]
    fn test_parse_read_result() {
        let resp = Response::ok("1", serde_json::json!({"data": "595959"}));
        let result: ReadResult = resp.parse_result().unwrap();
        assert_eq!(result.data, b"YYY");
    }
}
