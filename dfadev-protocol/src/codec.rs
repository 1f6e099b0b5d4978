//! Encoder and decoder for frames and messages.

use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::message::{Request, Response};
use bytes::BytesMut;
use serde::de::DeserializeOwned;

/// Encodes messages into frames.
pub struct Encoder;

impl Encoder {
    pub fn encode_request(request: &Request) -> Result<BytesMut, ProtocolError> {
        Frame::from_json(request)?.encode()
    }

    pub fn encode_response(response: &Response) -> Result<BytesMut, ProtocolError> {
        Frame::from_json(response)?.encode()
    }
}

/// Incremental decoder over a byte stream.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Appends received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        Frame::decode(&mut self.buffer)
    }

    pub fn decode_request(&mut self) -> Result<Option<Request>, ProtocolError> {
        self.decode_json()
    }

    pub fn decode_response(&mut self) -> Result<Option<Response>, ProtocolError> {
        self.decode_json()
    }

    fn decode_json<T: DeserializeOwned>(&mut self) -> Result<Option<T>, ProtocolError> {
        let Some(frame) = self.decode_frame()? else {
            return Ok(None);
        };
        let payload = std::str::from_utf8(&frame.payload).map_err(|_| ProtocolError::InvalidUtf8)?;
        Ok(Some(serde_json::from_str(payload)?))
    }

    /// Number of bytes buffered but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
