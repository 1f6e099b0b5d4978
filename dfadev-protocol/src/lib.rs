//! # dfadev-protocol
//!
//! Wire protocol for talking to a dfadev host.
//!
//! This crate provides:
//! - Binary framing with length prefix and CRC32C validation
//! - JSON request/response envelopes for the device dispatch contract
//! - Stable error codes

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::{Decoder, Encoder};
pub use error::{ErrorCode, ProtocolError};
pub use frame::{Frame, FrameFlags, FRAME_HEADER_SIZE, MAGIC};
pub use message::{Operation, Request, Response, ResponseError, ResponseStatus};

/// Protocol version supported by this implementation.
pub const PROTOCOL_VERSION: u16 = 1;

/// Default port for the dfadev host.
pub const DEFAULT_PORT: u16 = 7411;

/// Maximum frame payload size (4 MiB).
///
/// A hex-encoded WRITE doubles its data, so this bounds a single feed to
/// roughly 2 MiB of symbols.
pub const MAX_PAYLOAD_SIZE: u32 = 4 * 1024 * 1024;
