//! Protocol error types and error codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while framing or parsing messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid magic bytes: expected 'DFAX', got {0:?}")]
    InvalidMagic([u8; 4]),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u16),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("CRC mismatch: expected {expected:#x}, got {actual:#x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("invalid frame flags: {0:#x}")]
    InvalidFlags(u16),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid UTF-8 in payload")]
    InvalidUtf8,
}

/// Stable error codes carried in error responses.
///
/// The device-level codes mirror the engine's error kinds one to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Request errors
    BadRequest,

    // Device errors
    CopyFault,
    UnsupportedOperation,
    InvalidArgument,
    PersistenceFault,

    // Host errors
    InternalError,
    ShuttingDown,
}

impl ErrorCode {
    /// Parses a code from its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "BAD_REQUEST" => ErrorCode::BadRequest,
            "COPY_FAULT" => ErrorCode::CopyFault,
            "UNSUPPORTED_OPERATION" => ErrorCode::UnsupportedOperation,
            "INVALID_ARGUMENT" => ErrorCode::InvalidArgument,
            "PERSISTENCE_FAULT" => ErrorCode::PersistenceFault,
            "INTERNAL_ERROR" => ErrorCode::InternalError,
            "SHUTTING_DOWN" => ErrorCode::ShuttingDown,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::CopyFault => "COPY_FAULT",
            ErrorCode::UnsupportedOperation => "UNSUPPORTED_OPERATION",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::PersistenceFault => "PERSISTENCE_FAULT",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::ShuttingDown => "SHUTTING_DOWN",
        }
    }

    /// Returns whether retrying against another host may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::ShuttingDown | ErrorCode::InternalError)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ErrorCode; 7] = [
        ErrorCode::BadRequest,
        ErrorCode::CopyFault,
        ErrorCode::UnsupportedOperation,
        ErrorCode::InvalidArgument,
        ErrorCode::PersistenceFault,
        ErrorCode::InternalError,
        ErrorCode::ShuttingDown,
    ];

    #[test]
    fn test_display_matches_serde() {
        for code in ALL {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code));
            assert_eq!(ErrorCode::from_name(code.as_str()), Some(code));
        }
        assert_eq!(ErrorCode::from_name("NOT_A_CODE"), None);
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorCode::ShuttingDown.is_retryable());
        assert!(!ErrorCode::CopyFault.is_retryable());
        assert!(!ErrorCode::UnsupportedOperation.is_retryable());
        assert!(!ErrorCode::InvalidArgument.is_retryable());
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::InvalidMagic(*b"XXXX");
        assert!(err.to_string().contains("magic"));

        let err = ProtocolError::CrcMismatch {
            expected: 0xABC,
            actual: 0xDEF,
        };
        assert!(err.to_string().contains("0xabc"));

        let err = ProtocolError::FrameTooLarge { size: 100, max: 50 };
        assert!(err.to_string().contains("100"));
    }
}
