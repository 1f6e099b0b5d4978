//! Client error types.

use dfadev_protocol::ErrorCode;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] dfadev_protocol::ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    #[error("server error: {code} - {message}")]
    ServerError {
        code: ErrorCode,
        message: String,
        retryable: bool,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Io(_) => true,
            ClientError::Timeout => true,
            ClientError::ConnectionClosed => true,
            ClientError::ServerError { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Protocol error code, if the server answered with one.
    pub fn server_code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::ServerError { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        let err = ClientError::ServerError {
            code: ErrorCode::ShuttingDown,
            message: "server shutting down".to_string(),
            retryable: true,
        };
        assert!(err.is_retryable());
        assert_eq!(err.server_code(), Some(ErrorCode::ShuttingDown));

        assert!(!ClientError::NotConnected.is_retryable());
        assert!(ClientError::Timeout.is_retryable());
        assert_eq!(ClientError::Timeout.server_code(), None);
    }
}
