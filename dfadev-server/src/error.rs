//! Server error types.

use dfadev_core::CoreError;
use dfadev_exchange::{ExchangeError, HandoffError};
use dfadev_protocol::ErrorCode;
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] dfadev_protocol::ProtocolError),

    #[error("device error: {0}")]
    Core(#[from] CoreError),

    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("handoff failed: {0}")]
    Handoff(#[from] HandoffError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("server shutting down")]
    ShuttingDown,
}

impl ServerError {
    /// Converts to protocol error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ServerError::Io(_) => ErrorCode::InternalError,
            ServerError::Protocol(_) => ErrorCode::BadRequest,
            ServerError::Core(e) => {
                ErrorCode::from_name(e.error_code()).unwrap_or(ErrorCode::InternalError)
            }
            ServerError::Exchange(_) => ErrorCode::PersistenceFault,
            ServerError::Handoff(_) => ErrorCode::PersistenceFault,
            ServerError::Json(_) => ErrorCode::BadRequest,
            ServerError::InvalidRequest(_) => ErrorCode::BadRequest,
            ServerError::ShuttingDown => ErrorCode::ShuttingDown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.error_code().is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_keep_their_code() {
        let cases = [
            (
                CoreError::CopyFault {
                    offset: 0,
                    len: 4,
                    reason: "gone".to_string(),
                },
                ErrorCode::CopyFault,
            ),
            (
                CoreError::UnsupportedOperation { code: 0xdead },
                ErrorCode::UnsupportedOperation,
            ),
            (
                CoreError::InvalidArgument {
                    reason: "short".to_string(),
                },
                ErrorCode::InvalidArgument,
            ),
            (
                CoreError::PersistenceFault {
                    key: "automaton.currentState".to_string(),
                    reason: "missing".to_string(),
                },
                ErrorCode::PersistenceFault,
            ),
        ];

        for (core, code) in cases {
            assert_eq!(ServerError::Core(core).error_code(), code);
        }
    }

    #[test]
    fn test_shutting_down_is_retryable() {
        assert!(ServerError::ShuttingDown.is_retryable());
        assert!(!ServerError::InvalidRequest("x".into()).is_retryable());
    }
}
