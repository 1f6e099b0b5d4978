//! Core error types.

use thiserror::Error;

/// Host status numbers for hosts that report failures as errno values.
pub mod errno {
    pub const EIO: i32 = 5;
    pub const EFAULT: i32 = 14;
    pub const EINVAL: i32 = 22;
    pub const ENOTTY: i32 = 25;
}

/// Errors from the automaton engine.
///
/// Table and accepting-set lookups cannot fail: every index is a byte.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("copy fault at offset {offset} ({len} bytes): {reason}")]
    CopyFault {
        offset: usize,
        len: usize,
        reason: String,
    },

    #[error("unsupported operation: control code {code:#010x}")]
    UnsupportedOperation { code: u32 },

    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("persistence fault on '{key}': {reason}")]
    PersistenceFault { key: String, reason: String },
}

impl CoreError {
    /// Returns an error code suitable for protocol responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::CopyFault { .. } => "COPY_FAULT",
            CoreError::UnsupportedOperation { .. } => "UNSUPPORTED_OPERATION",
            CoreError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            CoreError::PersistenceFault { .. } => "PERSISTENCE_FAULT",
        }
    }

    /// Returns the errno a character-device host would report.
    pub fn errno(&self) -> i32 {
        match self {
            CoreError::CopyFault { .. } => errno::EFAULT,
            CoreError::UnsupportedOperation { .. } => errno::ENOTTY,
            CoreError::InvalidArgument { .. } => errno::EINVAL,
            CoreError::PersistenceFault { .. } => errno::EIO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = CoreError::UnsupportedOperation { code: 0xdead };
        assert_eq!(err.error_code(), "UNSUPPORTED_OPERATION");
        assert_eq!(err.errno(), errno::ENOTTY);
        assert!(err.to_string().contains("0x0000dead"));

        let err = CoreError::InvalidArgument {
            reason: "payload is 2 bytes, expected 3".to_string(),
        };
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
        assert_eq!(err.errno(), errno::EINVAL);

        let err = CoreError::CopyFault {
            offset: 8,
            len: 4,
            reason: "out of range".to_string(),
        };
        assert_eq!(err.error_code(), "COPY_FAULT");
        assert_eq!(err.errno(), errno::EFAULT);

        let err = CoreError::PersistenceFault {
            key: "automaton.currentState".to_string(),
            reason: "not found".to_string(),
        };
        assert_eq!(err.error_code(), "PERSISTENCE_FAULT");
        assert!(err.to_string().contains("automaton.currentState"));
    }
}
