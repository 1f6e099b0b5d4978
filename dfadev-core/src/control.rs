//! Control codes and their payloads.
//!
//! Codes follow the BSD ioctl encoding so the request number itself carries
//! the direction and payload length:
//!
//! ```text
//!  31..29   28..16        15..8   7..0
//! +-------+--------------+-------+------+
//! | inout | payload len  | group | num  |
//! +-------+--------------+-------+------+
//! ```
//!
//! | Code             | Payload                 |
//! |------------------|-------------------------|
//! | `DFAIOCRESET`    | none                    |
//! | `DFAIOCADD`      | state, symbol, next     |
//! | `DFAIOCACCEPT`   | state                   |
//! | `DFAIOCREJECT`   | state                   |

use crate::error::CoreError;
use crate::table::{State, Symbol};
use std::fmt;

const IOCPARM_MASK: u32 = 0x1fff;
const IOC_VOID: u32 = 0x2000_0000;
const IOC_IN: u32 = 0x8000_0000;

/// ioctl group for the DFA device.
pub const DFA_IOC_GROUP: u8 = b'z';

const fn ioc(inout: u32, group: u8, num: u8, len: u32) -> u32 {
    inout | ((len & IOCPARM_MASK) << 16) | ((group as u32) << 8) | num as u32
}

/// Reset the current state to 0.
pub const DFAIOCRESET: u32 = ioc(IOC_VOID, DFA_IOC_GROUP, 1, 0);
/// Add a transition (3-byte payload).
pub const DFAIOCADD: u32 = ioc(IOC_IN, DFA_IOC_GROUP, 2, 3);
/// Mark a state accepting (1-byte payload).
pub const DFAIOCACCEPT: u32 = ioc(IOC_IN, DFA_IOC_GROUP, 3, 1);
/// Mark a state rejecting (1-byte payload).
pub const DFAIOCREJECT: u32 = ioc(IOC_IN, DFA_IOC_GROUP, 4, 1);

/// Largest payload of any control code.
pub const MAX_CONTROL_PAYLOAD: usize = 3;

/// A recognized control code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCode {
    Reset,
    AddTransition,
    MarkAccepting,
    MarkRejecting,
}

impl ControlCode {
    /// Maps a raw request number to a code.
    pub fn from_raw(code: u32) -> Option<Self> {
        match code {
            DFAIOCRESET => Some(Self::Reset),
            DFAIOCADD => Some(Self::AddTransition),
            DFAIOCACCEPT => Some(Self::MarkAccepting),
            DFAIOCREJECT => Some(Self::MarkRejecting),
            _ => None,
        }
    }

    pub fn raw(&self) -> u32 {
        match self {
            Self::Reset => DFAIOCRESET,
            Self::AddTransition => DFAIOCADD,
            Self::MarkAccepting => DFAIOCACCEPT,
            Self::MarkRejecting => DFAIOCREJECT,
        }
    }

    /// Exact payload length this code expects.
    pub fn payload_len(&self) -> usize {
        match self {
            Self::Reset => 0,
            Self::AddTransition => 3,
            Self::MarkAccepting | Self::MarkRejecting => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Reset => "RESET",
            Self::AddTransition => "ADD_TRANSITION",
            Self::MarkAccepting => "MARK_ACCEPTING",
            Self::MarkRejecting => "MARK_REJECTING",
        }
    }
}

impl fmt::Display for ControlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded administrative request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    Reset,
    AddTransition {
        state: State,
        symbol: Symbol,
        next: State,
    },
    MarkAccepting(State),
    MarkRejecting(State),
}

impl ControlRequest {
    /// Decodes a raw code and payload.
    ///
    /// Unknown codes are rejected before the payload length is looked at.
    pub fn decode(code: u32, payload: &[u8]) -> Result<Self, CoreError> {
        let code = ControlCode::from_raw(code).ok_or(CoreError::UnsupportedOperation { code })?;
        check_payload_len(code, payload.len())?;

        Ok(match code {
            ControlCode::Reset => Self::Reset,
            ControlCode::AddTransition => Self::AddTransition {
                state: payload[0],
                symbol: payload[1],
                next: payload[2],
            },
            ControlCode::MarkAccepting => Self::MarkAccepting(payload[0]),
            ControlCode::MarkRejecting => Self::MarkRejecting(payload[0]),
        })
    }

    pub fn code(&self) -> ControlCode {
        match self {
            Self::Reset => ControlCode::Reset,
            Self::AddTransition { .. } => ControlCode::AddTransition,
            Self::MarkAccepting(_) => ControlCode::MarkAccepting,
            Self::MarkRejecting(_) => ControlCode::MarkRejecting,
        }
    }

    /// Encodes into a raw code and payload.
    pub fn encode(&self) -> (u32, Vec<u8>) {
        let payload = match *self {
            Self::Reset => Vec::new(),
            Self::AddTransition {
                state,
                symbol,
                next,
            } => vec![state, symbol, next],
            Self::MarkAccepting(state) | Self::MarkRejecting(state) => vec![state],
        };
        (self.code().raw(), payload)
    }
}

/// Fails with `InvalidArgument` unless `len` matches what `code` expects.
pub fn check_payload_len(code: ControlCode, len: usize) -> Result<(), CoreError> {
    let expected = code.payload_len();
    if len != expected {
        return Err(CoreError::InvalidArgument {
            reason: format!("{} payload is {} bytes, expected {}", code, len, expected),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_encoding() {
        assert_eq!(DFAIOCRESET, 0x2000_7a01);
        assert_eq!(DFAIOCADD, 0x8003_7a02);
        assert_eq!(DFAIOCACCEPT, 0x8001_7a03);
        assert_eq!(DFAIOCREJECT, 0x8001_7a04);

        // The payload length is part of the request number.
        for code in [
            ControlCode::Reset,
            ControlCode::AddTransition,
            ControlCode::MarkAccepting,
            ControlCode::MarkRejecting,
        ] {
            let raw = code.raw();
            assert_eq!(((raw >> 16) & IOCPARM_MASK) as usize, code.payload_len());
            assert_eq!(ControlCode::from_raw(raw), Some(code));
        }
    }

    #[test]
    fn test_decode() {
        let req = ControlRequest::decode(DFAIOCADD, &[0, b'a', 1]).unwrap();
        assert_eq!(
            req,
            ControlRequest::AddTransition {
                state: 0,
                symbol: b'a',
                next: 1
            }
        );

        assert_eq!(
            ControlRequest::decode(DFAIOCACCEPT, &[9]).unwrap(),
            ControlRequest::MarkAccepting(9)
        );
        assert_eq!(
            ControlRequest::decode(DFAIOCRESET, &[]).unwrap(),
            ControlRequest::Reset
        );
    }

    #[test]
    fn test_decode_unknown_code() {
        let err = ControlRequest::decode(0x1234, &[1, 2, 3]).unwrap_err();
        assert_eq!(err, CoreError::UnsupportedOperation { code: 0x1234 });
    }

    #[test]
    fn test_decode_wrong_payload_len() {
        let err = ControlRequest::decode(DFAIOCADD, &[0, 1]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));

        let err = ControlRequest::decode(DFAIOCRESET, &[0]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));
    }

    #[test]
    fn test_encode_matches_decode() {
        let req = ControlRequest::MarkRejecting(17);
        let (code, payload) = req.encode();
        assert_eq!(code, DFAIOCREJECT);
        assert_eq!(ControlRequest::decode(code, &payload).unwrap(), req);
    }
}
