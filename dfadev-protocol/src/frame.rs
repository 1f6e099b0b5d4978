//! Binary frame format.
//!
//! Frame layout (16 bytes header + payload):
//!
//! ```text
//! +--------+---------+--------+-------------+--------+-------------------+
//! | magic  | version | flags  | payload_len | crc32c | payload           |
//! | 4 bytes| 2 bytes |2 bytes |   4 bytes   | 4 bytes| payload_len bytes |
//! +--------+---------+--------+-------------+--------+-------------------+
//! ```
//!
//! All integers are big-endian.

use crate::error::ProtocolError;
use crate::{MAX_PAYLOAD_SIZE, PROTOCOL_VERSION};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Magic bytes identifying dfadev frames: "DFAX"
pub const MAGIC: [u8; 4] = *b"DFAX";

/// Size of the fixed frame header in bytes (4+2+2+4+4 = 16).
pub const FRAME_HEADER_SIZE: usize = 16;

/// Frame flags bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags(u16);

impl FrameFlags {
    /// The crc32c field covers the payload.
    pub const CRC_PRESENT: u16 = 1 << 0;

    const VALID_V1_MASK: u16 = Self::CRC_PRESENT;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn with_crc(mut self) -> Self {
        self.0 |= Self::CRC_PRESENT;
        self
    }

    pub fn has_crc(&self) -> bool {
        self.0 & Self::CRC_PRESENT != 0
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn from_bits(bits: u16) -> Result<Self, ProtocolError> {
        if bits & !Self::VALID_V1_MASK != 0 {
            return Err(ProtocolError::InvalidFlags(bits));
        }
        Ok(Self(bits))
    }
}

/// A parsed frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub version: u16,
    pub flags: FrameFlags,
    /// JSON message body.
    pub payload: Bytes,
}

/// Header fields read ahead of the payload.
struct Header {
    version: u16,
    flags: FrameFlags,
    payload_len: usize,
    crc: u32,
}

impl Header {
    /// Parses the fixed header without consuming it.
    fn peek(buf: &[u8]) -> Result<Self, ProtocolError> {
        let mut cursor = &buf[..FRAME_HEADER_SIZE];

        let mut magic = [0u8; 4];
        cursor.copy_to_slice(&mut magic);
        if magic != MAGIC {
            return Err(ProtocolError::InvalidMagic(magic));
        }

        let version = cursor.get_u16();
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let flags = FrameFlags::from_bits(cursor.get_u16())?;

        let payload_len = cursor.get_u32();
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(Self {
            version,
            flags,
            payload_len: payload_len as usize,
            crc: cursor.get_u32(),
        })
    }
}

impl Frame {
    /// Creates a checksummed frame around `payload`.
    pub fn new(payload: Bytes) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            flags: FrameFlags::new().with_crc(),
            payload,
        }
    }

    pub fn from_json<T: serde::Serialize>(value: &T) -> Result<Self, ProtocolError> {
        let payload = serde_json::to_vec(value)?;
        Ok(Self::new(Bytes::from(payload)))
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        if self.payload.len() > MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::FrameTooLarge {
                size: u32::try_from(self.payload.len()).unwrap_or(u32::MAX),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let crc = if self.flags.has_crc() {
            crc32c::crc32c(&self.payload)
        } else {
            0
        };

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        buf.put_slice(&MAGIC);
        buf.put_u16(self.version);
        buf.put_u16(self.flags.bits());
        buf.put_u32(self.payload.len() as u32);
        buf.put_u32(crc);
        buf.put_slice(&self.payload);
        Ok(buf)
    }

    /// Decodes one frame from the front of `buf`.
    ///
    /// Returns `Ok(None)` and leaves `buf` untouched until a whole frame is
    /// buffered.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let header = Header::peek(buf)?;
        if buf.len() < FRAME_HEADER_SIZE + header.payload_len {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(header.payload_len).freeze();

        if header.flags.has_crc() {
            let actual = crc32c::crc32c(&payload);
            if actual != header.crc {
                return Err(ProtocolError::CrcMismatch {
                    expected: header.crc,
                    actual,
                });
            }
        }

        Ok(Some(Self {
            version: header.version,
            flags: header.flags,
            payload,
        }))
    }
}
