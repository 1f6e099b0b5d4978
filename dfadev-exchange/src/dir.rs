//! Directory-backed exchange.
//!
//! Each key is one file. Blobs carry a small header so the incoming process
//! can tell a stale or truncated handoff from a good one:
//!
//! ```text
//! +--------+---------+----------+--------+----------------+
//! | magic  | version | blob_len | crc32c | blob           |
//! | 4 bytes| 2 bytes | 4 bytes  | 4 bytes| blob_len bytes |
//! +--------+---------+----------+--------+----------------+
//! ```

use crate::error::ExchangeError;
use crate::exchange::{validate_key, Exchange};
use bytes::{Buf, BufMut, BytesMut};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Magic bytes identifying exchange blobs: "DFAB"
pub const BLOB_MAGIC: [u8; 4] = *b"DFAB";

/// Current blob format version.
pub const BLOB_FORMAT_VERSION: u16 = 1;

/// Size of the blob header in bytes (4+2+4+4 = 14).
pub const BLOB_HEADER_SIZE: usize = 14;

/// Exchange storing one file per key under a directory.
#[derive(Debug, Clone)]
pub struct DirExchange {
    dir: PathBuf,
}

impl DirExchange {
    /// Opens or creates an exchange at the given directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, ExchangeError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.blob", key))
    }

    fn encode(value: &[u8]) -> BytesMut {
        let mut buf = BytesMut::with_capacity(BLOB_HEADER_SIZE + value.len());
        buf.put_slice(&BLOB_MAGIC);
        buf.put_u16(BLOB_FORMAT_VERSION);
        buf.put_u32(value.len() as u32);
        buf.put_u32(crc32c::crc32c(value));
        buf.put_slice(value);
        buf
    }

    fn decode(key: &str, mut data: &[u8]) -> Result<Vec<u8>, ExchangeError> {
        if data.len() < BLOB_HEADER_SIZE {
            return Err(ExchangeError::Corruption(format!(
                "'{}' is {} bytes, shorter than the blob header",
                key,
                data.len()
            )));
        }

        let mut magic = [0u8; 4];
        data.copy_to_slice(&mut magic);
        if magic != BLOB_MAGIC {
            return Err(ExchangeError::Corruption(format!(
                "'{}' has bad magic {:?}",
                key, magic
            )));
        }

        let version = data.get_u16();
        if version != BLOB_FORMAT_VERSION {
            return Err(ExchangeError::UnsupportedFormat {
                key: key.to_string(),
                version,
            });
        }

        let len = data.get_u32() as usize;
        let expected_crc = data.get_u32();
        if data.len() != len {
            return Err(ExchangeError::Corruption(format!(
                "'{}' declares {} bytes but holds {}",
                key,
                len,
                data.len()
            )));
        }

        let actual_crc = crc32c::crc32c(data);
        if actual_crc != expected_crc {
            return Err(ExchangeError::Corruption(format!(
                "'{}' checksum mismatch (expected {:#x}, got {:#x})",
                key, expected_crc, actual_crc
            )));
        }

        Ok(data.to_vec())
    }
}

impl Exchange for DirExchange {
    fn publish(&self, key: &str, value: &[u8]) -> Result<(), ExchangeError> {
        validate_key(key)?;

        // Write to a sibling and rename so a reader never sees half a blob.
        let path = self.blob_path(key);
        let tmp = self.dir.join(format!(".{}.tmp", key));
        let mut file = File::create(&tmp)?;
        file.write_all(&Self::encode(value))?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;

        tracing::debug!("Published {} bytes under '{}'", value.len(), key);
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Vec<u8>, ExchangeError> {
        validate_key(key)?;
        let data = match fs::read(self.blob_path(key)) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ExchangeError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Self::decode(key, &data)
    }

    fn delete(&self, key: &str) -> Result<(), ExchangeError> {
        validate_key(key)?;
        match fs::remove_file(self.blob_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ExchangeError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
