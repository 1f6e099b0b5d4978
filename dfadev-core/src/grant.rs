//! Caller memory windows.
//!
//! The engine never touches caller memory directly. Every byte crosses a
//! [`CallerBuffer`], and any copy may fail, which aborts the current request.

use crate::error::CoreError;

/// A window of caller memory the engine copies through.
pub trait CallerBuffer {
    /// Size of the window in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies `dst.len()` bytes starting at `offset` from the caller.
    fn copy_in(&mut self, offset: usize, dst: &mut [u8]) -> Result<(), CoreError>;

    /// Copies `src` to the caller starting at `offset`.
    fn copy_out(&mut self, offset: usize, src: &[u8]) -> Result<(), CoreError>;
}

/// An owned, bounds-checked caller window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantBuffer {
    data: Vec<u8>,
}

impl GrantBuffer {
    /// Wraps bytes supplied by the caller.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Creates a zero-filled window for the engine to write into.
    pub fn zeroed(len: usize) -> Self {
        Self { data: vec![0; len] }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    fn range(&self, offset: usize, len: usize) -> Result<std::ops::Range<usize>, CoreError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(offset..end),
            _ => Err(CoreError::CopyFault {
                offset,
                len,
                reason: format!("grant is only {} bytes", self.data.len()),
            }),
        }
    }
}

impl From<Vec<u8>> for GrantBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

impl From<&[u8]> for GrantBuffer {
    fn from(data: &[u8]) -> Self {
        Self::from_vec(data.to_vec())
    }
}

impl CallerBuffer for GrantBuffer {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn copy_in(&mut self, offset: usize, dst: &mut [u8]) -> Result<(), CoreError> {
        let range = self.range(offset, dst.len())?;
        dst.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn copy_out(&mut self, offset: usize, src: &[u8]) -> Result<(), CoreError> {
        let range = self.range(offset, src.len())?;
        self.data[range].copy_from_slice(src);
        Ok(())
    }
}
