// Copyright (C) 2022-2024 Webb Technologies Inc.
//
// Tangle is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Tangle is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should receive a copy of the GNU General Public License
// If not, see <http://www.gnu.org/licenses/>.

use ethers::types::{H256, U256};
use webb_relayer_utils::{Error, Result};

/// A forward-only cursor over a big-endian, fixed width payload.
///
/// Every read fails with [`Error::MalformedPayload`] instead of reading past the end.
#[derive(Debug)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader at the start of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// The current read position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Reads exactly `len` bytes.
    pub fn take(&mut self, len: usize, field: &str) -> Result<&'a [u8]> {
        let end = self.offset.checked_add(len).ok_or_else(|| {
            Error::malformed(format!("{field}: length overflow"))
        })?;
        let slice = self.bytes.get(self.offset..end).ok_or_else(|| {
            Error::malformed(format!(
                "{field}: need {len} bytes at offset {}, only {} left",
                self.offset,
                self.bytes.len().saturating_sub(self.offset)
            ))
        })?;
        self.offset = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, field: &str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    /// Reads a single byte.
    pub fn u8(&mut self, field: &str) -> Result<u8> {
        Ok(self.array::<1>(field)?[0])
    }

    /// Reads a big-endian `u16`.
    pub fn u16(&mut self, field: &str) -> Result<u16> {
        self.array(field).map(u16::from_be_bytes)
    }

    /// Reads a big-endian `u32`.
    pub fn u32(&mut self, field: &str) -> Result<u32> {
        self.array(field).map(u32::from_be_bytes)
    }

    /// Reads a big-endian `u64`.
    pub fn u64(&mut self, field: &str) -> Result<u64> {
        self.array(field).map(u64::from_be_bytes)
    }

    /// Reads a big-endian 256-bit unsigned integer.
    pub fn u256(&mut self, field: &str) -> Result<U256> {
        self.take(32, field).map(U256::from_big_endian)
    }

    /// Reads a 32 bytes word, used for addresses and hashes.
    pub fn bytes32(&mut self, field: &str) -> Result<H256> {
        self.array::<32>(field).map(H256::from)
    }

    /// Everything that was not read yet.
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = &self.bytes[self.offset.min(self.bytes.len())..];
        self.offset = self.bytes.len();
        rest
    }

    /// Fails if any byte is left unread.
    pub fn finish(self, what: &str) -> Result<()> {
        let left = self.bytes.len().saturating_sub(self.offset);
        if left == 0 {
            Ok(())
        } else {
            Err(Error::malformed(format!(
                "{what}: {left} trailing bytes after offset {}",
                self.offset
            )))
        }
    }
}

/// Appends a big-endian 256-bit unsigned integer.
pub(crate) fn put_u256(out: &mut Vec<u8>, value: U256) {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    out.extend_from_slice(&word);
}
