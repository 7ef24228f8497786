//! Bounds-checked big-endian byte reader.

use crate::{CodecError, CodecResult};

/// Variable-length fields longer than this are rejected before allocating,
/// so a malicious length prefix can't be used to exhaust memory.
pub const MAX_VAR_LEN: u32 = 64 * 1024 * 1024;

pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn expect_exhausted(&self) -> CodecResult<()> {
        if self.remaining() != 0 {
            return Err(CodecError::Malformed("trailing bytes after record"));
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(CodecError::Malformed("unexpected end of input"));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> CodecResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes(b.try_into().unwrap()))
    }

    pub fn u32(&mut self) -> CodecResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes(b.try_into().unwrap()))
    }

    pub fn u64(&mut self) -> CodecResult<u64> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes(b.try_into().unwrap()))
    }

    pub fn u128(&mut self) -> CodecResult<u128> {
        let b = self.take(16)?;
        Ok(u128::from_be_bytes(b.try_into().unwrap()))
    }

    pub fn i64(&mut self) -> CodecResult<i64> {
        let b = self.take(8)?;
        Ok(i64::from_be_bytes(b.try_into().unwrap()))
    }

    pub fn fixed_bytes<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let b = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(b);
        Ok(out)
    }

    pub fn fixed_vec(&mut self, n: usize) -> CodecResult<Vec<u8>> {
        Ok(self.take(n)?.to_vec())
    }

    pub fn var_bytes(&mut self) -> CodecResult<Vec<u8>> {
        let len = self.u32()?;
        if len > MAX_VAR_LEN {
            return Err(CodecError::Malformed("variable-length field too large"));
        }
        Ok(self.take(len as usize)?.to_vec())
    }

    pub fn var_str(&mut self) -> CodecResult<String> {
        let bytes = self.var_bytes()?;
        String::from_utf8(bytes).map_err(|_| CodecError::Malformed("field is not valid UTF-8"))
    }

    /// Count-prefixed sequence, decoding each element with `decode_one`.
    pub fn seq<T>(
        &mut self,
        mut decode_one: impl FnMut(&mut Self) -> CodecResult<T>,
    ) -> CodecResult<Vec<T>> {
        let count = self.u32()?;
        if count > MAX_VAR_LEN {
            return Err(CodecError::Malformed("sequence too long"));
        }
        let mut out = Vec::with_capacity((count as usize).min(4096));
        for _ in 0..count {
            out.push(decode_one(self)?);
        }
        Ok(out)
    }
}
