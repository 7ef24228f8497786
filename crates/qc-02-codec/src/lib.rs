//! Deterministic binary codec for every on-wire and on-disk record.
//!
//! Fixed field order, big-endian fixed-width integers, length-prefixed
//! variable-length fields. `decode` is the only fallible direction: any
//! truncation, trailing garbage, or out-of-range length fails closed with
//! [`CodecError::Malformed`] rather than panicking or silently accepting
//! partial data.

mod frame;
mod primitives;
mod reader;
mod writer;

pub use frame::{decode_frame, encode_frame, MAGIC};
pub use reader::Reader;
pub use writer::Writer;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed encoding: {0}")]
    Malformed(&'static str),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// A record with a deterministic canonical encoding.
///
/// `decode(encode(x)) == x` for every value produced by `encode`; `decode`
/// must reject anything `encode` would not have produced (trailing bytes,
/// out-of-range lengths, non-canonical variable-length prefixes).
pub trait Encode: Sized {
    fn encode(&self, w: &mut Writer);

    fn decode(r: &mut Reader) -> CodecResult<Self>;

    /// Encode to a freshly allocated buffer.
    fn encode_to_vec(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.encode(&mut w);
        w.into_bytes()
    }

    /// Decode from a byte slice, requiring the entire slice to be consumed.
    fn decode_from_slice(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = Reader::new(bytes);
        let value = Self::decode(&mut r)?;
        r.expect_exhausted()?;
        Ok(value)
    }
}
