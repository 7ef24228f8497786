//! On-disk block framing: 4-byte magic, 4-byte big-endian length, payload.

use crate::reader::MAX_VAR_LEN;
use crate::{CodecError, CodecResult};

pub const MAGIC: [u8; 4] = *b"QCB1";

/// Frame `payload` as `magic || len(payload) as u32-BE || payload`.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Decode one frame from the start of `bytes`, returning the payload and the
/// total number of bytes consumed (header + payload) so callers can advance
/// a cursor over a file containing many consecutive frames.
pub fn decode_frame(bytes: &[u8]) -> CodecResult<(&[u8], usize)> {
    if bytes.len() < 8 {
        return Err(CodecError::Malformed("frame header truncated"));
    }
    if bytes[..4] != MAGIC {
        return Err(CodecError::Malformed("bad frame magic"));
    }
    let len = u32::from_be_bytes(bytes[4..8].try_into().unwrap());
    if len > MAX_VAR_LEN {
        return Err(CodecError::Malformed("frame payload too large"));
    }
    let len = len as usize;
    if bytes.len() < 8 + len {
        return Err(CodecError::Malformed("frame payload truncated"));
    }
    Ok((&bytes[8..8 + len], 8 + len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let payload = b"a serialized block goes here";
        let framed = encode_frame(payload);
        let (decoded, consumed) = decode_frame(&framed).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(consumed, framed.len());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut framed = encode_frame(b"payload");
        framed[0] ^= 0xFF;
        assert!(decode_frame(&framed).is_err());
    }

    #[test]
    fn rejects_truncated_payload() {
        let framed = encode_frame(b"payload");
        assert!(decode_frame(&framed[..framed.len() - 1]).is_err());
    }

    #[test]
    fn decodes_consecutive_frames() {
        let mut buf = encode_frame(b"first");
        buf.extend(encode_frame(b"second"));

        let (first, n1) = decode_frame(&buf).unwrap();
        assert_eq!(first, b"first");
        let (second, _n2) = decode_frame(&buf[n1..]).unwrap();
        assert_eq!(second, b"second");
    }
}
