//! The wire frame: a 4-byte big-endian length prefix followed by exactly
//! that many bytes of encoded [`crate::message::Message`]. Distinct from
//! `qc_02_codec::frame`'s magic-prefixed framing, which is for block
//! files on disk, not peer sessions — there is no magic on the wire here,
//! matching the protocol as specified.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::PeerError;

pub async fn write_frame<W: AsyncWrite + Unpin>(w: &mut W, payload: &[u8]) -> Result<(), PeerError> {
    let len = u32::try_from(payload.len()).map_err(|_| PeerError::FrameTooLarge(u32::MAX))?;
    w.write_all(&len.to_be_bytes()).await?;
    w.write_all(payload).await?;
    w.flush().await?;
    Ok(())
}

/// Reads one frame, rejecting a declared length over `max_frame_bytes`
/// before allocating the buffer for it — an attacker cannot force a large
/// allocation with a four-byte length prefix alone.
pub async fn read_frame<R: AsyncRead + Unpin>(r: &mut R, max_frame_bytes: u32) -> Result<Vec<u8>, PeerError> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > max_frame_bytes {
        return Err(PeerError::FrameTooLarge(len));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf).await?;
    Ok(buf)
}
