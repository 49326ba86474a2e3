//! Length-delimited framing: a 4-byte big-endian length prefix followed by
//! a `bincode`-encoded payload.

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frames longer than this are rejected without allocating a buffer for
/// them, so a corrupt or hostile length prefix cannot exhaust memory.
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Errors from encoding, decoding, or moving bytes over the wire.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] bincode::Error),

    #[error("frame length {0} exceeds the maximum of {MAX_FRAME_LEN}")]
    FrameTooLarge(u32),

    #[error("peer closed the connection")]
    Eof,
}

/// Writes one length-delimited, `bincode`-encoded frame.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = bincode::serialize(value)?;
    let len: u32 = payload
        .len()
        .try_into()
        .map_err(|_| CodecError::FrameTooLarge(u32::MAX))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-delimited, `bincode`-encoded frame. Returns
/// `Err(CodecError::Eof)` if the peer closed the connection cleanly before
/// any bytes of a new frame arrived.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, CodecError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(CodecError::Eof),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(bincode::deserialize(&payload)?)
}
