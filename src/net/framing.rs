//! Length-prefixed framing for the game stream
//!
//! Format: `[4 bytes little-endian length][JSON payload]`
//!
//! Client frames are capped tighter than server frames, which carry whole-room
//! results.

use std::io;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::game::constants::net::{MAX_MESSAGE_SIZE, MAX_OUTBOUND_MESSAGE_SIZE};
use crate::net::protocol::{encode, EncodeError};

/// Errors that can occur during message framing
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Message too large: {0} bytes (max {1})")]
    MessageTooLarge(usize, usize),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Read one frame's payload
pub async fn read_message<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Vec<u8>, FramingError> {
    let mut len_buf = [0u8; 4];
    read_exact_or_closed(stream, &mut len_buf).await?;

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(FramingError::MessageTooLarge(len, MAX_MESSAGE_SIZE));
    }

    let mut buf = vec![0u8; len];
    if len > 0 {
        read_exact_or_closed(stream, &mut buf).await?;
    }
    Ok(buf)
}

async fn read_exact_or_closed<R: AsyncRead + Unpin>(
    stream: &mut R,
    buf: &mut [u8],
) -> Result<(), FramingError> {
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(FramingError::ConnectionClosed),
        Err(e) => Err(FramingError::Io(e)),
    }
}

/// Write one frame
pub async fn write_message<W: AsyncWrite + Unpin>(
    stream: &mut W,
    data: &[u8],
) -> Result<(), FramingError> {
    if data.len() > MAX_OUTBOUND_MESSAGE_SIZE {
        return Err(FramingError::MessageTooLarge(
            data.len(),
            MAX_OUTBOUND_MESSAGE_SIZE,
        ));
    }

    stream.write_all(&(data.len() as u32).to_le_bytes()).await?;
    stream.write_all(data).await?;
    stream.flush().await?;
    Ok(())
}

/// Encode a message as JSON and write it as one frame
///
/// Returns the payload size.
pub async fn write_json<W, T>(stream: &mut W, message: &T) -> Result<usize, FramingError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let data = encode(message)?;
    write_message(stream, &data).await?;
    Ok(data.len())
}
