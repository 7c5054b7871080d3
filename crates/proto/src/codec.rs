//! Length-prefixed postcard framing.

use std::io::{Error as IoError, ErrorKind};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::types::IpcFrame;

/// Frames larger than this are rejected as corrupt rather than allocated.
const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Writes one frame: u32-le length prefix, then the postcard body.
///
/// # Errors
///
/// Returns the underlying I/O error, or `InvalidData` if encoding fails.
pub async fn write_frame<W>(writer: &mut W, frame: &IpcFrame) -> std::io::Result<()>
where
	W: AsyncWrite + Unpin,
{
	let buf = postcard::to_allocvec(frame)
		.map_err(|e| IoError::new(ErrorKind::InvalidData, e.to_string()))?;
	writer.write_u32_le(buf.len() as u32).await?;
	writer.write_all(&buf).await?;
	writer.flush().await?;
	Ok(())
}

/// Reads one frame. `UnexpectedEof` at a frame boundary is a clean
/// disconnect.
///
/// # Errors
///
/// Returns the underlying I/O error, or `InvalidData` for oversized or
/// undecodable frames.
pub async fn read_frame<R>(reader: &mut R) -> std::io::Result<IpcFrame>
where
	R: AsyncRead + Unpin,
{
	let len = reader.read_u32_le().await?;
	if len > MAX_FRAME_LEN {
		return Err(IoError::new(ErrorKind::InvalidData, "frame too large"));
	}
	let mut buf = vec![0u8; len as usize];
	reader.read_exact(&mut buf).await?;
	postcard::from_bytes(&buf).map_err(|e| IoError::new(ErrorKind::InvalidData, e.to_string()))
}
