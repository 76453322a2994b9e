//! Length-prefixed framing for the native messaging stream.
//!
//! Wire format: `[4-byte little-endian length][JSON payload]`. The bridge
//! never parses the JSON; the length prefix is the only structure it reads.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame accepted from the native peer.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    TooLarge(usize),
    #[error("stream ended mid-frame")]
    Truncated,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Read one frame. `Ok(None)` is a clean end-of-stream at a frame boundary;
/// EOF anywhere inside a frame is [`FrameError::Truncated`].
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = reader.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(FrameError::Truncated);
        }
        filled += n;
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            FrameError::Truncated
        } else {
            FrameError::Io(e)
        }
    })?;

    Ok(Some(payload))
}

/// Write one frame and flush it.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge(payload.len()))?;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip() {
        let mut buf = Vec::new();
        write_frame(&mut buf, br#"{"error":1,"message":"No Reader"}"#)
            .await
            .unwrap();

        let mut reader = buf.as_slice();
        let frame = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(frame, br#"{"error":1,"message":"No Reader"}"#);

        // Nothing left: clean EOF
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn length_prefix_is_little_endian() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hi").await.unwrap();
        assert_eq!(buf, vec![2, 0, 0, 0, b'h', b'i']);
    }

    #[tokio::test]
    async fn empty_stream_is_clean_eof() {
        let mut reader: &[u8] = &[];
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_inside_length_prefix_is_truncated() {
        let mut reader: &[u8] = &[5, 0];
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(FrameError::Truncated)
        ));
    }

    #[tokio::test]
    async fn eof_inside_payload_is_truncated() {
        let mut reader: &[u8] = &[5, 0, 0, 0, b'a', b'b'];
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(FrameError::Truncated)
        ));
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected_without_reading_it() {
        let len = (MAX_FRAME_LEN as u32 + 1).to_le_bytes();
        let mut reader: &[u8] = &len;
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(FrameError::TooLarge(_))
        ));
    }

    #[tokio::test]
    async fn frames_arriving_in_pieces_reassemble() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"first").await.unwrap();
        write_frame(&mut buf, b"second").await.unwrap();

        // tokio_test's mock splits the stream into separate reads
        let mut reader = tokio_test::io::Builder::new()
            .read(&buf[..3])
            .read(&buf[3..10])
            .read(&buf[10..])
            .build();

        assert_eq!(read_frame(&mut reader).await.unwrap().unwrap(), b"first");
        assert_eq!(read_frame(&mut reader).await.unwrap().unwrap(), b"second");
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }
}
