//! Frame sources
//!
//! The pacer consumes a stream of `Option<Bytes>`: `Some(frame)` is one 20ms
//! Opus frame, `None` means the encoder had nothing for this tick. Stored
//! frames use a 2-byte big-endian length prefix; a zero length encodes a
//! `None` tick.

use bytes::{BufMut, Bytes};
use futures_util::stream::{self, Stream};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Largest frame representable with a 16-bit length prefix
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Read one length-prefixed frame; `Ok(None)` at a clean end of input
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Option<Option<Bytes>>> {
    let len = match reader.read_u16().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };

    if len == 0 {
        return Ok(Some(None));
    }

    let mut frame = vec![0u8; len];
    reader.read_exact(&mut frame).await?;
    Ok(Some(Some(Bytes::from(frame))))
}

/// Stream frames from `reader` until end of input
///
/// Read errors end the stream after a warning.
pub fn length_prefixed<R>(reader: R) -> impl Stream<Item = Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    stream::unfold(reader, |mut reader| async move {
        match read_frame(&mut reader).await {
            Ok(Some(frame)) => Some((frame, reader)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "frame source failed");
                None
            }
        }
    })
}

/// Append `frame` to `out` with its length prefix
pub fn encode_frame(frame: Option<&[u8]>, out: &mut Vec<u8>) -> io::Result<()> {
    let frame = frame.unwrap_or_default();
    if frame.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame of {} bytes exceeds {}", frame.len(), MAX_FRAME_LEN),
        ));
    }

    out.put_u16(frame.len() as u16);
    out.put_slice(frame);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_stream_frames() {
        let mut encoded = Vec::new();
        encode_frame(Some(&b"one"[..]), &mut encoded).unwrap();
        encode_frame(None, &mut encoded).unwrap();
        encode_frame(Some(&b"three"[..]), &mut encoded).unwrap();

        let frames: Vec<_> = length_prefixed(&encoded[..]).collect().await;
        assert_eq!(
            frames,
            vec![
                Some(Bytes::from_static(b"one")),
                None,
                Some(Bytes::from_static(b"three"))
            ]
        );
    }

    #[tokio::test]
    async fn test_truncated_input_ends_stream() {
        let mut encoded = Vec::new();
        encode_frame(Some(&b"whole"[..]), &mut encoded).unwrap();
        encoded.extend_from_slice(&[0x00, 0x10, 0x01]);

        let frames: Vec<_> = length_prefixed(&encoded[..]).collect().await;
        assert_eq!(frames, vec![Some(Bytes::from_static(b"whole"))]);
    }

    #[test]
    fn test_encode_rejects_oversized() {
        let frame = vec![0u8; MAX_FRAME_LEN + 1];
        assert!(encode_frame(Some(&frame[..]), &mut Vec::new()).is_err());
    }
}
