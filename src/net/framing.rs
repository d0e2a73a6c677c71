//! Length-prefixed JSON framing
//!
//! Each frame is `[u32 little-endian length][JSON payload]`. The length
//! prefix lets a plain TCP stream carry discrete messages.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::game::constants::net::MAX_MESSAGE_SIZE;
use crate::net::protocol::{decode, encode, ClientMessage, DecodeError, EncodeError, ServerMessage};

/// Errors that can occur during message framing
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Message too large: {0} bytes (max {1})")]
    MessageTooLarge(usize, usize),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FramingError {
    /// The stream is unusable and the connection should be dropped
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FramingError::Decode(_))
    }
}

/// Read one frame's payload
pub async fn read_frame<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Vec<u8>, FramingError> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(FramingError::ConnectionClosed);
        }
        Err(e) => return Err(FramingError::Io(e)),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(FramingError::MessageTooLarge(len, MAX_MESSAGE_SIZE));
    }
    if len == 0 {
        return Ok(Vec::new());
    }

    let mut buf = vec![0u8; len];
    match stream.read_exact(&mut buf).await {
        Ok(_) => Ok(buf),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(FramingError::ConnectionClosed),
        Err(e) => Err(FramingError::Io(e)),
    }
}

/// Write one frame and flush
pub async fn write_frame<W: AsyncWrite + Unpin>(
    stream: &mut W,
    data: &[u8],
) -> Result<(), FramingError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(FramingError::MessageTooLarge(data.len(), MAX_MESSAGE_SIZE));
    }

    stream.write_all(&(data.len() as u32).to_le_bytes()).await?;
    stream.write_all(data).await?;
    stream.flush().await?;
    Ok(())
}

/// Read and decode the next client message.
///
/// A frame that does not decode yields [`FramingError::Decode`]; the stream
/// itself stays aligned, so callers may keep reading.
pub async fn read_client_message<R: AsyncRead + Unpin>(
    stream: &mut R,
) -> Result<ClientMessage, FramingError> {
    let payload = read_frame(stream).await?;
    Ok(decode(&payload)?)
}

pub async fn write_server_message<W: AsyncWrite + Unpin>(
    stream: &mut W,
    message: &ServerMessage,
) -> Result<(), FramingError> {
    let payload = encode(message)?;
    write_frame(stream, &payload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity::Heading;
    use tokio_test::io::Builder;

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut out = (payload.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    #[tokio::test]
    async fn test_read_frame() {
        let mut stream = Builder::new().read(&framed(b"hello")).build();
        assert_eq!(read_frame(&mut stream).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_read_frame_split_across_reads() {
        let bytes = framed(b"split payload");
        let mut stream = Builder::new().read(&bytes[..3]).read(&bytes[3..9]).read(&bytes[9..]).build();
        assert_eq!(read_frame(&mut stream).await.unwrap(), b"split payload");
    }

    #[tokio::test]
    async fn test_read_closed() {
        let mut stream = Builder::new().build();
        assert!(matches!(read_frame(&mut stream).await, Err(FramingError::ConnectionClosed)));

        let mut truncated = Builder::new().read(&10u32.to_le_bytes()).read(b"abc").build();
        assert!(matches!(read_frame(&mut truncated).await, Err(FramingError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_read_oversized() {
        let len = (MAX_MESSAGE_SIZE as u32 + 1).to_le_bytes();
        let mut stream = Builder::new().read(&len).build();
        assert!(matches!(
            read_frame(&mut stream).await,
            Err(FramingError::MessageTooLarge(_, MAX_MESSAGE_SIZE))
        ));
    }

    #[tokio::test]
    async fn test_write_oversized_rejected() {
        let mut stream = Builder::new().build();
        let data = vec![0u8; MAX_MESSAGE_SIZE + 1];
        assert!(matches!(
            write_frame(&mut stream, &data).await,
            Err(FramingError::MessageTooLarge(_, _))
        ));
    }

    #[tokio::test]
    async fn test_read_client_message() {
        let mut stream = Builder::new()
            .read(&framed(br#"{"type":"turn","x":5,"y":6,"dir":"down"}"#))
            .read(&framed(b"garbage"))
            .read(&framed(br#"{"type":"join"}"#))
            .build();

        assert_eq!(
            read_client_message(&mut stream).await.unwrap(),
            ClientMessage::Turn { x: 5.0, y: 6.0, dir: Heading::Down }
        );
        let err = read_client_message(&mut stream).await.unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(read_client_message(&mut stream).await.unwrap(), ClientMessage::Join);
    }

    #[tokio::test]
    async fn test_write_server_message() {
        let message = ServerMessage::Delete { id: 3 };
        let payload = encode(&message).unwrap();
        let mut stream = Builder::new().write(&framed(&payload)).build();
        write_server_message(&mut stream, &message).await.unwrap();
    }
}
