//! Chunked transfer-encoding body reader.
//!
//! Each chunk is `hex-length CRLF chunk-bytes CRLF`; a zero-length chunk
//! ends the body. A chunk whose declared length would overflow the RX
//! buffer capacity — or whose cumulative total would — is `io_error`, per
//! §4.2.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::buffer::RxBuffer;
use crate::error::PubnubError;
use crate::http::response_reader::read_crlf_line;

/// Read a complete chunked body off `socket`, enforcing `capacity` as the
/// maximum total decoded size.
pub async fn read_chunked_body<S>(socket: &mut S, capacity: usize) -> Result<Vec<u8>, PubnubError>
where
    S: AsyncRead + Unpin,
{
    let mut body = RxBuffer::fixed(capacity);

    loop {
        let size_line = read_crlf_line(socket).await?;
        let size_token = size_line
            .split(';')
            .next()
            .unwrap_or("")
            .trim();
        let chunk_len = usize::from_str_radix(size_token, 16).map_err(|_| {
            PubnubError::IoError(format!("malformed chunk length: {:?}", size_token))
        })?;

        if chunk_len == 0 {
            // Trailer headers (if any) followed by the final CRLF; PubNub
            // endpoints never send trailers, but drain them defensively.
            loop {
                let trailer = read_crlf_line(socket).await?;
                if trailer.is_empty() {
                    break;
                }
            }
            break;
        }

        let mut chunk = vec![0u8; chunk_len];
        socket
            .read_exact(&mut chunk)
            .await
            .map_err(PubnubError::from)?;
        body.extend(&chunk)?;

        // Each chunk's data is followed by a CRLF that isn't part of the
        // payload.
        let trailing = read_crlf_line(socket).await?;
        if !trailing.is_empty() {
            return Err(PubnubError::IoError(
                "malformed chunk terminator".to_string(),
            ));
        }
    }

    Ok(body.as_slice().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn reads_two_chunks_then_terminator() {
        let mut wire = Cursor::new(
            b"0d\r\n[[1234,\"Da\"],\r\n14\r\n\"14179915548467106\"]\r\n0\r\n\r\n".to_vec(),
        );
        let body = read_chunked_body(&mut wire, 4096).await.unwrap();
        assert_eq!(body, b"[[1234,\"Da\"],\"14179915548467106\"]".to_vec());
    }

    #[tokio::test]
    async fn rejects_chunk_exceeding_capacity() {
        let mut wire = Cursor::new(b"10\r\n0123456789abcdef\r\n0\r\n\r\n".to_vec());
        let result = read_chunked_body(&mut wire, 8).await;
        assert!(matches!(result, Err(PubnubError::IoError(_))));
    }

    #[tokio::test]
    async fn empty_body_is_just_the_terminator() {
        let mut wire = Cursor::new(b"0\r\n\r\n".to_vec());
        let body = read_chunked_body(&mut wire, 4096).await.unwrap();
        assert!(body.is_empty());
    }
}
