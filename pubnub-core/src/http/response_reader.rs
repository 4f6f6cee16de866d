//! Top-level response grammar: status line, headers, then whichever body
//! framing the headers declare.
//!
//! ```text
//! response  := status-line CRLF header* CRLF body
//! body      := content-length-body | chunked-body | <read-until-close>
//! ```

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::buffer::RxBuffer;
use crate::error::PubnubError;
use crate::http::chunked::read_chunked_body;
use crate::http::gzip::inflate_gzip;
use crate::http::status_line::{HeaderMap, StatusLine};

/// A fully parsed, fully framed HTTP response: status, headers, and the
/// (already gzip-decoded, if applicable) body.
#[derive(Debug, Clone)]
pub struct ParsedResponse {
    /// The parsed status line.
    pub status: StatusLine,
    /// Headers in arrival order, looked up case-insensitively.
    pub headers: HeaderMap,
    /// The response body, decompressed if `Content-Encoding: gzip` was
    /// present.
    pub body: Vec<u8>,
}

/// Read one complete response off `socket`.
///
/// `rx_capacity` bounds the body (chunked or `Content-Length`) the same
/// way the context's RX buffer would; a body that would not fit is
/// `io_error`, matching §4.2 and §8 property 2.
pub async fn read_response<S>(
    socket: &mut S,
    rx_capacity: usize,
) -> Result<ParsedResponse, PubnubError>
where
    S: AsyncRead + Unpin,
{
    let status_text = read_crlf_line(socket).await?;
    if status_text.is_empty() {
        return Err(PubnubError::IoError(
            "connection closed before a status line arrived".into(),
        ));
    }
    let status = StatusLine::parse(&status_text)?;

    let mut headers = HeaderMap::new();
    loop {
        let line = read_crlf_line(socket).await?;
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = HeaderMap::parse_line(&line) {
            headers.insert(name, value);
        }
    }

    let is_chunked = headers.has_token("Transfer-Encoding", "chunked");
    let content_length = headers
        .get("Content-Length")
        .map(|v| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| PubnubError::IoError(format!("malformed Content-Length: {}", v)))
        })
        .transpose()?;

    let mut body = if is_chunked {
        read_chunked_body(socket, rx_capacity).await?
    } else if let Some(len) = content_length {
        let mut rx = RxBuffer::fixed(rx_capacity);
        if len > rx.capacity() {
            return Err(PubnubError::IoError(format!(
                "Content-Length {} exceeds RX buffer capacity {}",
                len, rx_capacity
            )));
        }
        let mut buf = vec![0u8; len];
        socket.read_exact(&mut buf).await.map_err(PubnubError::from)?;
        rx.extend(&buf)?;
        rx.as_slice().to_vec()
    } else {
        if status.code >= 400 {
            return Err(PubnubError::IoError(
                "error response with neither Content-Length nor chunked framing".into(),
            ));
        }
        read_until_close(socket, rx_capacity).await?
    };

    if headers.has_token("Content-Encoding", "gzip") {
        body = inflate_gzip(&body)?;
    }

    Ok(ParsedResponse {
        status,
        headers,
        body,
    })
}

/// Read bytes until the peer closes the connection, bounded by `capacity`.
async fn read_until_close<S>(socket: &mut S, capacity: usize) -> Result<Vec<u8>, PubnubError>
where
    S: AsyncRead + Unpin,
{
    let mut body = RxBuffer::fixed(capacity);
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.map_err(PubnubError::from)?;
        if n == 0 {
            break;
        }
        body.extend(&chunk[..n])?;
    }
    Ok(body.as_slice().to_vec())
}

/// Read a single CRLF- (or bare-LF-) terminated line, returning it with
/// the line terminator stripped. An immediate EOF with nothing read is
/// returned as an empty string (callers distinguish "no status line at
/// all" themselves, per §4.5: "`read_status` expecting the first byte but
/// getting TCP close produces `io_error`").
pub(crate) async fn read_crlf_line<S>(socket: &mut S) -> Result<String, PubnubError>
where
    S: AsyncRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        let byte = socket.read_u8().await;
        match byte {
            Ok(b'\n') => break,
            Ok(b) => line.push(b),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof && line.is_empty() => {
                return Ok(String::new())
            }
            Err(e) => return Err(PubnubError::from(e)),
        }
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8(line)
        .map_err(|_| PubnubError::IoError("non-UTF-8 bytes in header line".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn parses_content_length_body() {
        let mut wire = Cursor::new(
            b"HTTP/1.1 200 OK\r\nContent-Length: 30\r\n\r\n[1,\"Sent\",\"14178940800777403\"]"
                .to_vec(),
        );
        let response = read_response(&mut wire, 4096).await.unwrap();
        assert_eq!(response.status.code, 200);
        assert_eq!(response.body, br#"[1,"Sent","14178940800777403"]"#.to_vec());
    }

    #[tokio::test]
    async fn parses_chunked_body() {
        let mut wire = Cursor::new(
            b"HTTP/1.1 200\r\nTransfer-Encoding: chunked\r\n\r\n0d\r\n[[1234,\"Da\"],\r\n14\r\n\"14179915548467106\"]\r\n0\r\n\r\n".to_vec(),
        );
        let response = read_response(&mut wire, 4096).await.unwrap();
        assert_eq!(
            response.body,
            b"[[1234,\"Da\"],\"14179915548467106\"]".to_vec()
        );
    }

    #[tokio::test]
    async fn content_length_over_capacity_is_io_error() {
        let mut wire = Cursor::new(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n".to_vec());
        let result = read_response(&mut wire, 10).await;
        assert!(matches!(result, Err(PubnubError::IoError(_))));
    }

    #[tokio::test]
    async fn error_status_without_framing_headers_is_io_error() {
        let mut wire = Cursor::new(b"HTTP/1.1 500 Internal Server Error\r\n\r\n".to_vec());
        let result = read_response(&mut wire, 4096).await;
        assert!(matches!(result, Err(PubnubError::IoError(_))));
    }

    #[tokio::test]
    async fn http_0_9_is_rejected() {
        let mut wire = Cursor::new(b"HTTP/0.9 200 OK\r\n\r\n".to_vec());
        let result = read_response(&mut wire, 4096).await;
        assert!(result.is_err());
    }
}
