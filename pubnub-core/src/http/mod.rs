//! The HTTP/1.1 response reader (§4.2): status line, headers,
//! `Content-Length` / chunked bodies, and optional gzip inflate.

mod chunked;
mod gzip;
mod response_reader;
mod status_line;

pub use chunked::read_chunked_body;
pub use gzip::inflate_gzip;
pub use response_reader::{read_response, ParsedResponse};
pub use status_line::{HeaderMap, StatusLine};
