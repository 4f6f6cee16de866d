//! gzip inflate for `Content-Encoding: gzip` response bodies.
//!
//! Always decompresses into a separate scratch buffer rather than in
//! place over the RX buffer (§9 design note: "Gzip inflate operating in
//! place on the same buffer is fragile; specification allows an auxiliary
//! buffer").

use std::io::Read;

use flate2::read::GzDecoder;

use crate::error::PubnubError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const DEFLATE_METHOD: u8 = 0x08;

/// Inflate a complete gzip member, validating the header fields the spec
/// calls out explicitly (magic, method, flag byte, `ISIZE`) in addition to
/// flate2's own CRC-32/`ISIZE` trailer check, and rejecting any byte left
/// over after the declared stream.
pub fn inflate_gzip(input: &[u8]) -> Result<Vec<u8>, PubnubError> {
    if input.len() < 18 {
        return Err(PubnubError::BadCompressionFormat(
            "gzip stream shorter than the minimum header+trailer size".into(),
        ));
    }
    if input[0..2] != GZIP_MAGIC {
        return Err(PubnubError::BadCompressionFormat(
            "bad gzip magic bytes".into(),
        ));
    }
    if input[2] != DEFLATE_METHOD {
        return Err(PubnubError::BadCompressionFormat(
            "unsupported gzip compression method".into(),
        ));
    }
    let flags = input[3];
    if flags != 0 {
        return Err(PubnubError::BadCompressionFormat(format!(
            "unsupported gzip flag byte: {:#x}",
            flags
        )));
    }

    let mut decoder = GzDecoder::new(input);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| PubnubError::BadCompressionFormat(format!("gzip inflate failed: {}", e)))?;

    let remaining = decoder.into_inner();
    if !remaining.is_empty() {
        return Err(PubnubError::BadCompressionFormat(
            "trailing bytes after declared gzip stream length".into(),
        ));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn gzip_encode(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn round_trips_a_simple_payload() {
        let payload = br#"[[{"a":1}],"123"]"#;
        let compressed = gzip_encode(payload);
        let out = inflate_gzip(&compressed).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut compressed = gzip_encode(b"hello");
        compressed[0] = 0x00;
        assert!(matches!(
            inflate_gzip(&compressed),
            Err(PubnubError::BadCompressionFormat(_))
        ));
    }

    #[test]
    fn rejects_tampered_isize() {
        let mut compressed = gzip_encode(b"hello world, this is a test payload");
        let len = compressed.len();
        // ISIZE is the last 4 bytes, little-endian.
        compressed[len - 4] ^= 0xff;
        assert!(matches!(
            inflate_gzip(&compressed),
            Err(PubnubError::BadCompressionFormat(_))
        ));
    }

    #[test]
    fn rejects_trailing_byte() {
        let mut compressed = gzip_encode(b"hello");
        compressed.push(0x00);
        assert!(matches!(
            inflate_gzip(&compressed),
            Err(PubnubError::BadCompressionFormat(_))
        ));
    }
}
