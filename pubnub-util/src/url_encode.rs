//! Percent-encoding tuned to the two contexts PubNub URLs need it in.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Bytes that must never be escaped inside a single path segment that is
/// itself a list of comma-separated subscribables (channels/groups): the
/// comma is kept literal so the server can still split the list, every
/// other reserved byte is escaped.
const CHANNEL_PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'^')
    .add(b'|')
    .add(b'\\')
    .add(b'[')
    .add(b']')
    .add(b'&')
    .add(b'+')
    .add(b';')
    .add(b'=');

/// Bytes that must never be escaped in a query-parameter value or a
/// non-channel path segment (message payloads, state JSON, filter
/// expressions): everything outside the URL-unreserved set is escaped,
/// including the comma (it has no special meaning here).
const NON_CHANNEL: &AsciiSet = CHANNEL_PATH_SEGMENT.add(b',');

/// Which encoding table to apply.
///
/// PubNub channel/group lists use commas as a list separator, so a comma
/// inside that context is kept literal. Everywhere else (message bodies,
/// `state` JSON, `filter-expr`) a comma is just another byte to escape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlEncodeExtension {
    /// Encoding a single subscribable inside a comma-joined list.
    Channel,
    /// Encoding anything else that lands in a path segment or query value.
    NonChannelPath,
}

/// Percent-encode `input` for the given context.
///
/// Never double-encodes a literal `%`: the underlying `percent-encoding`
/// crate always treats `%` itself as reserved and escapes it, so running
/// this twice changes the output (by design — callers must encode raw
/// user data exactly once).
#[must_use]
pub fn url_encode_extended(input: &[u8], ext: UrlEncodeExtension) -> String {
    let set = match ext {
        UrlEncodeExtension::Channel => CHANNEL_PATH_SEGMENT,
        UrlEncodeExtension::NonChannelPath => NON_CHANNEL,
    };
    // percent-encoding operates on UTF-8 str; PubNub payloads in practice
    // are always valid UTF-8 JSON/text, so a lossy fallback only affects
    // inputs that were already invalid to send as-is.
    let text = String::from_utf8_lossy(input);
    utf8_percent_encode(&text, set).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_keeps_comma_literal() {
        let encoded = url_encode_extended(b"ch1,ch2", UrlEncodeExtension::Channel);
        assert_eq!(encoded, "ch1,ch2");
    }

    #[test]
    fn non_channel_escapes_comma() {
        let encoded = url_encode_extended(b"a,b", UrlEncodeExtension::NonChannelPath);
        assert_eq!(encoded, "a%2Cb");
    }

    #[test]
    fn percent_is_never_double_encoded_in_a_single_pass() {
        let encoded = url_encode_extended(b"100%", UrlEncodeExtension::NonChannelPath);
        assert_eq!(encoded, "100%25");
    }

    #[test]
    fn ascii_printable_round_trips_through_percent_decode() {
        let input: Vec<u8> = (0x20u8..=0x7e).collect();
        let encoded = url_encode_extended(&input, UrlEncodeExtension::NonChannelPath);
        let decoded = percent_encoding::percent_decode_str(&encoded)
            .decode_utf8()
            .unwrap();
        assert_eq!(decoded.as_bytes(), input.as_slice());
    }
}
