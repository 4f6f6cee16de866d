//! Query-string assembly: `pnsdk` is always present, `uuid`/`auth` are
//! added only when set, and the `?`/`&` boundary is always correct
//! regardless of which optional parameters are present.

use crate::url_encode::{url_encode_extended, UrlEncodeExtension};

/// An ordered multimap of query parameters.
///
/// Insertion order is preserved (a `Vec` of pairs, not a `HashMap`) so
/// that `pnsdk` can always be emitted first and the wire-level request in
/// §8's literal scenarios is byte-for-byte reproducible in tests.
#[derive(Debug, Default, Clone)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Start building a query string, seeding it with the mandatory SDK
    /// identity parameter.
    #[must_use]
    pub fn new(pnsdk: &str) -> Self {
        let mut params = Self::default();
        params.push_raw("pnsdk", pnsdk);
        params
    }

    /// Add `key=value`, percent-encoding the value as a non-channel query
    /// value. No-op for an empty value unless `allow_empty` callers opt in
    /// via [`QueryParams::push_raw`].
    pub fn push(&mut self, key: &str, value: &str) -> &mut Self {
        let encoded = url_encode_extended(value.as_bytes(), UrlEncodeExtension::NonChannelPath);
        self.push_raw(key, &encoded)
    }

    /// Add `key=value` with `value` assumed to already be in its final
    /// wire form (e.g. a previously-encoded channel list, or a bare
    /// integer).
    pub fn push_raw(&mut self, key: &str, value: &str) -> &mut Self {
        self.pairs.push((key.to_string(), value.to_string()));
        self
    }

    /// Add `key=value` only if `value` is `Some`.
    pub fn push_opt(&mut self, key: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.push(key, value);
        }
        self
    }

    /// Render `?k=v&k=v&...`. Returns just `""` if no parameters were ever
    /// pushed (which cannot happen once [`QueryParams::new`] has run,
    /// since `pnsdk` is always present).
    #[must_use]
    pub fn to_query_string(&self) -> String {
        if self.pairs.is_empty() {
            return String::new();
        }
        let mut out = String::from("?");
        for (i, (k, v)) in self.pairs.iter().enumerate() {
            if i > 0 {
                out.push('&');
            }
            out.push_str(k);
            out.push('=');
            out.push_str(v);
        }
        out
    }

    /// Number of bytes the rendered query string will occupy. Used by the
    /// Transaction State Machine to decide `tx_buff_too_small` before
    /// writing into the fixed TX buffer.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.to_query_string().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pnsdk_always_first_and_leading_question_mark() {
        let params = QueryParams::new("PubNub-Rust/0.1.0");
        assert_eq!(params.to_query_string(), "?pnsdk=PubNub-Rust%2F0.1.0");
    }

    #[test]
    fn optional_params_appended_with_ampersand() {
        let mut params = QueryParams::new("sdk");
        params.push("uuid", "test_id");
        params.push_opt("auth", None);
        params.push_opt("auth", Some("secret"));
        assert_eq!(
            params.to_query_string(),
            "?pnsdk=sdk&uuid=test_id&auth=secret"
        );
    }

    #[test]
    fn raw_values_are_not_re_encoded() {
        let mut params = QueryParams::new("sdk");
        params.push_raw("channel-group", "g1,g2");
        assert_eq!(params.to_query_string(), "?pnsdk=sdk&channel-group=g1,g2");
    }
}
