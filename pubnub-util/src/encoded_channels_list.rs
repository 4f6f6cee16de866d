//! Assembly of comma-separated, percent-encoded channel/channel-group lists.

use crate::url_encode::{url_encode_extended, UrlEncodeExtension};

/// Join and percent-encode a list of subscribables (channel or channel
/// group names) the way every presence/subscribe endpoint expects them:
/// each name escaped individually, then joined with a literal comma.
///
/// An empty slice encodes to the literal string `","`-free empty string;
/// callers that require at least one subscribable validate that before
/// reaching here (see `pubnub_core::transaction::endpoint`).
#[must_use]
pub fn encoded_channels_list(channels: &[String]) -> String {
    channels
        .iter()
        .map(|channel| url_encode_extended(channel.as_bytes(), UrlEncodeExtension::Channel))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_with_literal_comma() {
        assert_eq!(
            encoded_channels_list(&["lim".to_string(), "morava".to_string(), "lim".to_string()]),
            "lim,morava,lim"
        );
    }

    #[test]
    fn escapes_each_member_independently() {
        assert_eq!(
            encoded_channels_list(&["a b".to_string(), "c,d".to_string()]),
            "a%20b,c%2Cd"
        );
    }

    #[test]
    fn empty_list_is_empty_string() {
        assert_eq!(encoded_channels_list(&[]), "");
    }
}
