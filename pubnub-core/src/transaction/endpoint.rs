//! One small request-shape struct per operation (§6.1), grounded in the
//! `TransportRequest { path, query_parameters, method }` shape from the
//! modern official SDK: a path template plus a query-parameter map, kept
//! separate from the state machine that actually drives the bytes.

use pubnub_util::encoded_channels_list::encoded_channels_list;
use pubnub_util::query_params::QueryParams;
use pubnub_util::url_encode::{url_encode_extended, UrlEncodeExtension};

/// HTTP method an endpoint is sent with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`, no body.
    Get,
    /// `POST`, with a body (publish only, when gzip-compressed payload
    /// is enabled).
    Post,
}

/// A fully built request, ready for the transaction state machine to
/// turn into request-line/headers/body bytes.
#[derive(Debug, Clone)]
pub struct EndpointRequest {
    /// `Get` or `Post`.
    pub method: Method,
    /// The absolute path, not including the query string.
    pub path: String,
    /// Query parameters in insertion order (already percent-encoded
    /// where the wire format requires it).
    pub query: QueryParams,
    /// The request body, for [`Method::Post`].
    pub body: Option<Vec<u8>>,
}

impl EndpointRequest {
    /// The path plus `?query` (or just the path, with no trailing `?`,
    /// if there are no query parameters).
    #[must_use]
    pub fn path_and_query(&self) -> String {
        format!("{}{}", self.path, self.query.to_query_string())
    }
}

fn channels_path_segment(channels: &[String]) -> String {
    encoded_channels_list(channels)
}

fn encode_segment(raw: &str) -> String {
    url_encode_extended(raw.as_bytes(), UrlEncodeExtension::NonChannelPath)
}

/// `GET /time/0`.
#[must_use]
pub fn time(pnsdk: &str, uuid: &str) -> EndpointRequest {
    let mut query = QueryParams::new(pnsdk);
    query.push("uuid", uuid);
    EndpointRequest {
        method: Method::Get,
        path: "/time/0".to_string(),
        query,
        body: None,
    }
}

/// `GET|POST /publish/<pub>/<sub>/0/<channel>/0/<message>`.
#[must_use]
pub fn publish(
    pnsdk: &str,
    publish_key: &str,
    subscribe_key: &str,
    channel: &str,
    message_json: &str,
    use_post: bool,
    uuid: &str,
    auth: Option<&str>,
) -> EndpointRequest {
    let channel = encode_segment(channel);
    let mut query = QueryParams::new(pnsdk);
    query.push("uuid", uuid);
    query.push_opt("auth", auth);

    if use_post {
        EndpointRequest {
            method: Method::Post,
            path: format!(
                "/publish/{}/{}/0/{}/0",
                publish_key, subscribe_key, channel
            ),
            query,
            body: Some(message_json.as_bytes().to_vec()),
        }
    } else {
        let message = encode_segment(message_json);
        EndpointRequest {
            method: Method::Get,
            path: format!(
                "/publish/{}/{}/0/{}/0/{}",
                publish_key, subscribe_key, channel, message
            ),
            query,
            body: None,
        }
    }
}

/// `GET /signal/<pub>/<sub>/0/<channel>/0/<message>`.
#[must_use]
pub fn signal(
    pnsdk: &str,
    publish_key: &str,
    subscribe_key: &str,
    channel: &str,
    message_json: &str,
    uuid: &str,
) -> EndpointRequest {
    let channel = encode_segment(channel);
    let message = encode_segment(message_json);
    let mut query = QueryParams::new(pnsdk);
    query.push("uuid", uuid);
    EndpointRequest {
        method: Method::Get,
        path: format!(
            "/signal/{}/{}/0/{}/0/{}",
            publish_key, subscribe_key, channel, message
        ),
        query,
        body: None,
    }
}

/// `GET /subscribe/<sub>/<channels>/0/<tt>` — the legacy (v1) long-poll
/// path template (§6). The Subscribe Event Engine (§4.6) always drives
/// [`subscribe_v2`]; this is kept as a standalone, directly callable
/// request shape for the v1 wire format itself.
#[must_use]
pub fn subscribe_v1(
    pnsdk: &str,
    subscribe_key: &str,
    channels: &[String],
    timetoken: &str,
    uuid: &str,
) -> EndpointRequest {
    let mut query = QueryParams::new(pnsdk);
    query.push("uuid", uuid);
    EndpointRequest {
        method: Method::Get,
        path: format!(
            "/subscribe/{}/{}/0/{}",
            subscribe_key,
            channels_path_segment(channels),
            timetoken
        ),
        query,
        body: None,
    }
}

/// `GET /v2/subscribe/<sub>/<channels>/0?tt=&tr=&filter-expr=&heartbeat=`.
#[must_use]
pub fn subscribe_v2(
    pnsdk: &str,
    subscribe_key: &str,
    channels: &[String],
    channel_groups: &[String],
    timetoken: &str,
    region: &str,
    filter_expr: Option<&str>,
    heartbeat: Option<u32>,
    uuid: &str,
    auth: Option<&str>,
) -> EndpointRequest {
    let mut query = QueryParams::new(pnsdk);
    query.push("tt", timetoken);
    if !region.is_empty() {
        query.push("tr", region);
    }
    if !channel_groups.is_empty() {
        query.push("channel-group", &channels_path_segment(channel_groups));
    }
    if let Some(expr) = filter_expr {
        query.push("filter-expr", &encode_segment(expr));
    }
    if let Some(hb) = heartbeat {
        query.push("heartbeat", &hb.to_string());
    }
    query.push("uuid", uuid);
    query.push_opt("auth", auth);

    EndpointRequest {
        method: Method::Get,
        path: format!(
            "/v2/subscribe/{}/{}/0",
            subscribe_key,
            channels_path_segment(channels)
        ),
        query,
        body: None,
    }
}

/// `GET /v2/presence/sub-key/<sub>/channel/<channels>/leave`.
#[must_use]
pub fn leave(
    pnsdk: &str,
    subscribe_key: &str,
    channels: &[String],
    uuid: &str,
) -> EndpointRequest {
    let mut query = QueryParams::new(pnsdk);
    query.push("uuid", uuid);
    EndpointRequest {
        method: Method::Get,
        path: format!(
            "/v2/presence/sub-key/{}/channel/{}/leave",
            subscribe_key,
            channels_path_segment(channels)
        ),
        query,
        body: None,
    }
}

/// `GET /v2/presence/sub-key/<sub>/channel/<channels>` (here-now).
#[must_use]
pub fn here_now(pnsdk: &str, subscribe_key: &str, channels: &[String]) -> EndpointRequest {
    EndpointRequest {
        method: Method::Get,
        path: format!(
            "/v2/presence/sub-key/{}/channel/{}",
            subscribe_key,
            channels_path_segment(channels)
        ),
        query: QueryParams::new(pnsdk),
        body: None,
    }
}

/// `GET /v2/presence/sub-key/<sub>` (global here-now).
#[must_use]
pub fn global_here_now(pnsdk: &str, subscribe_key: &str) -> EndpointRequest {
    EndpointRequest {
        method: Method::Get,
        path: format!("/v2/presence/sub-key/{}", subscribe_key),
        query: QueryParams::new(pnsdk),
        body: None,
    }
}

/// `GET /v2/presence/sub-key/<sub>/uuid/<uuid>` (where-now).
#[must_use]
pub fn where_now(pnsdk: &str, subscribe_key: &str, uuid: &str) -> EndpointRequest {
    EndpointRequest {
        method: Method::Get,
        path: format!(
            "/v2/presence/sub-key/{}/uuid/{}",
            subscribe_key,
            encode_segment(uuid)
        ),
        query: QueryParams::new(pnsdk),
        body: None,
    }
}

/// `GET .../channel/<channels>/uuid/<uuid>/data?state=<json>` (set-state).
#[must_use]
pub fn set_state(
    pnsdk: &str,
    subscribe_key: &str,
    channels: &[String],
    uuid: &str,
    state_json: &str,
) -> EndpointRequest {
    let mut query = QueryParams::new(pnsdk);
    query.push("state", &encode_segment(state_json));
    EndpointRequest {
        method: Method::Get,
        path: format!(
            "/v2/presence/sub-key/{}/channel/{}/uuid/{}/data",
            subscribe_key,
            channels_path_segment(channels),
            encode_segment(uuid)
        ),
        query,
        body: None,
    }
}

/// `GET .../channel/<channels>/uuid/<uuid>` (state-get).
#[must_use]
pub fn state_get(
    pnsdk: &str,
    subscribe_key: &str,
    channels: &[String],
    uuid: &str,
) -> EndpointRequest {
    EndpointRequest {
        method: Method::Get,
        path: format!(
            "/v2/presence/sub-key/{}/channel/{}/uuid/{}",
            subscribe_key,
            channels_path_segment(channels),
            encode_segment(uuid)
        ),
        query: QueryParams::new(pnsdk),
        body: None,
    }
}

/// `GET .../channel/<channels>/heartbeat`.
#[must_use]
pub fn heartbeat(
    pnsdk: &str,
    subscribe_key: &str,
    channels: &[String],
    uuid: &str,
    presence_timeout: Option<u32>,
) -> EndpointRequest {
    let mut query = QueryParams::new(pnsdk);
    query.push("uuid", uuid);
    if let Some(timeout) = presence_timeout {
        query.push("heartbeat", &timeout.to_string());
    }
    EndpointRequest {
        method: Method::Get,
        path: format!(
            "/v2/presence/sub-key/{}/channel/{}/heartbeat",
            subscribe_key,
            channels_path_segment(channels)
        ),
        query,
        body: None,
    }
}

/// `GET /v2/history/sub-key/<sub>/channel/<channel>?count=&include_token=`.
#[must_use]
pub fn history(
    pnsdk: &str,
    subscribe_key: &str,
    channel: &str,
    count: u32,
    include_token: bool,
) -> EndpointRequest {
    let mut query = QueryParams::new(pnsdk);
    query.push("count", &count.to_string());
    query.push("include_token", if include_token { "true" } else { "false" });
    EndpointRequest {
        method: Method::Get,
        path: format!(
            "/v2/history/sub-key/{}/channel/{}",
            subscribe_key,
            encode_segment(channel)
        ),
        query,
        body: None,
    }
}

/// `GET /v3/history/sub-key/<sub>/message-counts/<channels>?timetoken=`.
#[must_use]
pub fn message_counts(
    pnsdk: &str,
    subscribe_key: &str,
    channels: &[String],
    timetoken: Option<&str>,
    channels_timetoken: Option<&[String]>,
) -> EndpointRequest {
    let mut query = QueryParams::new(pnsdk);
    if let Some(tt) = timetoken {
        query.push("timetoken", tt);
    }
    if let Some(per_channel) = channels_timetoken {
        query.push("channelsTimetoken", &per_channel.join(","));
    }
    EndpointRequest {
        method: Method::Get,
        path: format!(
            "/v3/history/sub-key/{}/message-counts/{}",
            subscribe_key,
            channels_path_segment(channels)
        ),
        query,
        body: None,
    }
}

/// Which channel-group admin operation to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelGroupOp {
    /// Add channels to the group.
    Add,
    /// Remove channels from the group.
    Remove,
    /// Delete the group entirely.
    Delete,
    /// List channels in the group.
    List,
}

/// `GET /v1/channel-registration/sub-key/<sub>/channel-group/<group>[...]`.
#[must_use]
pub fn channel_group(
    pnsdk: &str,
    subscribe_key: &str,
    group: &str,
    op: ChannelGroupOp,
    channels: &[String],
) -> EndpointRequest {
    let mut query = QueryParams::new(pnsdk);
    let mut path = format!(
        "/v1/channel-registration/sub-key/{}/channel-group/{}",
        subscribe_key,
        encode_segment(group)
    );
    match op {
        ChannelGroupOp::Add => {
            query.push("add", &channels_path_segment(channels));
        }
        ChannelGroupOp::Remove => {
            query.push("remove", &channels_path_segment(channels));
        }
        ChannelGroupOp::Delete => {
            path.push_str("/remove");
        }
        ChannelGroupOp::List => {}
    }
    EndpointRequest {
        method: Method::Get,
        path,
        query,
        body: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_get_path_matches_template() {
        let req = publish(
            "PubNub-Rust/1.0", "pub", "sub", "my-channel", r#"{"a":1}"#, false, "uuid-1", None,
        );
        assert!(req.path.starts_with("/publish/pub/sub/0/my-channel/0/"));
        assert_eq!(req.method, Method::Get);
        assert!(req.body.is_none());
    }

    #[test]
    fn publish_post_keeps_message_in_body() {
        let req = publish(
            "PubNub-Rust/1.0", "pub", "sub", "my-channel", r#"{"a":1}"#, true, "uuid-1", None,
        );
        assert_eq!(req.path, "/publish/pub/sub/0/my-channel/0");
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.body.as_deref(), Some(br#"{"a":1}"#.as_ref()));
    }

    #[test]
    fn subscribe_v1_handshake_and_steady_paths_match_the_wire_examples() {
        let handshake = subscribe_v1(
            "pnsdk",
            "timok",
            &["morava".to_string()],
            "0",
            "test_id",
        );
        assert_eq!(handshake.path, "/subscribe/timok/morava/0/0");

        let steady = subscribe_v1(
            "pnsdk",
            "timok",
            &["morava".to_string(), "lim".to_string()],
            "14179836755957292",
            "test_id",
        );
        assert_eq!(
            steady.path,
            "/subscribe/timok/morava,lim/0/14179836755957292"
        );
    }

    #[test]
    fn subscribe_v2_includes_cursor_and_groups() {
        let req = subscribe_v2(
            "PubNub-Rust/1.0",
            "sub",
            &["a".to_string(), "b".to_string()],
            &["group1".to_string()],
            "14178940800777403",
            "4",
            None,
            None,
            "uuid-1",
            None,
        );
        assert!(req.path.starts_with("/v2/subscribe/sub/a,b/0"));
        let qs = req.query.to_query_string();
        assert!(qs.contains("tt=14178940800777403"));
        assert!(qs.contains("tr=4"));
        assert!(qs.contains("channel-group=group1"));
    }

    #[test]
    fn channel_group_delete_appends_remove_segment() {
        let req = channel_group("PubNub-Rust/1.0", "sub", "my-group", ChannelGroupOp::Delete, &[]);
        assert!(req.path.ends_with("/my-group/remove"));
    }
}
