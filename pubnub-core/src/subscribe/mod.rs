//! Subscribe Event Engine (§4.6): drives long-poll subscribe v2, fans
//! messages out to a listener, and interleaves presence heartbeats.
//!
//! Message/`Timetoken` shapes are grounded in the teacher's `src/lib.rs`
//! (`Message { message_type, route, channel, json, metadata, timetoken,
//! client, subscribe_key, flags }`); the engine itself generalizes the
//! teacher's `SubscribeLoop::run` long-poll loop to the full state
//! machine in §4.6 instead of a single fixed request shape.

use std::collections::VecDeque;

use crate::error::PubnubError;
use crate::transaction::endpoint;
use crate::transaction::{execute, ResponseKind, TransactionContext};

/// A subscribe cursor: the high-water-mark timetoken plus the region it
/// was issued from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Timetoken {
    /// The timetoken value, as the decimal string the wire uses.
    pub t: String,
    /// The origin region that issued it.
    pub r: String,
}

/// The kind of event a delivered [`Message`] represents.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum MessageType {
    /// An ordinary published payload.
    Publish,
    /// A lightweight signal.
    Signal,
    /// A presence event (join/leave/timeout/state-change).
    Presence,
    /// A message action event.
    Action,
    /// An Objects service event.
    Objects,
    /// Forward-compatible bucket for message types not yet known here.
    Unknown(u32),
}

/// One message delivered to the subscribe listener.
#[derive(Debug, Clone)]
pub struct Message {
    /// What kind of event this is.
    pub message_type: MessageType,
    /// The wildcard/channel-group the message matched, if any
    /// (`match_or_group`, falling back to [`Message::channel`] per
    /// §4.6).
    pub route: Option<String>,
    /// The channel the message actually arrived on.
    pub channel: String,
    /// The decoded JSON payload.
    pub json: json::JsonValue,
    /// Per-message metadata, if the server sent any.
    pub metadata: json::JsonValue,
    /// The message's own timetoken.
    pub timetoken: Timetoken,
    /// The publishing client's id, if present.
    pub client: Option<String>,
}

/// A status record delivered to the listener on state transitions.
#[derive(Debug, Clone)]
pub struct SubscribeStatus {
    /// Human-readable category (`"connected"`, `"handshake_failed"`, …).
    pub status: String,
    /// Why, if this is an error/reconnect status.
    pub reason: Option<String>,
    /// Channels this status applies to.
    pub channels: Vec<String>,
    /// Channel groups this status applies to.
    pub groups: Vec<String>,
}

/// Callback surface the engine drives (§4.6 `emit_status`/`emit_messages`).
pub trait SubscribeListener: Send {
    /// A state-transition status.
    fn status(&mut self, status: SubscribeStatus);
    /// One delivered message.
    fn message(&mut self, message: Message);
}

/// Where the subscribe event engine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeState {
    /// No active subscription.
    Unsubscribed,
    /// The initial `tt=0` handshake request is in flight.
    Handshaking,
    /// The handshake failed and is not being retried automatically.
    HandshakeFailed,
    /// The handshake failed and a retry is scheduled.
    HandshakeReconnecting,
    /// Steady-state long-poll receive.
    Receiving,
    /// A receive failed and is not being retried automatically.
    ReceiveFailed,
    /// A receive failed and a retry is scheduled.
    ReceiveReconnecting,
}

/// Engine-owned context: channel/group set, cursor, and the
/// heartbeat-interleaving flag.
pub struct SubscribeEngineContext {
    /// Current state.
    pub state: SubscribeState,
    /// Subscribed channels.
    pub channels: Vec<String>,
    /// Subscribed channel groups.
    pub groups: Vec<String>,
    /// Server-assigned cursor from the last successful handshake/receive.
    pub cursor: Timetoken,
    /// Optional filter expression applied server-side.
    pub filter_expr: Option<String>,
    /// Set when a heartbeat should be interleaved before the next
    /// receive (§4.6 "heartbeat interleaving").
    pub send_heartbeat: bool,
    /// Presence heartbeat interval in seconds, if heartbeats are
    /// enabled at all.
    pub heartbeat_interval: Option<u32>,
    /// A cancel was requested but deferred because a non-subscribe
    /// transaction (e.g. a heartbeat) was in flight (§4.6 `cancel`).
    pub cancel_pending: bool,
    queued_messages: VecDeque<Message>,
}

impl SubscribeEngineContext {
    /// A fresh engine context for `channels`/`groups`, unsubscribed.
    #[must_use]
    pub fn new(channels: Vec<String>, groups: Vec<String>) -> Self {
        SubscribeEngineContext {
            state: SubscribeState::Unsubscribed,
            channels,
            groups,
            cursor: Timetoken::default(),
            filter_expr: None,
            send_heartbeat: false,
            heartbeat_interval: None,
            cancel_pending: false,
            queued_messages: VecDeque::new(),
        }
    }
}

fn message_type_from_route(route: Option<&str>) -> MessageType {
    match route {
        Some(r) if r.ends_with("-pnpres") => MessageType::Presence,
        _ => MessageType::Publish,
    }
}

/// Parse a `[[msg,...], "timetoken" (, "groups", "channels")?]` body into
/// `(messages, new_cursor)`.
fn parse_subscribe_body(
    body: &[u8],
    fallback_channel: &str,
) -> Result<(Vec<Message>, Timetoken), PubnubError> {
    let text = String::from_utf8_lossy(body);
    let parsed = json::parse(&text).map_err(PubnubError::from)?;

    let items = match &parsed {
        json::JsonValue::Array(items) => items,
        _ => {
            return Err(PubnubError::FormatError(
                "subscribe body is not a JSON array".into(),
            ))
        }
    };

    let as_array = |v: &json::JsonValue| match v {
        json::JsonValue::Array(items) => Some(items),
        _ => None,
    };

    let raw_messages = items
        .first()
        .and_then(as_array)
        .ok_or_else(|| PubnubError::FormatError("subscribe body missing message array".into()))?;
    let timetoken = items
        .get(1)
        .and_then(|v| v.as_str())
        .ok_or_else(|| PubnubError::FormatError("subscribe body missing timetoken".into()))?
        .to_string();
    let groups = items.get(2).and_then(as_array);
    let channels = items.get(3).and_then(as_array);

    let mut messages = Vec::with_capacity(raw_messages.len());
    for (i, raw) in raw_messages.iter().enumerate() {
        let channel = channels
            .and_then(|c| c.get(i))
            .and_then(|v| v.as_str())
            .unwrap_or(fallback_channel)
            .to_string();
        let route = groups
            .and_then(|g| g.get(i))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        messages.push(Message {
            message_type: message_type_from_route(route.as_deref().or(Some(channel.as_str()))),
            route,
            channel,
            json: raw.clone(),
            metadata: json::JsonValue::Null,
            timetoken: Timetoken {
                t: timetoken.clone(),
                r: String::new(),
            },
            client: None,
        });
    }

    Ok((
        messages,
        Timetoken {
            t: timetoken,
            r: String::new(),
        },
    ))
}

/// Run one handshake (`tt=0`), storing the returned cursor and queuing
/// any messages the handshake itself carried.
pub async fn handshake(
    ctx: &mut SubscribeEngineContext,
    transaction: &mut TransactionContext,
    pnsdk: &str,
    subscribe_key: &str,
    uuid: &str,
) -> Result<(), PubnubError> {
    ctx.state = SubscribeState::Handshaking;
    let request = endpoint::subscribe_v2(
        pnsdk,
        subscribe_key,
        &ctx.channels,
        &ctx.groups,
        "0",
        "0",
        ctx.filter_expr.as_deref(),
        ctx.heartbeat_interval,
        uuid,
        None,
    );

    match execute(transaction, &request, ResponseKind::Subscribe).await {
        Ok(response) => {
            let fallback = ctx.channels.first().cloned().unwrap_or_default();
            let (messages, cursor) = parse_subscribe_body(&response.body, &fallback)?;
            ctx.cursor = cursor;
            ctx.queued_messages.extend(messages);
            ctx.state = SubscribeState::Receiving;
            Ok(())
        }
        Err(e) => {
            ctx.state = SubscribeState::HandshakeFailed;
            Err(e)
        }
    }
}

/// Run one receive using the stored cursor, queuing any new messages.
pub async fn receive(
    ctx: &mut SubscribeEngineContext,
    transaction: &mut TransactionContext,
    pnsdk: &str,
    subscribe_key: &str,
    uuid: &str,
) -> Result<(), PubnubError> {
    if ctx.send_heartbeat {
        let heartbeat_request = endpoint::heartbeat(
            pnsdk,
            subscribe_key,
            &ctx.channels,
            uuid,
            ctx.heartbeat_interval,
        );
        // A heartbeat in flight defers a pending cancel and briefly
        // suspends the receive it precedes (§4.6).
        execute(transaction, &heartbeat_request, ResponseKind::Standard).await?;
        ctx.send_heartbeat = false;
    }

    let request = endpoint::subscribe_v2(
        pnsdk,
        subscribe_key,
        &ctx.channels,
        &ctx.groups,
        &ctx.cursor.t,
        &ctx.cursor.r,
        ctx.filter_expr.as_deref(),
        ctx.heartbeat_interval,
        uuid,
        None,
    );

    match execute(transaction, &request, ResponseKind::Subscribe).await {
        Ok(response) => {
            let fallback = ctx.channels.first().cloned().unwrap_or_default();
            let (messages, cursor) = parse_subscribe_body(&response.body, &fallback)?;
            ctx.cursor = cursor;
            ctx.queued_messages.extend(messages);
            ctx.state = SubscribeState::Receiving;
            Ok(())
        }
        Err(e) => {
            ctx.state = SubscribeState::ReceiveFailed;
            Err(e)
        }
    }
}

/// Drain every queued message to `listener` (§4.6 `emit_messages`:
/// "drain `pubnub_get_v2` until the queue is empty").
pub fn emit_messages(ctx: &mut SubscribeEngineContext, listener: &mut dyn SubscribeListener) {
    while let Some(message) = ctx.queued_messages.pop_front() {
        listener.message(message);
    }
}

/// Deliver a status record (§4.6 `emit_status`).
pub fn emit_status(listener: &mut dyn SubscribeListener, status: SubscribeStatus) {
    listener.status(status);
}

/// Request cancellation. If a non-subscribe transaction (e.g. the
/// heartbeat the next receive is about to issue) is in flight, the
/// cancel is deferred rather than torn down mid-request (§4.6 `cancel`).
pub fn cancel(ctx: &mut SubscribeEngineContext) {
    if ctx.send_heartbeat {
        ctx.cancel_pending = true;
        return;
    }
    ctx.state = SubscribeState::Unsubscribed;
    ctx.cancel_pending = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_messages_timetoken_and_channels() {
        let body = br#"[[{"text":"hi"},{"text":"bye"}],"14178940800777403",[],["room-1","room-2"]]"#;
        let (messages, cursor) = parse_subscribe_body(body, "fallback").unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].channel, "room-1");
        assert_eq!(messages[1].channel, "room-2");
        assert_eq!(cursor.t, "14178940800777403");
    }

    #[test]
    fn falls_back_to_subscribed_channel_when_channels_array_absent() {
        let body = br#"[[{"text":"hi"}],"1"]"#;
        let (messages, _) = parse_subscribe_body(body, "my-channel").unwrap();
        assert_eq!(messages[0].channel, "my-channel");
    }

    #[test]
    fn presence_route_is_classified_as_presence() {
        assert_eq!(
            message_type_from_route(Some("room-1-pnpres")),
            MessageType::Presence
        );
        assert_eq!(message_type_from_route(Some("room-1")), MessageType::Publish);
    }

    #[test]
    fn cancel_defers_while_heartbeat_in_flight() {
        let mut ctx = SubscribeEngineContext::new(vec!["a".to_string()], vec![]);
        ctx.send_heartbeat = true;
        cancel(&mut ctx);
        assert!(ctx.cancel_pending);
        assert_ne!(ctx.state, SubscribeState::Unsubscribed);
    }

    #[test]
    fn cancel_is_immediate_without_in_flight_heartbeat() {
        let mut ctx = SubscribeEngineContext::new(vec!["a".to_string()], vec![]);
        cancel(&mut ctx);
        assert_eq!(ctx.state, SubscribeState::Unsubscribed);
    }

    struct RecordingListener {
        messages: Vec<String>,
        statuses: Vec<String>,
    }

    impl SubscribeListener for RecordingListener {
        fn status(&mut self, status: SubscribeStatus) {
            self.statuses.push(status.status);
        }
        fn message(&mut self, message: Message) {
            self.messages.push(message.channel);
        }
    }

    #[test]
    fn emit_messages_drains_the_queue() {
        let mut ctx = SubscribeEngineContext::new(vec!["a".to_string()], vec![]);
        let body = br#"[[{"x":1},{"x":2}],"1"]"#;
        let (messages, _) = parse_subscribe_body(body, "a").unwrap();
        ctx.queued_messages.extend(messages);

        let mut listener = RecordingListener {
            messages: vec![],
            statuses: vec![],
        };
        emit_messages(&mut ctx, &mut listener);
        assert_eq!(listener.messages.len(), 2);
        assert!(ctx.queued_messages.is_empty());
    }
}
