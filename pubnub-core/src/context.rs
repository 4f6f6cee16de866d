//! Context (§3): the identity/endpoint/transport-option bundle a
//! transaction runs against, plus the bookkeeping the state machine
//! updates after each transaction (`last_result`, `last_http_code`, …).

use std::time::Duration;

use crate::buffer::{self, ResponseView, TxBuffer};
use crate::connection::{KeepAliveOptions, SslOptions};
use crate::error::PubnubError;
use crate::proxy::{ProxyAuthScheme, ProxyConfig, ProxyProtocol};
use crate::transaction::{Origin, ResponseKind, TransactionContext};

/// The default PubNub origin, used unless [`Context::set_origin`] overrides it.
pub const DEFAULT_ORIGIN: &str = "ps.pndsn.com";

/// Bookkeeping updated after every transaction (§3 "Transaction record").
#[derive(Debug, Clone, Default)]
pub struct TransactionRecord {
    /// The last result (`Ok(())` for success, the terminal error otherwise).
    pub last_result: Option<String>,
    /// The last HTTP status observed, meaningful only once the state
    /// machine reported `ok` or an HTTP-level error.
    pub last_http_code: u16,
    /// The last `Retry-After` header value, if the server sent one.
    pub last_retry_after: Option<u32>,
    /// The last subscribe timetoken, preserved as a string (never
    /// reparsed as an integer) and defaulting to `"0"`.
    pub last_time_token: String,
    /// The raw (quote-preserving) second element of the last publish
    /// response, e.g. `"\"Sent\""`.
    pub last_publish_result: Option<String>,
}

impl TransactionRecord {
    fn fresh() -> Self {
        TransactionRecord {
            last_time_token: "0".to_string(),
            ..Default::default()
        }
    }
}

/// A context: exactly one active transaction at a time, from `init`
/// until it is freed back to its [`crate::context_pool::ContextPool`].
pub struct Context {
    publish_key: String,
    subscribe_key: String,
    secret_key: Option<String>,
    auth_key: Option<String>,
    auth_token: Option<String>,
    user_id: Option<String>,

    transaction: TransactionContext,
    record: TransactionRecord,
    response_view: Option<ResponseView>,
}

impl Context {
    /// `init(ctx, pub_key, sub_key)` — mandatory before any operation.
    /// Origin defaults to [`DEFAULT_ORIGIN`]; 443 if SSL (the default),
    /// 80 otherwise.
    #[must_use]
    pub fn init(publish_key: &str, subscribe_key: &str) -> Self {
        let ssl = SslOptions::default();
        let port = if ssl.use_ssl { 443 } else { 80 };
        Context {
            publish_key: publish_key.to_string(),
            subscribe_key: subscribe_key.to_string(),
            secret_key: None,
            auth_key: None,
            auth_token: None,
            user_id: None,
            transaction: TransactionContext {
                origin: Origin {
                    host: DEFAULT_ORIGIN.to_string(),
                    port,
                },
                ssl,
                proxy: ProxyConfig::none(),
                keep_alive: crate::connection::KeepAlivePool::new(KeepAliveOptions::default()),
                wait_connect: Duration::from_secs(10),
                tx_capacity: TxBuffer::DEFAULT_CAPACITY,
                rx_capacity: 64 * 1024,
                user_agent: "PubNub-Rust/0.1.0".to_string(),
                ops_used: 0,
            },
            record: TransactionRecord::fresh(),
            response_view: None,
        }
    }

    /// The publish key.
    #[must_use]
    pub fn publish_key(&self) -> &str {
        &self.publish_key
    }

    /// The subscribe key.
    #[must_use]
    pub fn subscribe_key(&self) -> &str {
        &self.subscribe_key
    }

    /// The PAM secret key, if configured.
    #[must_use]
    pub fn secret_key(&self) -> Option<&str> {
        self.secret_key.as_deref()
    }

    /// `set_user_id` — the canonical identity setter (§9 open question:
    /// `set_uuid` is a thin alias for this).
    pub fn set_user_id(&mut self, user_id: Option<&str>) {
        self.user_id = user_id.map(str::to_string);
    }

    /// `set_uuid` — an alias for [`Context::set_user_id`]; both
    /// accessors always observe the same value.
    pub fn set_uuid(&mut self, uuid: Option<&str>) {
        self.set_user_id(uuid);
    }

    /// The current user id (however it was set).
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// `set_auth` — the PAM auth key.
    pub fn set_auth(&mut self, auth_key: Option<&str>) {
        self.auth_key = auth_key.map(str::to_string);
    }

    /// `set_auth_token` — a token-based auth credential, taking
    /// precedence over `auth_key` when both are set.
    pub fn set_auth_token(&mut self, auth_token: Option<&str>) {
        self.auth_token = auth_token.map(str::to_string);
    }

    /// The effective `auth` query parameter value, if any.
    #[must_use]
    pub fn effective_auth(&self) -> Option<&str> {
        self.auth_token.as_deref().or(self.auth_key.as_deref())
    }

    /// Set the PAM secret key used to sign requests.
    pub fn set_secret_key(&mut self, secret_key: Option<&str>) {
        self.secret_key = secret_key.map(str::to_string);
    }

    /// `set_origin` — the PubNub (or test/self-hosted) origin hostname.
    pub fn set_origin(&mut self, origin: &str) {
        self.transaction.origin.host = origin.to_string();
    }

    /// `set_port`.
    pub fn set_port(&mut self, port: u16) {
        self.transaction.origin.port = port;
    }

    /// `set_ssl_options(ctx, {use_ssl, fallback_ssl, ignore_handshake_errors})`.
    pub fn set_ssl_options(&mut self, options: SslOptions) {
        self.transaction.ssl = options;
    }

    /// `set_proxy_manual(ctx, kind, host, port)`.
    pub fn set_proxy_manual(&mut self, protocol: ProxyProtocol, host: &str, port: u16) {
        self.transaction.proxy.protocol = protocol;
        self.transaction.proxy.host = host.to_string();
        self.transaction.proxy.port = port;
    }

    /// `set_proxy_authentication_username_password` (Basic or Digest,
    /// selected by `scheme`).
    pub fn set_proxy_authentication(
        &mut self,
        scheme: ProxyAuthScheme,
        username: &str,
        password: &str,
    ) {
        self.transaction.proxy.auth_scheme = scheme;
        self.transaction.proxy.username = username.to_string();
        self.transaction.proxy.password = password.to_string();
    }

    /// `set_proxy_authentication_none`.
    pub fn set_proxy_authentication_none(&mut self) {
        self.transaction.proxy.auth_scheme = ProxyAuthScheme::None;
    }

    /// `set_keep_alive_param(ctx, timeout_s, max_ops)` plus
    /// `use_http_keep_alive`/`dont_use_http_keep_alive` rolled into one
    /// options struct.
    pub fn set_keep_alive(&mut self, options: KeepAliveOptions) {
        self.transaction.keep_alive = crate::connection::KeepAlivePool::new(options);
    }

    /// Direct access to the underlying transaction context, for the
    /// endpoint-calling methods in the facade crate.
    pub fn transaction_mut(&mut self) -> &mut TransactionContext {
        &mut self.transaction
    }

    /// `last_result`.
    #[must_use]
    pub fn last_result(&self) -> Option<&str> {
        self.record.last_result.as_deref()
    }

    /// `last_http_code`.
    #[must_use]
    pub fn last_http_code(&self) -> u16 {
        self.record.last_http_code
    }

    /// `last_http_retry_header`.
    #[must_use]
    pub fn last_http_retry_header(&self) -> Option<u32> {
        self.record.last_retry_after
    }

    /// `last_time_token`.
    #[must_use]
    pub fn last_time_token(&self) -> &str {
        &self.record.last_time_token
    }

    /// Record the outcome of a transaction, updating the bookkeeping
    /// fields the way the real state machine would after `read_body`, and
    /// (on success) rebuilding the parsed response view `get`/
    /// `get_channel`/`get_v2` step through.
    pub fn record_outcome(
        &mut self,
        kind: ResponseKind,
        result: &Result<crate::http::ParsedResponse, PubnubError>,
    ) {
        match result {
            Ok(response) => {
                self.record.last_result = Some("ok".to_string());
                self.record.last_http_code = response.status.code;
                self.record.last_retry_after = response
                    .headers
                    .get("Retry-After")
                    .and_then(|v| v.parse().ok());

                match kind {
                    ResponseKind::Subscribe => {
                        let (view, timetoken) = ResponseView::for_subscribe(&response.body);
                        if let Some(timetoken) = timetoken {
                            self.set_last_time_token(&timetoken);
                        }
                        self.response_view = Some(view);
                    }
                    ResponseKind::Publish => {
                        self.record.last_publish_result = buffer::nth_top_level_element(&response.body, 1);
                        self.response_view = Some(ResponseView::whole_body(&response.body));
                    }
                    ResponseKind::Standard => {
                        self.response_view = Some(ResponseView::whole_body(&response.body));
                    }
                }
            }
            Err(e) => {
                self.record.last_result = Some(e.to_string());
                if let PubnubError::HttpError { status } = e {
                    self.record.last_http_code = *status;
                }
            }
        }
    }

    /// Update `last_time_token` after a successful subscribe (string
    /// preserved verbatim, per §3 invariant).
    pub fn set_last_time_token(&mut self, timetoken: &str) {
        self.record.last_time_token = timetoken.to_string();
    }

    /// `last_publish_result` — the raw (quote-preserving) second element
    /// of the last publish response, e.g. `"\"Sent\""`.
    #[must_use]
    pub fn last_publish_result(&self) -> Option<&str> {
        self.record.last_publish_result.as_deref()
    }

    /// `get` — step to the next raw element of the last response's
    /// parsed view (§3 "Parsed response view"), or `None` once
    /// exhausted or before any transaction has completed.
    pub fn get(&mut self) -> Option<String> {
        self.response_view.as_mut().and_then(ResponseView::get)
    }

    /// `get_channel` — step to the next raw channel-name element.
    pub fn get_channel(&mut self) -> Option<String> {
        self.response_view.as_mut().and_then(ResponseView::get_channel)
    }

    /// `get_v2` — `get`/`get_channel` stepped together as one pair.
    pub fn get_v2(&mut self) -> Option<(String, Option<String>)> {
        self.response_view.as_mut().and_then(ResponseView::get_v2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_defaults_to_pubnub_origin_and_ssl_port() {
        let ctx = Context::init("pub", "sub");
        assert_eq!(ctx.transaction.origin.host, DEFAULT_ORIGIN);
        assert_eq!(ctx.transaction.origin.port, 443);
        assert_eq!(ctx.last_time_token(), "0");
    }

    #[test]
    fn set_uuid_and_set_user_id_observe_the_same_value() {
        let mut ctx = Context::init("pub", "sub");
        ctx.set_uuid(Some("abc"));
        assert_eq!(ctx.user_id(), Some("abc"));
        ctx.set_user_id(Some("xyz"));
        assert_eq!(ctx.user_id(), Some("xyz"));
    }

    #[test]
    fn auth_token_takes_precedence_over_auth_key() {
        let mut ctx = Context::init("pub", "sub");
        ctx.set_auth(Some("key"));
        assert_eq!(ctx.effective_auth(), Some("key"));
        ctx.set_auth_token(Some("token"));
        assert_eq!(ctx.effective_auth(), Some("token"));
    }

    fn ok_response(body: &[u8]) -> Result<crate::http::ParsedResponse, PubnubError> {
        Ok(crate::http::ParsedResponse {
            status: crate::http::StatusLine {
                minor_version: 1,
                code: 200,
                reason: "OK".into(),
            },
            headers: crate::http::HeaderMap::new(),
            body: body.to_vec(),
        })
    }

    #[test]
    fn successful_subscribe_outcome_updates_last_time_token() {
        let mut ctx = Context::init("pub", "sub");
        let result = ok_response(br#"[[],"14179836755957292"]"#);
        ctx.record_outcome(ResponseKind::Subscribe, &result);
        assert_eq!(ctx.last_time_token(), "14179836755957292");
    }

    #[test]
    fn successful_subscribe_outcome_backs_get_and_get_channel() {
        let mut ctx = Context::init("pub", "sub");
        let result = ok_response(br#"[[1234,"Da"],"14179915548467106"]"#);
        ctx.record_outcome(ResponseKind::Subscribe, &result);
        assert_eq!(ctx.get().as_deref(), Some("1234"));
        assert_eq!(ctx.get().as_deref(), Some("\"Da\""));
        assert_eq!(ctx.get(), None);
    }

    #[test]
    fn successful_publish_outcome_sets_last_publish_result() {
        let mut ctx = Context::init("pub", "sub");
        let result = ok_response(br#"[1,"Sent","14178940800777403"]"#);
        ctx.record_outcome(ResponseKind::Publish, &result);
        assert_eq!(ctx.last_publish_result(), Some("\"Sent\""));
    }
}
