//! # PubNub Client SDK for Rust
//!
//! - Fully `async`/`await` ready.
//! - Speaks the PubNub REST wire protocol directly over `tokio` TCP/TLS
//!   sockets (no HTTP client crate in the middle): DNS, connect, TLS,
//!   Keep-Alive, and proxy authentication all live in `pubnub-core`.
//! - A small context pool (`pubnub_core::context_pool`) backs each
//!   [`PubNub`] client; a handful of clients reuse static slots before
//!   falling back to the heap.

use std::sync::Arc;
use std::time::Duration;

use futures_channel::mpsc;
use futures_util::stream::Stream;
use futures_util::task::{Context as PollContext, Poll};
use log::{debug, error};
use std::pin::Pin;
use tokio::sync::Mutex as AsyncMutex;

use pubnub_core::connection::{KeepAliveOptions, SslOptions};
use pubnub_core::context::Context as CoreContext;
use pubnub_core::context_pool::{ContextHandle, ContextPool};
use pubnub_core::logging::LoggerManager;
use pubnub_core::proxy::{ProxyAuthScheme, ProxyProtocol};
use pubnub_core::subscribe::{
    self, Message, SubscribeEngineContext, SubscribeListener, SubscribeStatus,
};
use pubnub_core::transaction::endpoint::{self, ChannelGroupOp};
use pubnub_core::transaction::{execute, ResponseKind};

pub use pubnub_core::subscribe::{MessageType, Timetoken};
pub use pubnub_core::PubnubError as Error;

const SDK_AGENT: &str = "PubNub-Rust";
const SDK_VERSION: &str = "0.1.0";

fn generate_user_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A PubNub client: one [`ContextHandle`] (shared pool-managed state:
/// identity, transport options, bookkeeping) plus the subscribe engine's
/// own state, if a subscription is active.
pub struct PubNub {
    pool: Arc<ContextPool>,
    handle: ContextHandle,
    agent: String,
    subscribe_ctx: Arc<AsyncMutex<SubscribeEngineContext>>,
    exit_tx: Option<mpsc::UnboundedSender<()>>,
    filter_expr: Option<String>,
    logger: Arc<LoggerManager>,
}

impl std::fmt::Debug for PubNub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let publish_key = self
            .handle
            .try_with(|c| c.publish_key().to_string())
            .unwrap_or_else(|| "<locked>".to_string());
        let subscribe_key = self
            .handle
            .try_with(|c| c.subscribe_key().to_string())
            .unwrap_or_else(|| "<locked>".to_string());
        f.debug_struct("PubNub")
            .field("publish_key", &publish_key)
            .field("subscribe_key", &subscribe_key)
            .finish()
    }
}

/// Builder for [`PubNub`], mirroring the transaction-free configuration
/// setters of §4.7 (`set_origin`, `set_ssl_options`, `set_proxy_manual`,
/// `set_keep_alive_param`, …) as chainable methods.
pub struct PubNubBuilder {
    publish_key: String,
    subscribe_key: String,
    origin: Option<String>,
    agent: String,
    secret_key: Option<String>,
    auth_key: Option<String>,
    auth_token: Option<String>,
    user_id: Option<String>,
    filter_expr: Option<String>,
    ssl: SslOptions,
    proxy: Option<(ProxyProtocol, String, u16)>,
    proxy_auth: Option<(ProxyAuthScheme, String, String)>,
    keep_alive: KeepAliveOptions,
    pool: Option<Arc<ContextPool>>,
    logger: Option<Arc<LoggerManager>>,
}

impl PubNub {
    /// Create a `PubNub` client with default configuration. To customize
    /// transport options, identity, or proxy settings, use
    /// [`PubNubBuilder::new`].
    #[must_use]
    pub fn new(publish_key: &str, subscribe_key: &str) -> PubNub {
        PubNubBuilder::new(publish_key, subscribe_key).build()
    }

    fn pnsdk(&self) -> String {
        format!("{}/{}", self.agent, SDK_VERSION)
    }

    async fn uuid(&self) -> String {
        self.handle
            .with(|c| c.user_id().map(str::to_string))
            .await
            .unwrap_or_else(generate_user_id)
    }

    /// Drive one transaction over this client's context, holding the
    /// context lock for the duration of the I/O (§4.5 "exactly one
    /// active transaction at a time") and updating the bookkeeping
    /// accessors (`last_result`, `last_http_code`, …) afterwards.
    async fn run<F>(&self, operation: &str, kind: ResponseKind, build: F) -> Result<Vec<u8>, Error>
    where
        F: FnOnce(&str, Option<&str>) -> endpoint::EndpointRequest,
    {
        let pnsdk = self.pnsdk();
        let mut guard = self.handle.lock().await;
        let auth = guard.effective_auth().map(str::to_string);
        let request = build(&pnsdk, auth.as_deref());

        let result = execute(guard.transaction_mut(), &request, kind).await;
        let logged = result.as_ref().map(|r| r.status.code).map_err(|e| e.to_string());
        self.logger.report(operation, &logged);
        guard.record_outcome(kind, &result);
        drop(guard);

        self.pool.reclaim_pending();
        result.map(|r| r.body)
    }

    /// `time()` — server time, as the raw response body.
    pub async fn time(&self) -> Result<Vec<u8>, Error> {
        let uuid = self.uuid().await;
        self.run("time", ResponseKind::Standard, |pnsdk, _| endpoint::time(pnsdk, &uuid))
            .await
    }

    /// `publish(channel, message)` — `GET`-style, message percent-encoded
    /// into the path.
    pub async fn publish(&self, channel: &str, message: &json::JsonValue) -> Result<Vec<u8>, Error> {
        self.publish_with_post(channel, message, false).await
    }

    /// `publish(channel, message)` with the payload carried in a `POST`
    /// body instead of the path.
    pub async fn publish_with_post(
        &self,
        channel: &str,
        message: &json::JsonValue,
        use_post: bool,
    ) -> Result<Vec<u8>, Error> {
        let uuid = self.uuid().await;
        let (publish_key, subscribe_key) = self
            .handle
            .with(|c| (c.publish_key().to_string(), c.subscribe_key().to_string()))
            .await;
        let message_json = message.dump();
        self.run("publish", ResponseKind::Publish, |pnsdk, auth| {
            endpoint::publish(
                pnsdk,
                &publish_key,
                &subscribe_key,
                channel,
                &message_json,
                use_post,
                &uuid,
                auth,
            )
        })
        .await
    }

    /// `signal(channel, message)`.
    pub async fn signal(&self, channel: &str, message: &json::JsonValue) -> Result<Vec<u8>, Error> {
        let uuid = self.uuid().await;
        let (publish_key, subscribe_key) = self
            .handle
            .with(|c| (c.publish_key().to_string(), c.subscribe_key().to_string()))
            .await;
        let message_json = message.dump();
        self.run("signal", ResponseKind::Standard, |pnsdk, _| {
            endpoint::signal(pnsdk, &publish_key, &subscribe_key, channel, &message_json, &uuid)
        })
        .await
    }

    /// `leave(channels)`.
    pub async fn leave(&self, channels: &[String]) -> Result<Vec<u8>, Error> {
        let uuid = self.uuid().await;
        let subscribe_key = self.handle.with(|c| c.subscribe_key().to_string()).await;
        let channels = channels.to_vec();
        self.run("leave", ResponseKind::Standard, move |pnsdk, _| {
            endpoint::leave(pnsdk, &subscribe_key, &channels, &uuid)
        })
        .await
    }

    /// `here_now(channels)`.
    pub async fn here_now(&self, channels: &[String]) -> Result<Vec<u8>, Error> {
        let subscribe_key = self.handle.with(|c| c.subscribe_key().to_string()).await;
        let channels = channels.to_vec();
        self.run("here_now", ResponseKind::Standard, move |pnsdk, _| {
            endpoint::here_now(pnsdk, &subscribe_key, &channels)
        })
        .await
    }

    /// `global_here_now()`.
    pub async fn global_here_now(&self) -> Result<Vec<u8>, Error> {
        let subscribe_key = self.handle.with(|c| c.subscribe_key().to_string()).await;
        self.run("global_here_now", ResponseKind::Standard, move |pnsdk, _| {
            endpoint::global_here_now(pnsdk, &subscribe_key)
        })
        .await
    }

    /// `where_now(uuid)`.
    pub async fn where_now(&self, uuid: &str) -> Result<Vec<u8>, Error> {
        let subscribe_key = self.handle.with(|c| c.subscribe_key().to_string()).await;
        let uuid = uuid.to_string();
        self.run("where_now", ResponseKind::Standard, move |pnsdk, _| {
            endpoint::where_now(pnsdk, &subscribe_key, &uuid)
        })
        .await
    }

    /// `set_state(channels, state)`.
    pub async fn set_state(
        &self,
        channels: &[String],
        state: &json::JsonValue,
    ) -> Result<Vec<u8>, Error> {
        let uuid = self.uuid().await;
        let subscribe_key = self.handle.with(|c| c.subscribe_key().to_string()).await;
        let channels = channels.to_vec();
        let state_json = state.dump();
        self.run("set_state", ResponseKind::Standard, move |pnsdk, _| {
            endpoint::set_state(pnsdk, &subscribe_key, &channels, &uuid, &state_json)
        })
        .await
    }

    /// `state_get(channels)`.
    pub async fn state_get(&self, channels: &[String]) -> Result<Vec<u8>, Error> {
        let uuid = self.uuid().await;
        let subscribe_key = self.handle.with(|c| c.subscribe_key().to_string()).await;
        let channels = channels.to_vec();
        self.run("state_get", ResponseKind::Standard, move |pnsdk, _| {
            endpoint::state_get(pnsdk, &subscribe_key, &channels, &uuid)
        })
        .await
    }

    /// `heartbeat(channels, presence_timeout)`.
    pub async fn heartbeat(
        &self,
        channels: &[String],
        presence_timeout: Option<u32>,
    ) -> Result<Vec<u8>, Error> {
        let uuid = self.uuid().await;
        let subscribe_key = self.handle.with(|c| c.subscribe_key().to_string()).await;
        let channels = channels.to_vec();
        self.run("heartbeat", ResponseKind::Standard, move |pnsdk, _| {
            endpoint::heartbeat(pnsdk, &subscribe_key, &channels, &uuid, presence_timeout)
        })
        .await
    }

    /// `history(channel, count, include_token)` (aliased as
    /// `fetch_history` in §4.7's accessor list).
    pub async fn history(
        &self,
        channel: &str,
        count: u32,
        include_token: bool,
    ) -> Result<Vec<u8>, Error> {
        let subscribe_key = self.handle.with(|c| c.subscribe_key().to_string()).await;
        let channel = channel.to_string();
        self.run("history", ResponseKind::Standard, move |pnsdk, _| {
            endpoint::history(pnsdk, &subscribe_key, &channel, count, include_token)
        })
        .await
    }

    /// Alias for [`PubNub::history`] (§4.7 lists both names).
    pub async fn fetch_history(
        &self,
        channel: &str,
        count: u32,
        include_token: bool,
    ) -> Result<Vec<u8>, Error> {
        self.history(channel, count, include_token).await
    }

    /// `message_counts(channels, timetoken)`.
    pub async fn message_counts(
        &self,
        channels: &[String],
        timetoken: Option<&str>,
    ) -> Result<Vec<u8>, Error> {
        let subscribe_key = self.handle.with(|c| c.subscribe_key().to_string()).await;
        let channels = channels.to_vec();
        let timetoken = timetoken.map(str::to_string);
        self.run("message_counts", ResponseKind::Standard, move |pnsdk, _| {
            endpoint::message_counts(pnsdk, &subscribe_key, &channels, timetoken.as_deref(), None)
        })
        .await
    }

    /// `add_channel_to_group(group, channels)`.
    pub async fn add_channel_to_group(
        &self,
        group: &str,
        channels: &[String],
    ) -> Result<Vec<u8>, Error> {
        self.channel_group_op(group, ChannelGroupOp::Add, channels).await
    }

    /// `remove_channel_from_group(group, channels)`.
    pub async fn remove_channel_from_group(
        &self,
        group: &str,
        channels: &[String],
    ) -> Result<Vec<u8>, Error> {
        self.channel_group_op(group, ChannelGroupOp::Remove, channels).await
    }

    /// `remove_channel_group(group)`.
    pub async fn remove_channel_group(&self, group: &str) -> Result<Vec<u8>, Error> {
        self.channel_group_op(group, ChannelGroupOp::Delete, &[]).await
    }

    /// `list_channel_group(group)`.
    pub async fn list_channel_group(&self, group: &str) -> Result<Vec<u8>, Error> {
        self.channel_group_op(group, ChannelGroupOp::List, &[]).await
    }

    async fn channel_group_op(
        &self,
        group: &str,
        op: ChannelGroupOp,
        channels: &[String],
    ) -> Result<Vec<u8>, Error> {
        let subscribe_key = self.handle.with(|c| c.subscribe_key().to_string()).await;
        let group = group.to_string();
        let channels = channels.to_vec();
        self.run("channel_group", ResponseKind::Standard, move |pnsdk, _| {
            endpoint::channel_group(pnsdk, &subscribe_key, &group, op, &channels)
        })
        .await
    }

    /// `last_result` — the last transaction's outcome, as text.
    ///
    /// Returns `None` if a transaction is in flight right now as well as
    /// if none has ever completed; these accessors are best-effort
    /// snapshots, never worth blocking on (§9 open question).
    #[must_use]
    pub fn last_result(&self) -> Option<String> {
        self.handle
            .try_with(|c| c.last_result().map(str::to_string))
            .flatten()
    }

    /// `last_http_code`.
    #[must_use]
    pub fn last_http_code(&self) -> u16 {
        self.handle.try_with(|c| c.last_http_code()).unwrap_or(0)
    }

    /// `last_http_retry_header`.
    #[must_use]
    pub fn last_http_retry_header(&self) -> Option<u32> {
        self.handle.try_with(|c| c.last_http_retry_header()).flatten()
    }

    /// `last_time_token`.
    #[must_use]
    pub fn last_time_token(&self) -> String {
        self.handle
            .try_with(|c| c.last_time_token().to_string())
            .unwrap_or_else(|| "0".to_string())
    }

    /// `last_publish_result` — the raw (still-quoted) second element of
    /// the last publish response, e.g. `"Sent"`.
    #[must_use]
    pub fn last_publish_result(&self) -> Option<String> {
        self.handle
            .try_with(|c| c.last_publish_result().map(str::to_string))
            .flatten()
    }

    /// `get` — step to the next message element of the last response
    /// view, raw text, quotes preserved verbatim.
    pub fn get(&self) -> Option<String> {
        self.handle.try_with(|c| c.get()).flatten()
    }

    /// `get_channel` — step to the next channel element of the last
    /// response view (the subscribe wildcard channel list).
    pub fn get_channel(&self) -> Option<String> {
        self.handle.try_with(|c| c.get_channel()).flatten()
    }

    /// `get_v2` — `(get(), get_channel())` paired in one call.
    pub fn get_v2(&self) -> Option<(String, Option<String>)> {
        self.handle.try_with(|c| c.get_v2()).flatten()
    }

    /// Subscribe to `channels`/`groups`, returning a [`Subscription`]
    /// stream of [`Message`]s. Driven by a background task running the
    /// handshake-then-receive long-poll loop (§4.6); dropping the
    /// [`Subscription`] signals the loop to stop.
    pub fn subscribe(&mut self, channels: Vec<String>, groups: Vec<String>) -> Subscription {
        let mut engine_ctx = SubscribeEngineContext::new(channels, groups);
        engine_ctx.filter_expr = self.filter_expr.clone();
        self.subscribe_ctx = Arc::new(AsyncMutex::new(engine_ctx));

        let (message_tx, message_rx) = mpsc::unbounded();
        let (exit_tx, exit_rx) = mpsc::unbounded();
        self.exit_tx = Some(exit_tx);

        let handle = self.handle.clone();
        let subscribe_ctx = Arc::clone(&self.subscribe_ctx);
        let agent = self.agent.clone();

        tokio::spawn(subscribe_loop(handle, subscribe_ctx, agent, message_tx, exit_rx));

        Subscription { rx: message_rx }
    }

    /// `cancel` — stop the active subscription, if any. The exit signal
    /// is the authoritative mechanism (the background task always
    /// observes it); the engine's own `cancel_pending` deferral is
    /// applied too when the subscribe context isn't locked by an
    /// in-flight heartbeat/receive right now (§4.6).
    pub fn cancel(&mut self) {
        if let Some(tx) = self.exit_tx.take() {
            let _ = tx.unbounded_send(());
        }
        if let Ok(mut ctx) = self.subscribe_ctx.try_lock() {
            subscribe::cancel(&mut ctx);
        }
    }
}

struct ChannelListener {
    tx: mpsc::UnboundedSender<Message>,
}

impl SubscribeListener for ChannelListener {
    fn status(&mut self, status: SubscribeStatus) {
        debug!("subscribe status: {} ({:?})", status.status, status.reason);
    }

    fn message(&mut self, message: Message) {
        let _ = self.tx.unbounded_send(message);
    }
}

async fn subscribe_loop(
    handle: ContextHandle,
    subscribe_ctx: Arc<AsyncMutex<SubscribeEngineContext>>,
    agent: String,
    message_tx: mpsc::UnboundedSender<Message>,
    mut exit_rx: mpsc::UnboundedReceiver<()>,
) {
    use futures_util::StreamExt;

    let mut listener = ChannelListener { tx: message_tx };
    let pnsdk = format!("{}/{}", agent, SDK_VERSION);
    let uuid = handle
        .with(|c| c.user_id().map(str::to_string))
        .await
        .unwrap_or_else(generate_user_id);
    let subscribe_key = handle.with(|c| c.subscribe_key().to_string()).await;

    loop {
        let step = async {
            let mut ctx = subscribe_ctx.lock().await;
            let is_handshake = ctx.cursor.t.is_empty() || ctx.cursor.t == "0";
            let mut core = handle.lock().await;
            let txn = core.transaction_mut();
            let outcome = if is_handshake {
                subscribe::handshake(&mut ctx, txn, &pnsdk, &subscribe_key, &uuid).await
            } else {
                subscribe::receive(&mut ctx, txn, &pnsdk, &subscribe_key, &uuid).await
            };
            if outcome.is_ok() {
                core.set_last_time_token(&ctx.cursor.t);
            }
            drop(core);
            subscribe::emit_messages(&mut ctx, &mut listener);
            outcome
        };

        tokio::select! {
            _ = exit_rx.next() => return,
            outcome = step => {
                if let Err(e) = outcome {
                    error!("subscribe loop error: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}

/// The message stream returned by [`PubNub::subscribe`]. Yields
/// [`Message`]s until the owning [`PubNub`] calls [`PubNub::cancel`] or
/// is dropped.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Stream for Subscription {
    type Item = Message;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut PollContext<'_>) -> Poll<Option<Message>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

impl PubNubBuilder {
    /// Create a new `PubNubBuilder` with the given keys and sane
    /// defaults (TLS on, no proxy, Keep-Alive disabled).
    #[must_use]
    pub fn new(publish_key: &str, subscribe_key: &str) -> PubNubBuilder {
        PubNubBuilder {
            publish_key: publish_key.to_string(),
            subscribe_key: subscribe_key.to_string(),
            origin: None,
            agent: SDK_AGENT.to_string(),
            secret_key: None,
            auth_key: None,
            auth_token: None,
            user_id: None,
            filter_expr: None,
            ssl: SslOptions::default(),
            proxy: None,
            proxy_auth: None,
            keep_alive: KeepAliveOptions::default(),
            pool: None,
            logger: None,
        }
    }

    /// `set_origin`.
    #[must_use]
    pub fn origin(mut self, origin: &str) -> PubNubBuilder {
        self.origin = Some(origin.to_string());
        self
    }

    /// Override the `User-Agent`/`pnsdk` product token (default
    /// `"PubNub-Rust"`).
    #[must_use]
    pub fn agent(mut self, agent: &str) -> PubNubBuilder {
        self.agent = agent.to_string();
        self
    }

    /// `set_secret_key` (PAM request signing).
    #[must_use]
    pub fn secret_key(mut self, secret_key: &str) -> PubNubBuilder {
        self.secret_key = Some(secret_key.to_string());
        self
    }

    /// `set_auth`.
    #[must_use]
    pub fn auth_key(mut self, auth_key: &str) -> PubNubBuilder {
        self.auth_key = Some(auth_key.to_string());
        self
    }

    /// `set_auth_token`.
    #[must_use]
    pub fn auth_token(mut self, auth_token: &str) -> PubNubBuilder {
        self.auth_token = Some(auth_token.to_string());
        self
    }

    /// `set_user_id`/`set_uuid`.
    #[must_use]
    pub fn user_id(mut self, user_id: &str) -> PubNubBuilder {
        self.user_id = Some(user_id.to_string());
        self
    }

    /// A server-side filter expression applied to every subscribe.
    #[must_use]
    pub fn filters(mut self, filter_expr: &str) -> PubNubBuilder {
        self.filter_expr = Some(filter_expr.to_string());
        self
    }

    /// `set_ssl_options`.
    #[must_use]
    pub fn ssl_options(mut self, ssl: SslOptions) -> PubNubBuilder {
        self.ssl = ssl;
        self
    }

    /// `set_proxy_manual`.
    #[must_use]
    pub fn proxy_manual(mut self, protocol: ProxyProtocol, host: &str, port: u16) -> PubNubBuilder {
        self.proxy = Some((protocol, host.to_string(), port));
        self
    }

    /// `set_proxy_authentication_{username_password,digest}`, selected
    /// by `scheme`.
    #[must_use]
    pub fn proxy_authentication(
        mut self,
        scheme: ProxyAuthScheme,
        username: &str,
        password: &str,
    ) -> PubNubBuilder {
        self.proxy_auth = Some((scheme, username.to_string(), password.to_string()));
        self
    }

    /// `set_keep_alive_param`/`use_http_keep_alive`.
    #[must_use]
    pub fn keep_alive(mut self, options: KeepAliveOptions) -> PubNubBuilder {
        self.keep_alive = options;
        self
    }

    /// Share an existing [`ContextPool`] (e.g. across several `PubNub`
    /// clients in one process) instead of allocating a private one.
    #[must_use]
    pub fn context_pool(mut self, pool: Arc<ContextPool>) -> PubNubBuilder {
        self.pool = Some(pool);
        self
    }

    /// Share an existing [`LoggerManager`] (e.g. to register a custom
    /// [`pubnub_core::logging::LogSink`] before the client is built)
    /// instead of getting a private one with just the default `log`
    /// facade bridge.
    #[must_use]
    pub fn logger_manager(mut self, logger: Arc<LoggerManager>) -> PubNubBuilder {
        self.logger = Some(logger);
        self
    }

    /// Build the `PubNub` client, allocating its [`CoreContext`] into
    /// the configured (or a fresh, private) [`ContextPool`].
    #[must_use]
    pub fn build(self) -> PubNub {
        let mut ctx = CoreContext::init(&self.publish_key, &self.subscribe_key);
        if let Some(origin) = &self.origin {
            ctx.set_origin(origin);
        }
        ctx.set_secret_key(self.secret_key.as_deref());
        ctx.set_auth(self.auth_key.as_deref());
        ctx.set_auth_token(self.auth_token.as_deref());
        ctx.set_user_id(self.user_id.as_deref());
        ctx.set_ssl_options(self.ssl);
        ctx.set_keep_alive(self.keep_alive);
        if let Some((protocol, host, port)) = &self.proxy {
            ctx.set_proxy_manual(*protocol, host, *port);
        }
        if let Some((scheme, username, password)) = &self.proxy_auth {
            ctx.set_proxy_authentication(*scheme, username, password);
        }

        let pool = self.pool.unwrap_or_else(|| Arc::new(ContextPool::new()));
        let handle = pool.alloc(ctx);

        PubNub {
            pool,
            handle,
            agent: self.agent,
            subscribe_ctx: Arc::new(AsyncMutex::new(SubscribeEngineContext::new(vec![], vec![]))),
            exit_tx: None,
            filter_expr: self.filter_expr,
            logger: self.logger.unwrap_or_else(|| Arc::new(LoggerManager::new())),
        }
    }
}

impl Drop for PubNub {
    fn drop(&mut self) {
        if let Some(tx) = self.exit_tx.take() {
            let _ = tx.unbounded_send(());
        }
        self.pool.free(&self.handle);
        self.pool.reclaim_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logger() {
        let env = env_logger::Env::default().default_filter_or("pubnub=debug");
        let _ = env_logger::Builder::from_env(env).is_test(true).try_init();
    }

    #[test]
    fn builder_defaults_to_tls_and_no_proxy() {
        let pubnub = PubNubBuilder::new("demo", "demo").build();
        assert_eq!(pubnub.last_http_code(), 0);
        assert_eq!(pubnub.last_time_token(), "0");
    }

    #[tokio::test]
    async fn builder_applies_identity_and_origin_overrides() {
        init_logger();
        let pubnub = PubNubBuilder::new("demo", "demo")
            .origin("ps.pndsn.com")
            .agent("test-agent")
            .user_id("test-user")
            .auth_key("auth-key-1")
            .build();
        assert_eq!(pubnub.uuid().await, "test-user");
        assert_eq!(pubnub.agent, "test-agent");
    }

    #[test]
    fn fresh_client_has_no_publish_result_or_response_elements_yet() {
        let pubnub = PubNubBuilder::new("demo", "demo").build();
        assert_eq!(pubnub.last_publish_result(), None);
        assert_eq!(pubnub.get(), None);
        assert_eq!(pubnub.get_channel(), None);
        assert_eq!(pubnub.get_v2(), None);
    }

    #[test]
    fn two_clients_share_a_pool_and_both_occupy_static_slots() {
        let pool = Arc::new(ContextPool::new());
        let a = PubNubBuilder::new("demo", "demo")
            .context_pool(Arc::clone(&pool))
            .build();
        let b = PubNubBuilder::new("demo", "demo")
            .context_pool(Arc::clone(&pool))
            .build();
        assert_eq!(pool.static_slots_in_use(), 2);
        drop(a);
        drop(b);
        assert_eq!(pool.static_slots_in_use(), 0);
    }
}
