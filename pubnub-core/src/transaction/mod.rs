//! Transaction State Machine (§4.5): drives one request/response cycle
//! over the Connection Engine, including the proxy-auth 407 dialogue and
//! the publish/subscribe response-interpretation rules.
//!
//! States: `idle -> resolving -> connecting -> (tls_handshake)? ->
//! send_headers -> send_body? -> read_status -> read_headers ->
//! (proxy_auth_dialogue)? -> read_body -> done`. Rust's `async`/`await`
//! models the suspension points directly (§5), so this module is a
//! single `async fn` rather than a hand-rolled poll loop; `log::debug!`
//! call sites mark each state transition the way the teacher logs
//! outgoing URLs.

pub mod endpoint;

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::buffer::TxBuffer;
use crate::connection::{self, keepalive::KeepAlivePool, AddressPreference, Connection, SslOptions};
use crate::error::PubnubError;
use crate::http::{read_response, ParsedResponse};
use crate::proxy::{self, ProxyConfig, ProxyProtocol, PROXY_AUTH_DIALOGUE_HOP_LIMIT};
use endpoint::{EndpointRequest, Method};

/// Where a transaction connects: the origin, reached either directly or
/// through `proxy`.
#[derive(Debug, Clone)]
pub struct Origin {
    /// Origin hostname (no scheme, no port).
    pub host: String,
    /// Origin port (443 for TLS, 80 otherwise, unless overridden).
    pub port: u16,
}

/// Everything the state machine needs that isn't carried on
/// [`EndpointRequest`] itself: where to connect, how, and with what
/// buffers.
pub struct TransactionContext {
    /// The PubNub origin (or a test double's).
    pub origin: Origin,
    /// TLS options.
    pub ssl: SslOptions,
    /// Proxy configuration; `ProxyProtocol::None` for a direct
    /// connection.
    pub proxy: ProxyConfig,
    /// Keep-Alive pool for this context (persists across transactions).
    pub keep_alive: KeepAlivePool,
    /// `wait_connect` bound on the TCP handshake.
    pub wait_connect: Duration,
    /// TX buffer capacity (bounds the assembled request).
    pub tx_capacity: usize,
    /// RX buffer capacity (bounds the response body).
    pub rx_capacity: usize,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// How many transactions have run over the current Keep-Alive
    /// socket so far.
    pub ops_used: u32,
}

/// How the final status/body of a response should be interpreted,
/// per-operation (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Any non-2xx is `http_error`.
    Standard,
    /// Any non-2xx still parses the body and reports `publish_failed`
    /// with the server's own reason text.
    Publish,
    /// 2xx is additionally required to be a `[...]` JSON array, or the
    /// response is `format_error`.
    Subscribe,
}

fn build_request_bytes(
    req: &EndpointRequest,
    host: &str,
    user_agent: &str,
    accept_gzip: bool,
    proxy_authorization: Option<&str>,
    absolute_uri: Option<&str>,
) -> Vec<u8> {
    let method = match req.method {
        Method::Get => "GET",
        Method::Post => "POST",
    };
    let target = match absolute_uri {
        Some(abs) => abs.to_string(),
        None => req.path_and_query(),
    };

    let mut out = format!("{} {} HTTP/1.1\r\n", method, target);
    out.push_str(&format!("Host: {}\r\n", host));
    out.push_str(&format!("User-Agent: {}\r\n", user_agent));
    if accept_gzip {
        out.push_str("Accept-Encoding: gzip\r\n");
    }
    if let Some(auth) = proxy_authorization {
        out.push_str(&format!("Proxy-Authorization: {}\r\n", auth));
    }
    if let Some(body) = &req.body {
        out.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    out.push_str("\r\n");

    let mut bytes = out.into_bytes();
    if let Some(body) = &req.body {
        bytes.extend_from_slice(body);
    }
    bytes
}

fn request_uri(req: &EndpointRequest, host: &str) -> String {
    format!("https://{}{}", host, req.path_and_query())
}

async fn connect_for_transaction(ctx: &mut TransactionContext) -> Result<Connection, PubnubError> {
    if let Some(pooled) = ctx.keep_alive.take_usable() {
        log::debug!("reusing Keep-Alive socket to {}", ctx.origin.host);
        return Ok(pooled);
    }

    let (connect_host, connect_port) = match ctx.proxy.protocol {
        ProxyProtocol::None => (ctx.origin.host.clone(), ctx.origin.port),
        ProxyProtocol::HttpGet | ProxyProtocol::HttpConnect => {
            (ctx.proxy.host.clone(), ctx.proxy.port)
        }
    };

    log::debug!("connecting to {}:{}", connect_host, connect_port);

    match ctx.proxy.protocol {
        ProxyProtocol::HttpConnect => {
            let mut tcp = connection::connect(
                &connection::resolve(&connect_host, connect_port, AddressPreference::Ipv4First)
                    .await?,
                ctx.wait_connect,
            )
            .await?;

            let connect_line = format!(
                "CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n\r\n",
                host = ctx.origin.host,
                port = ctx.origin.port
            );
            tcp.write_all(connect_line.as_bytes())
                .await
                .map_err(PubnubError::from)?;
            let response = read_response(&mut tcp, ctx.rx_capacity).await?;
            if response.status.code != 200 {
                return Err(PubnubError::IoError(format!(
                    "CONNECT tunnel rejected with status {}",
                    response.status.code
                )));
            }

            if ctx.ssl.use_ssl {
                let tls = connection::tls_handshake(tcp, &ctx.origin.host, &ctx.ssl).await?;
                Ok(Connection::Tls(Box::new(tls)))
            } else {
                Ok(Connection::Plain(tcp))
            }
        }
        ProxyProtocol::HttpGet | ProxyProtocol::None => {
            connection::establish(
                &connect_host,
                connect_port,
                AddressPreference::Ipv4First,
                ctx.wait_connect,
                &ctx.ssl,
            )
            .await
        }
    }
}

/// Drive one complete request/response transaction, including the
/// proxy-auth dialogue (up to [`PROXY_AUTH_DIALOGUE_HOP_LIMIT`] rounds)
/// and, for [`ResponseKind::Publish`]/[`ResponseKind::Subscribe`], the
/// response-interpretation rules.
pub async fn execute(
    ctx: &mut TransactionContext,
    request: &EndpointRequest,
    kind: ResponseKind,
) -> Result<ParsedResponse, PubnubError> {
    let mut connection = connect_for_transaction(ctx).await?;

    let host_header = ctx.origin.host.clone();
    let absolute_uri = match ctx.proxy.protocol {
        ProxyProtocol::HttpGet => Some(request_uri(request, &host_header)),
        _ => None,
    };

    let mut proxy_authorization = None;
    let mut response = send_and_read(
        &mut connection,
        request,
        &host_header,
        &ctx.user_agent,
        proxy_authorization.as_deref(),
        absolute_uri.as_deref(),
        ctx.tx_capacity,
        ctx.rx_capacity,
    )
    .await?;

    let mut hops = 0;
    while response.status.code == 407 && ctx.proxy.protocol != ProxyProtocol::None {
        if hops >= PROXY_AUTH_DIALOGUE_HOP_LIMIT {
            return Err(PubnubError::AuthenticationFailed(
                "proxy authentication dialogue exceeded the hop limit".into(),
            ));
        }
        hops += 1;

        let method_str = match request.method {
            Method::Get => "GET",
            Method::Post => "POST",
        };
        let uri = request.path_and_query();
        let body = request.body.as_deref().unwrap_or(&[]);
        let header = proxy::authorization_for_407(
            &mut ctx.proxy,
            &response.headers,
            method_str,
            &uri,
            body,
        )?;
        proxy_authorization = header;

        response = send_and_read(
            &mut connection,
            request,
            &host_header,
            &ctx.user_agent,
            proxy_authorization.as_deref(),
            absolute_uri.as_deref(),
            ctx.tx_capacity,
            ctx.rx_capacity,
        )
        .await?;
    }

    ctx.ops_used += 1;
    ctx.keep_alive.retain(connection, ctx.ops_used);

    finalize(kind, response)
}

async fn send_and_read(
    connection: &mut Connection,
    request: &EndpointRequest,
    host: &str,
    user_agent: &str,
    proxy_authorization: Option<&str>,
    absolute_uri: Option<&str>,
    tx_capacity: usize,
    rx_capacity: usize,
) -> Result<ParsedResponse, PubnubError> {
    let bytes = build_request_bytes(
        request,
        host,
        user_agent,
        true,
        proxy_authorization,
        absolute_uri,
    );
    let mut tx = TxBuffer::with_capacity(tx_capacity);
    tx.fill(&bytes)?;
    connection
        .write_all(tx.as_slice())
        .await
        .map_err(PubnubError::from)?;
    read_response(connection, rx_capacity).await
}

fn finalize(kind: ResponseKind, response: ParsedResponse) -> Result<ParsedResponse, PubnubError> {
    match kind {
        ResponseKind::Standard => {
            if !(200..300).contains(&response.status.code) {
                return Err(PubnubError::HttpError {
                    status: response.status.code,
                });
            }
            if let Some(reason) = error_on_server_reason(&response.body) {
                return Err(PubnubError::ErrorOnServer(reason));
            }
            Ok(response)
        }
        ResponseKind::Publish => {
            if !(200..300).contains(&response.status.code) {
                let reason = publish_failure_reason(&response.body);
                return Err(PubnubError::PublishFailed(reason));
            }
            Ok(response)
        }
        ResponseKind::Subscribe => {
            if !(200..300).contains(&response.status.code) {
                return Err(PubnubError::HttpError {
                    status: response.status.code,
                });
            }
            let text = String::from_utf8_lossy(&response.body);
            let trimmed = text.trim();
            if !trimmed.starts_with('[') || !trimmed.ends_with(']') {
                return Err(PubnubError::FormatError(
                    "subscribe body is not a JSON array".into(),
                ));
            }
            Ok(response)
        }
    }
}

/// Detect a message-counts/advanced-history-shaped `{..., "error":
/// true, ...}` object body and extract its reason text, if any (§6
/// "Advanced history returns `{status, error, error_message,
/// channels: {...}}`", §7 `error_on_server`).
fn error_on_server_reason(body: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(body);
    let parsed = json::parse(&text).ok()?;
    if parsed["error"].as_bool() != Some(true) {
        return None;
    }
    let reason = parsed["error_message"]
        .as_str()
        .or_else(|| parsed["message"].as_str())
        .unwrap_or("server reported an error")
        .to_string();
    Some(reason)
}

fn publish_failure_reason(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match json::parse(&text) {
        Ok(json::JsonValue::Array(items)) => items
            .get(1)
            .map(|v| v.as_str().unwrap_or("unknown error").to_string())
            .unwrap_or_else(|| "unknown error".to_string()),
        _ => text.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_finalize_passes_2xx() {
        let response = ParsedResponse {
            status: crate::http::StatusLine {
                minor_version: 1,
                code: 200,
                reason: "OK".into(),
            },
            headers: crate::http::HeaderMap::new(),
            body: vec![],
        };
        assert!(finalize(ResponseKind::Standard, response).is_ok());
    }

    #[test]
    fn publish_non_2xx_extracts_server_reason() {
        let response = ParsedResponse {
            status: crate::http::StatusLine {
                minor_version: 1,
                code: 400,
                reason: "Bad Request".into(),
            },
            headers: crate::http::HeaderMap::new(),
            body: br#"[0,"Invalid Channel"]"#.to_vec(),
        };
        let result = finalize(ResponseKind::Publish, response);
        match result {
            Err(PubnubError::PublishFailed(reason)) => assert_eq!(reason, "Invalid Channel"),
            other => panic!("unexpected: {:?}", other.is_ok()),
        }
    }

    #[test]
    fn subscribe_rejects_non_array_body() {
        let response = ParsedResponse {
            status: crate::http::StatusLine {
                minor_version: 1,
                code: 200,
                reason: "OK".into(),
            },
            headers: crate::http::HeaderMap::new(),
            body: br#"{"oops":true}"#.to_vec(),
        };
        let result = finalize(ResponseKind::Subscribe, response);
        assert!(matches!(result, Err(PubnubError::FormatError(_))));
    }

    #[test]
    fn standard_detects_error_on_server() {
        // Advanced history/message-counts report an in-body error at HTTP
        // 200 (the body's own `status` field carries the real code).
        let response = ParsedResponse {
            status: crate::http::StatusLine {
                minor_version: 1,
                code: 200,
                reason: "OK".into(),
            },
            headers: crate::http::HeaderMap::new(),
            body: br#"{"status":400,"error":true,"error_message":"Invalid arguments","channels":{}}"#.to_vec(),
        };
        let result = finalize(ResponseKind::Standard, response);
        match result {
            Err(PubnubError::ErrorOnServer(reason)) => assert_eq!(reason, "Invalid arguments"),
            other => panic!("unexpected: {:?}", other.is_ok()),
        }
    }

    #[test]
    fn subscribe_accepts_well_formed_array_body() {
        let response = ParsedResponse {
            status: crate::http::StatusLine {
                minor_version: 1,
                code: 200,
                reason: "OK".into(),
            },
            headers: crate::http::HeaderMap::new(),
            body: br#"[[],"14178940800777403"]"#.to_vec(),
        };
        assert!(finalize(ResponseKind::Subscribe, response).is_ok());
    }
}
