//! Proxy authentication (§4.3): Basic, Digest, and NTLM dialogues
//! triggered by a `407 Proxy Authentication Required` response.
//!
//! Each scheme's message-building is a pure function of
//! `(server-challenge, credentials, request-line)`, isolated from sockets
//! so it can be exercised with literal test vectors (§9 design note).

pub mod basic;
pub mod digest;
pub mod ntlm;

use crate::error::PubnubError;
use crate::http::HeaderMap;

/// How the context should reach the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyProtocol {
    /// No proxy.
    None,
    /// Absolute-URI `GET`-style proxying; cannot carry HTTPS end-to-end.
    HttpGet,
    /// `CONNECT`-tunnel proxying, after which the connection is treated
    /// as the direct end-to-end socket (TLS, if enabled, happens on top).
    HttpConnect,
}

/// Which authentication scheme the proxy has asked for / the client is
/// configured to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyAuthScheme {
    /// No authentication.
    None,
    /// RFC 7617 Basic.
    Basic,
    /// RFC 7616 Digest.
    Digest,
    /// Microsoft NTLM.
    Ntlm,
}

/// Static proxy configuration plus whatever dialogue state has
/// accumulated across this context's transactions.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Where the proxy is reached.
    pub protocol: ProxyProtocol,
    /// Proxy host.
    pub host: String,
    /// Proxy port.
    pub port: u16,
    /// Which scheme to answer a 407 with.
    pub auth_scheme: ProxyAuthScheme,
    /// Authentication realm, if known in advance.
    pub realm: Option<String>,
    /// Proxy username.
    pub username: String,
    /// Proxy password.
    pub password: String,
    /// Accumulated Digest dialogue state (nonce/cnonce/nc/qop/opaque/algorithm).
    pub digest: digest::DigestState,
    /// Accumulated NTLM dialogue state.
    pub ntlm: ntlm::NtlmState,
    /// Whether a Basic credential was already sent once (a second 407
    /// after that is `authentication_failed`, §4.3).
    pub basic_sent: bool,
}

impl ProxyConfig {
    /// A context with no proxy configured.
    #[must_use]
    pub fn none() -> Self {
        ProxyConfig {
            protocol: ProxyProtocol::None,
            host: String::new(),
            port: 0,
            auth_scheme: ProxyAuthScheme::None,
            realm: None,
            username: String::new(),
            password: String::new(),
            digest: digest::DigestState::default(),
            ntlm: ntlm::NtlmState::default(),
            basic_sent: false,
        }
    }
}

/// Maximum number of 407-retry round trips within one transaction (§4.5).
pub const PROXY_AUTH_DIALOGUE_HOP_LIMIT: u8 = 3;

/// Compute the `Proxy-Authorization` header value to send in response to
/// a `407` carrying `proxy_authenticate`, given the method/URI of the
/// request being retried and (for NTLMv2/`qop=auth-int`) the request body.
///
/// Returns `Ok(None)` only for [`ProxyAuthScheme::None`] (no header should
/// be added). Any other scheme either returns a header value or an error
/// (`authentication_failed` if the dialogue cannot proceed, e.g. a stale
/// realm mismatch or a second 407 after Basic credentials were already
/// sent).
pub fn authorization_for_407(
    config: &mut ProxyConfig,
    proxy_authenticate: &HeaderMap,
    method: &str,
    uri: &str,
    body: &[u8],
) -> Result<Option<String>, PubnubError> {
    match config.auth_scheme {
        ProxyAuthScheme::None => Err(PubnubError::HttpError { status: 407 }),
        ProxyAuthScheme::Basic => {
            if config.basic_sent {
                return Err(PubnubError::AuthenticationFailed(
                    "proxy rejected Basic credentials a second time".into(),
                ));
            }
            config.basic_sent = true;
            Ok(Some(basic::authorization_header(
                &config.username,
                &config.password,
            )))
        }
        ProxyAuthScheme::Digest => {
            let challenge = proxy_authenticate
                .get("Proxy-Authenticate")
                .ok_or_else(|| {
                    PubnubError::AuthenticationFailed("missing Proxy-Authenticate header".into())
                })?;
            let parsed = digest::Challenge::parse(challenge)?;
            digest::advance(&mut config.digest, &parsed)?;
            Ok(Some(digest::authorization_header(
                &mut config.digest,
                &config.username,
                &config.password,
                method,
                uri,
                body,
            )))
        }
        ProxyAuthScheme::Ntlm => {
            let challenge = proxy_authenticate.get("Proxy-Authenticate");
            ntlm::advance(&mut config.ntlm, challenge, &config.username, &config.password)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_scheme_surfaces_http_error() {
        let mut config = ProxyConfig::none();
        let headers = HeaderMap::new();
        let result = authorization_for_407(&mut config, &headers, "GET", "/", b"");
        assert!(matches!(result, Err(PubnubError::HttpError { status: 407 })));
    }

    #[test]
    fn basic_second_407_is_authentication_failed() {
        let mut config = ProxyConfig::none();
        config.auth_scheme = ProxyAuthScheme::Basic;
        config.username = "u".into();
        config.password = "p".into();
        let headers = HeaderMap::new();
        assert!(authorization_for_407(&mut config, &headers, "GET", "/", b"").is_ok());
        let result = authorization_for_407(&mut config, &headers, "GET", "/", b"");
        assert!(matches!(result, Err(PubnubError::AuthenticationFailed(_))));
    }
}
