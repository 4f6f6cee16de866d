//! RFC 7617 Basic proxy authentication.

/// Build the `Proxy-Authorization: Basic <token>` header value. Emitted
/// on every subsequent request until credentials change (§4.3); the
/// caller (`proxy::authorization_for_407`) is responsible for tracking
/// "subsequent" via [`super::ProxyConfig::basic_sent`].
#[must_use]
pub fn authorization_header(username: &str, password: &str) -> String {
    let token = base64::encode(format!("{}:{}", username, password));
    format!("Basic {}", token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_user_colon_pass() {
        let header = authorization_header("Aladdin", "open sesame");
        assert_eq!(header, "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }
}
