//! Status-line and header parsing.

use crate::error::PubnubError;

/// A parsed `HTTP/1.x <code> <reason>` line.
#[derive(Debug, Clone)]
pub struct StatusLine {
    /// The minor version digit (`1` for `HTTP/1.1`, `0` for `HTTP/1.0`).
    pub minor_version: u8,
    /// The three-digit status code.
    pub code: u16,
    /// The reason phrase, verbatim.
    pub reason: String,
}

impl StatusLine {
    /// Parse a single CRLF-terminated (or bare `\n`-terminated, tolerated)
    /// status line.
    ///
    /// `HTTP/0.9` and anything not matching `HTTP/1.<digit>` is rejected
    /// with [`PubnubError::IoError`], per §4.2.
    pub fn parse(line: &str) -> Result<Self, PubnubError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut parts = line.splitn(3, ' ');
        let version = parts
            .next()
            .ok_or_else(|| PubnubError::IoError("empty status line".into()))?;
        let code = parts
            .next()
            .ok_or_else(|| PubnubError::IoError("missing status code".into()))?;
        let reason = parts.next().unwrap_or("").to_string();

        let minor_version = match version {
            "HTTP/1.0" => 0,
            "HTTP/1.1" => 1,
            _ => {
                return Err(PubnubError::IoError(format!(
                    "unsupported HTTP version: {}",
                    version
                )))
            }
        };

        let code: u16 = code
            .parse()
            .map_err(|_| PubnubError::IoError(format!("malformed status code: {}", code)))?;

        Ok(StatusLine {
            minor_version,
            code,
            reason,
        })
    }
}

/// Case-insensitive header store, preserving the order headers arrived
/// in.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    pairs: Vec<(String, String)>,
}

impl HeaderMap {
    /// An empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a single `field-name: OWS field-value OWS` header line.
    pub fn parse_line(line: &str) -> Option<(String, String)> {
        let line = line.trim_end_matches(['\r', '\n']);
        let idx = line.find(':')?;
        let name = line[..idx].trim().to_string();
        let value = line[idx + 1..].trim().to_string();
        if name.is_empty() {
            return None;
        }
        Some((name, value))
    }

    /// Record a header.
    pub fn insert(&mut self, name: String, value: String) {
        self.pairs.push((name, value));
    }

    /// Look up a header by name, case-insensitively. Returns the first
    /// match in arrival order.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// True if a header with this name and this exact (case-insensitive)
    /// token value is present, e.g. `Transfer-Encoding: chunked`.
    #[must_use]
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.get(name)
            .map(|v| v.split(',').any(|part| part.trim().eq_ignore_ascii_case(token)))
            .unwrap_or(false)
    }

    /// Iterate all headers in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_http_0_9() {
        assert!(StatusLine::parse("HTTP/0.9 200 OK").is_err());
    }

    #[test]
    fn rejects_malformed_version() {
        assert!(StatusLine::parse("GARBAGE 200 OK").is_err());
    }

    #[test]
    fn parses_1_1_with_reason() {
        let sl = StatusLine::parse("HTTP/1.1 200 OK\r\n").unwrap();
        assert_eq!(sl.minor_version, 1);
        assert_eq!(sl.code, 200);
        assert_eq!(sl.reason, "OK");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Length".into(), "30".into());
        assert_eq!(headers.get("content-length"), Some("30"));
        assert_eq!(headers.get("CONTENT-LENGTH"), Some("30"));
    }

    #[test]
    fn has_token_matches_chunked() {
        let mut headers = HeaderMap::new();
        headers.insert("Transfer-Encoding".into(), "chunked".into());
        assert!(headers.has_token("transfer-encoding", "chunked"));
        assert!(!headers.has_token("transfer-encoding", "gzip"));
    }
}
