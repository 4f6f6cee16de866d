//! The single result/error enum covering every transaction outcome (§7).

use thiserror::Error;

/// Every terminal (and a couple of non-terminal, informational) outcome a
/// transaction can report.
///
/// Mirrors `enum pubnub_res` from the C core (`original_source/core/
/// pubnub_res.h`) one-for-one, plus the additional kinds §7 adds for this
/// port (`publish_failed`, `authentication_failed`, `bad_compression_format`,
/// `error_on_server`, `invalid_parameters`).
#[derive(Debug, Error)]
pub enum PubnubError {
    /// Non-blocking progress indicator: the transaction has been started
    /// but the terminal outcome isn't known yet. Not logged as an error.
    #[error("transaction started")]
    Started,

    /// Non-blocking progress indicator: a step produced no terminal
    /// outcome; the caller (or the runtime, in callback mode) must drive
    /// the state machine again.
    #[error("transaction in progress")]
    InProgress,

    /// The transaction timer elapsed, or a socket read returned zero
    /// bytes when the framing said more were expected.
    #[error("transaction timed out")]
    Timeout,

    /// TCP reset or equivalent abrupt close.
    #[error("connection aborted")]
    Aborted,

    /// Transport or HTTP framing failure.
    #[error("I/O error: {0}")]
    IoError(String),

    /// HTTP status >= 400 not remapped to a more specific kind.
    #[error("HTTP error, status {status}")]
    HttpError {
        /// The HTTP status code returned.
        status: u16,
    },

    /// The response was valid HTTP but its body violated the endpoint's
    /// expected JSON shape.
    #[error("response format error: {0}")]
    FormatError(String),

    /// A publish-specific 4xx with the server's own reason text.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// The caller's `cancel` completed.
    #[error("transaction cancelled")]
    Cancelled,

    /// The previous response wasn't drained before a new transaction was
    /// started.
    #[error("receive buffer from previous transaction not yet drained")]
    RxBuffNotEmpty,

    /// The assembled request would not fit in the TX buffer.
    #[error("request ({needed} bytes) exceeds TX buffer capacity ({capacity} bytes)")]
    TxBuffTooSmall {
        /// Bytes the request would have needed.
        needed: usize,
        /// The TX buffer's fixed capacity.
        capacity: usize,
    },

    /// A channel/group name failed validation before any I/O occurred.
    #[error("invalid channel: {0}")]
    InvalidChannel(String),

    /// An argument failed validation before any I/O occurred.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The proxy authentication dialogue terminated unsuccessfully.
    #[error("proxy authentication failed: {0}")]
    AuthenticationFailed(String),

    /// gzip inflate failed (bad magic, method, flags, or `ISIZE`
    /// mismatch).
    #[error("bad compression format: {0}")]
    BadCompressionFormat(String),

    /// An `error: true` response body from an endpoint that reports
    /// server-side errors inline (message-counts and similar).
    #[error("error reported by server: {0}")]
    ErrorOnServer(String),

    /// A second transaction was attempted on a context that already had
    /// one in flight.
    #[error("a transaction is already in progress on this context")]
    AlreadyInProgress,
}

impl PubnubError {
    /// True for the two non-terminal, purely informational variants.
    #[must_use]
    pub fn is_informational(&self) -> bool {
        matches!(self, PubnubError::Started | PubnubError::InProgress)
    }
}

impl From<std::io::Error> for PubnubError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::TimedOut => PubnubError::Timeout,
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => PubnubError::Aborted,
            _ => PubnubError::IoError(err.to_string()),
        }
    }
}

impl From<native_tls::Error> for PubnubError {
    fn from(err: native_tls::Error) -> Self {
        PubnubError::IoError(format!("TLS error: {}", err))
    }
}

impl From<json::Error> for PubnubError {
    fn from(err: json::Error) -> Self {
        PubnubError::FormatError(err.to_string())
    }
}
