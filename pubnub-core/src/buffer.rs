//! Fixed-capacity and growable byte buffers with the `(start, cursor,
//! end)` invariant every network operation relies on.
//!
//! The source this is ported from tracked a raw `(ptr, left, unreadlen)`
//! cursor triple over a C array; here the same semantics are expressed as
//! bounds-checked indices into an owned `Vec<u8>` (see the re-architecture
//! note in `SPEC_FULL.md` §9).

use crate::error::PubnubError;

/// The TX buffer holding one outgoing, fully-formatted HTTP request.
///
/// Fixed capacity: a request that would not fit is rejected at build time
/// rather than silently truncated.
#[derive(Debug)]
pub struct TxBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl TxBuffer {
    /// Minimum capacity the spec allows (§3 "Receive buffers").
    pub const MIN_CAPACITY: usize = 1024;
    /// The capacity most deployments use.
    pub const DEFAULT_CAPACITY: usize = 32 * 1024;

    /// Create an empty TX buffer with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is below [`TxBuffer::MIN_CAPACITY`]; this is a
    /// configuration mistake, not a runtime condition.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity >= Self::MIN_CAPACITY,
            "TX buffer capacity must be at least {} bytes",
            Self::MIN_CAPACITY
        );
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Replace the buffer contents with `request`, failing if it would not
    /// fit.
    pub fn fill(&mut self, request: &[u8]) -> Result<(), PubnubError> {
        if request.len() > self.capacity {
            return Err(PubnubError::TxBuffTooSmall {
                needed: request.len(),
                capacity: self.capacity,
            });
        }
        self.data.clear();
        self.data.extend_from_slice(request);
        Ok(())
    }

    /// Borrow the assembled request bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Remaining space available for a request, in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TxBuffer {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

/// The RX buffer accumulating one incoming HTTP response.
///
/// Invariant (checked in debug builds by [`RxBuffer::assert_invariant`]):
/// `start + left + unreadlen == data.len()` always, where:
/// - `start` is the index of the first unconsumed byte the caller hasn't
///   yet stepped past via [`RxBuffer::consume`],
/// - `left` is how many of those bytes are *available to read* (already
///   received from the socket),
/// - `unreadlen` is how many more bytes the current framing (content
///   length / chunk length) says are still coming but haven't arrived.
///
/// `Growable` buffers reallocate on demand (bounded only by a configured
/// ceiling); `Fixed` buffers never reallocate past their initial capacity
/// and report `io_error` when framing would exceed it.
#[derive(Debug)]
pub enum RxBuffer {
    /// Never grows past `capacity`.
    Fixed { data: Vec<u8>, capacity: usize },
    /// Grows up to `max_capacity` as needed.
    Growable {
        data: Vec<u8>,
        max_capacity: usize,
    },
}

impl RxBuffer {
    /// A fixed-capacity RX buffer.
    #[must_use]
    pub fn fixed(capacity: usize) -> Self {
        RxBuffer::Fixed {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// A growable RX buffer, bounded by `max_capacity`.
    #[must_use]
    pub fn growable(max_capacity: usize) -> Self {
        RxBuffer::Growable {
            data: Vec::new(),
            max_capacity,
        }
    }

    /// The hard ceiling this buffer will never exceed.
    #[must_use]
    pub fn capacity(&self) -> usize {
        match self {
            RxBuffer::Fixed { capacity, .. } => *capacity,
            RxBuffer::Growable { max_capacity, .. } => *max_capacity,
        }
    }

    /// Bytes currently held (already received, not yet truncated).
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            RxBuffer::Fixed { data, .. } | RxBuffer::Growable { data, .. } => data.len(),
        }
    }

    /// True if no bytes are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard everything, preparing for the next transaction. A context
    /// whose previous response was fully drained by the caller returns
    /// here before starting a new one (§3 invariant: "at most one
    /// in-flight request").
    pub fn reset(&mut self) {
        match self {
            RxBuffer::Fixed { data, .. } | RxBuffer::Growable { data, .. } => data.clear(),
        }
    }

    /// Append `bytes` as received from the socket.
    ///
    /// For a `Fixed` buffer, returns [`PubnubError::IoError`] if the
    /// result would exceed capacity (this is how oversize `Content-Length`
    /// and chunked bodies are rejected, per §4.2). For `Growable`, grows
    /// up to `max_capacity` and reports the same error past that.
    pub fn extend(&mut self, bytes: &[u8]) -> Result<(), PubnubError> {
        match self {
            RxBuffer::Fixed { data, capacity } => {
                if data.len() + bytes.len() > *capacity {
                    return Err(PubnubError::IoError(format!(
                        "response exceeds fixed RX buffer capacity ({} bytes)",
                        capacity
                    )));
                }
                data.extend_from_slice(bytes);
                Ok(())
            }
            RxBuffer::Growable { data, max_capacity } => {
                if data.len() + bytes.len() > *max_capacity {
                    return Err(PubnubError::IoError(format!(
                        "response exceeds growable RX buffer ceiling ({} bytes)",
                        max_capacity
                    )));
                }
                data.extend_from_slice(bytes);
                Ok(())
            }
        }
    }

    /// Borrow everything currently held.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        match self {
            RxBuffer::Fixed { data, .. } | RxBuffer::Growable { data, .. } => data,
        }
    }

    /// Replace the held bytes wholesale (used after gzip inflate, which
    /// always targets an auxiliary buffer per the §9 design note, then
    /// swaps the inflated bytes back in).
    pub fn replace(&mut self, bytes: Vec<u8>) -> Result<(), PubnubError> {
        if bytes.len() > self.capacity() {
            return Err(PubnubError::IoError(format!(
                "inflated response ({} bytes) exceeds RX buffer capacity ({} bytes)",
                bytes.len(),
                self.capacity()
            )));
        }
        match self {
            RxBuffer::Fixed { data, .. } | RxBuffer::Growable { data, .. } => *data = bytes,
        }
        Ok(())
    }
}

/// A cursor view over an [`RxBuffer`] used while the caller iterates
/// comma-separated JSON elements (`get`) or channel names (`get_channel`).
///
/// `ptr` is the index of the next unread byte; `left` is how many bytes of
/// the held response remain unread from `ptr`; there is no `unreadlen`
/// component here because by the time a cursor exists the whole body has
/// already been received (framing-level `unreadlen` lives on
/// [`RxBuffer`]/the HTTP reader, not here) — so the simplified invariant
/// is `ptr + left == data.len()`.
#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    ptr: usize,
    left: usize,
}

impl Cursor {
    /// A cursor covering the whole of `data`.
    #[must_use]
    pub fn over(data: &[u8]) -> Self {
        Cursor {
            ptr: 0,
            left: data.len(),
        }
    }

    /// A cursor with nothing left to read (e.g. an empty message list).
    #[must_use]
    pub fn empty() -> Self {
        Cursor { ptr: 0, left: 0 }
    }

    /// Current read position.
    #[must_use]
    pub fn ptr(&self) -> usize {
        self.ptr
    }

    /// Bytes remaining from `ptr`.
    #[must_use]
    pub fn left(&self) -> usize {
        self.left
    }

    /// Advance the cursor by `n` bytes (e.g. past a consumed element and
    /// its separating comma).
    ///
    /// # Panics
    ///
    /// Panics if `n > self.left()` — callers only ever advance past bytes
    /// they have already located within `data`.
    pub fn advance(&mut self, n: usize) {
        assert!(n <= self.left, "cursor advanced past buffer end");
        self.ptr += n;
        self.left -= n;
    }

    /// True once every byte has been consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.left == 0
    }
}

/// From the start of `data`, locate where the current top-level element
/// ends and how many bytes (the element plus a trailing comma, if any)
/// were consumed. Tracks `[`/`{` nesting depth and backslash-escaped
/// `"..."` strings so a comma inside either doesn't split early — this is
/// the one routine [`top_level_split`] and [`ResponseView`]'s cursor
/// stepping both build on.
fn scan_element(data: &[u8]) -> (usize, usize) {
    let mut depth = 0i32;
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, &b) in data.iter().enumerate() {
        if in_quotes {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_quotes = false;
            }
            continue;
        }
        match b {
            b'"' => in_quotes = true,
            b'[' | b'{' => depth += 1,
            b']' | b'}' => depth -= 1,
            b',' if depth == 0 => return (i, i + 1),
            _ => {}
        }
    }
    (data.len(), data.len())
}

/// Split `data` into its top-level comma-separated elements (raw, not
/// trimmed).
fn top_level_split(data: &[u8]) -> Vec<&[u8]> {
    let mut parts = Vec::new();
    let mut rest = data;
    loop {
        let (end, consumed) = scan_element(rest);
        parts.push(&rest[..end]);
        if consumed >= rest.len() {
            break;
        }
        rest = &rest[consumed..];
    }
    parts
}

fn trim_ws(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    let end = data
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    &data[start..end]
}

/// If `data` (after trimming) is wrapped in one layer of `open`/`close`,
/// return the inner slice; otherwise `None`.
fn strip_brackets(data: &[u8], open: u8, close: u8) -> Option<&[u8]> {
    let trimmed = trim_ws(data);
    if trimmed.len() >= 2 && trimmed[0] == open && trimmed[trimmed.len() - 1] == close {
        Some(&trimmed[1..trimmed.len() - 1])
    } else {
        None
    }
}

/// Strip one layer of enclosing `"..."`, if present; otherwise return
/// `data` unchanged.
fn strip_outer_quotes(data: &[u8]) -> &[u8] {
    strip_brackets(data, b'"', b'"').unwrap_or(data)
}

/// Step `cursor` to the next top-level element of `data`, returning it
/// (trimmed, raw bytes preserved verbatim) or `None` once exhausted.
fn next_element_from(data: &[u8], cursor: &mut Cursor) -> Option<String> {
    if cursor.is_exhausted() {
        return None;
    }
    let start = cursor.ptr();
    let remaining = &data[start..start + cursor.left()];
    let (end, consumed) = scan_element(remaining);
    let element = trim_ws(&remaining[..end]);
    let text = String::from_utf8_lossy(element).into_owned();
    cursor.advance(consumed);
    Some(text)
}

/// Extract the raw (quote-preserving) element at `index` among `body`'s
/// top-level comma-separated elements, stripping one layer of enclosing
/// `[...]`/`{...}` first if present. Used for `last_publish_result`
/// (index 1 of a `[status, "text", timetoken]` publish body).
#[must_use]
pub fn nth_top_level_element(body: &[u8], index: usize) -> Option<String> {
    let trimmed = trim_ws(body);
    let outer = strip_brackets(trimmed, b'[', b']')
        .or_else(|| strip_brackets(trimmed, b'{', b'}'))
        .unwrap_or(trimmed);
    top_level_split(outer)
        .get(index)
        .map(|raw| String::from_utf8_lossy(trim_ws(raw)).into_owned())
}

/// A stepped view over one response body's top-level elements, backing
/// the `get`/`get_channel`/`get_v2` accessors (§3 "Parsed response
/// view"). This never decodes JSON — each step returns the next
/// top-level element's raw bytes, quotes included, the same "find the
/// next element" operation the original core's cursor performed over its
/// RX buffer directly.
#[derive(Debug)]
pub struct ResponseView {
    msgs: Vec<u8>,
    msgs_cursor: Cursor,
    channels: Vec<u8>,
    channels_cursor: Cursor,
}

impl ResponseView {
    /// Build a view over a subscribe response body (`[[msgs...], "tt"
    /// (, "channels")?]`), returning it alongside the timetoken — the
    /// element immediately after the message array — when present.
    #[must_use]
    pub fn for_subscribe(body: &[u8]) -> (Self, Option<String>) {
        let trimmed = trim_ws(body);
        let outer = strip_brackets(trimmed, b'[', b']').unwrap_or(trimmed);
        let elements = top_level_split(outer);

        let msgs_src = elements.first().copied().unwrap_or(&[]);
        let msgs = strip_brackets(msgs_src, b'[', b']')
            .unwrap_or(msgs_src)
            .to_vec();

        let timetoken = elements
            .get(1)
            .map(|raw| String::from_utf8_lossy(strip_outer_quotes(trim_ws(raw))).into_owned());

        let channels = if elements.len() >= 3 {
            strip_outer_quotes(trim_ws(elements[elements.len() - 1])).to_vec()
        } else {
            Vec::new()
        };

        let msgs_cursor = Cursor::over(&msgs);
        let channels_cursor = Cursor::over(&channels);
        (
            ResponseView {
                msgs,
                msgs_cursor,
                channels,
                channels_cursor,
            },
            timetoken,
        )
    }

    /// Build a view treating the entire body as a single steppable
    /// element (§3: "for presence/other, the whole body as one
    /// element").
    #[must_use]
    pub fn whole_body(body: &[u8]) -> Self {
        let msgs = trim_ws(body).to_vec();
        let msgs_cursor = Cursor::over(&msgs);
        ResponseView {
            msgs,
            msgs_cursor,
            channels: Vec::new(),
            channels_cursor: Cursor::empty(),
        }
    }

    /// `get` — step to the next raw message element, `None` once
    /// exhausted.
    pub fn get(&mut self) -> Option<String> {
        next_element_from(&self.msgs, &mut self.msgs_cursor)
    }

    /// `get_channel` — step to the next raw channel-name element.
    pub fn get_channel(&mut self) -> Option<String> {
        next_element_from(&self.channels, &mut self.channels_cursor)
    }

    /// `get_v2` — `get`/`get_channel` stepped together as one pair.
    pub fn get_v2(&mut self) -> Option<(String, Option<String>)> {
        let message = self.get()?;
        let channel = self.get_channel();
        Some((message, channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_buffer_rejects_oversize_request() {
        let mut tx = TxBuffer::with_capacity(TxBuffer::MIN_CAPACITY);
        let huge = vec![b'a'; TxBuffer::MIN_CAPACITY + 1];
        assert!(matches!(
            tx.fill(&huge),
            Err(PubnubError::TxBuffTooSmall { .. })
        ));
    }

    #[test]
    fn tx_buffer_accepts_exact_fit() {
        let mut tx = TxBuffer::with_capacity(TxBuffer::MIN_CAPACITY);
        let exact = vec![b'a'; TxBuffer::MIN_CAPACITY];
        assert!(tx.fill(&exact).is_ok());
        assert_eq!(tx.as_slice().len(), TxBuffer::MIN_CAPACITY);
    }

    #[test]
    fn rx_fixed_buffer_rejects_overflow() {
        let mut rx = RxBuffer::fixed(8);
        assert!(rx.extend(b"12345678").is_ok());
        assert!(matches!(rx.extend(b"9"), Err(PubnubError::IoError(_))));
    }

    #[test]
    fn rx_growable_buffer_grows_until_ceiling() {
        let mut rx = RxBuffer::growable(16);
        assert!(rx.extend(b"12345678").is_ok());
        assert!(rx.extend(b"12345678").is_ok());
        assert!(matches!(rx.extend(b"x"), Err(PubnubError::IoError(_))));
    }

    #[test]
    fn cursor_invariant_holds_through_advances() {
        let data = b"abcdef";
        let mut cursor = Cursor::over(data);
        assert_eq!(cursor.ptr() + cursor.left(), data.len());
        cursor.advance(2);
        assert_eq!(cursor.ptr() + cursor.left(), data.len());
        assert!(!cursor.is_exhausted());
        cursor.advance(4);
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn publish_result_is_the_raw_quoted_second_element() {
        let body = br#"[1,"Sent","14178940800777403"]"#;
        assert_eq!(
            nth_top_level_element(body, 1).as_deref(),
            Some("\"Sent\"")
        );
    }

    #[test]
    fn subscribe_handshake_view_has_empty_messages_and_the_timetoken() {
        let body = br#"[[], "14179836755957292"]"#;
        let (mut view, timetoken) = ResponseView::for_subscribe(body);
        assert_eq!(timetoken.as_deref(), Some("14179836755957292"));
        assert_eq!(view.get(), None);
    }

    #[test]
    fn subscribe_steady_view_steps_messages_then_channels_in_order() {
        let body = br#"[[{"Wi"},["Xa"],"\"Qi\""],"14179857817724547","lim,morava,lim"]"#;
        let (mut view, timetoken) = ResponseView::for_subscribe(body);
        assert_eq!(timetoken.as_deref(), Some("14179857817724547"));
        assert_eq!(view.get().as_deref(), Some("{\"Wi\"}"));
        assert_eq!(view.get().as_deref(), Some("[\"Xa\"]"));
        assert_eq!(view.get().as_deref(), Some("\"\\\"Qi\\\"\""));
        assert_eq!(view.get(), None);
        assert_eq!(view.get_channel().as_deref(), Some("lim"));
        assert_eq!(view.get_channel().as_deref(), Some("morava"));
        assert_eq!(view.get_channel().as_deref(), Some("lim"));
        assert_eq!(view.get_channel(), None);
    }

    #[test]
    fn subscribe_chunked_view_steps_a_number_then_a_quoted_string() {
        let body = br#"[[1234,"Da"],"14179915548467106"]"#;
        let (mut view, timetoken) = ResponseView::for_subscribe(body);
        assert_eq!(timetoken.as_deref(), Some("14179915548467106"));
        assert_eq!(view.get().as_deref(), Some("1234"));
        assert_eq!(view.get().as_deref(), Some("\"Da\""));
        assert_eq!(view.get(), None);
    }

    #[test]
    fn whole_body_view_yields_the_entire_body_as_one_element() {
        let body = br#"{"status":200,"message":"OK"}"#;
        let mut view = ResponseView::whole_body(body);
        assert_eq!(view.get().as_deref(), Some(r#"{"status":200,"message":"OK"}"#));
        assert_eq!(view.get(), None);
    }
}
