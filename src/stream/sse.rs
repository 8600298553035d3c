//! SSE line parser, frame encoders, and the byte-stream adapter.
//!
//! The upstream body is consumed as logical lines regardless of how the
//! transport splits it. `\n`, `\r\n` and a bare `\r` all end a line.
//! Only `data:` lines matter: everything else
//! (comments, `event:`, `id:`, `retry:`) is discarded, blank payloads are
//! keep-alives, and `[DONE]` ends the stream.
use futures_util::Stream;
use memchr::memchr2_iter;
use smallvec::SmallVec;

/// Terminal sentinel literal.
pub const DONE_SENTINEL: &str = "[DONE]";
const DONE_FRAME: &str = "data: [DONE]\n\n";

/// One meaningful line of an upstream SSE body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// Trimmed `data:` value; a candidate JSON chunk.
    Payload(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Classify one logical line (without its `\n`).
///
/// Returns `None` for lines that carry nothing: non-data fields, comments,
/// and empty keep-alive payloads.
#[must_use]
pub fn classify_line(line: &str) -> Option<SseLine> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let value = line.strip_prefix("data:")?.trim();
    if value.is_empty() {
        return None;
    }
    if value == DONE_SENTINEL {
        return Some(SseLine::Done);
    }
    Some(SseLine::Payload(value.to_owned()))
}

struct PendingLines {
    lines: SmallVec<[SseLine; 8]>,
    head: usize,
}

impl PendingLines {
    #[inline]
    fn new() -> Self {
        Self {
            lines: SmallVec::new(),
            head: 0,
        }
    }

    #[inline]
    fn pop_front(&mut self) -> Option<SseLine> {
        if self.head >= self.lines.len() {
            return None;
        }
        let line = std::mem::replace(&mut self.lines[self.head], SseLine::Done);
        self.head += 1;
        if self.head == self.lines.len() {
            self.lines.clear();
            self.head = 0;
        }
        Some(line)
    }

    #[inline]
    fn extend_from_vec(&mut self, parsed: &mut Vec<SseLine>) {
        if parsed.is_empty() {
            return;
        }
        self.lines.extend(parsed.drain(..));
    }
}

// ---------------------------------------------------------------------------
// SseLineParser: incremental line splitter
// ---------------------------------------------------------------------------

/// Incremental SSE line parser.
///
/// Feed it text in arbitrary pieces; it buffers only the current partial
/// line and emits [`SseLine`]s for complete lines. Once `[DONE]` has been
/// emitted every further input is ignored.
pub struct SseLineParser {
    buffer: String,
    read_offset: usize,
    done: bool,
}

impl SseLineParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            read_offset: 0,
            done: false,
        }
    }

    /// Whether the terminal sentinel has been seen.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw text and return any lines completed by it.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseLine> {
        let mut out = Vec::new();
        self.feed_into(chunk, &mut out);
        out
    }

    /// Feed raw text and append completed lines into a caller-provided buffer.
    pub fn feed_into(&mut self, chunk: &str, out: &mut Vec<SseLine>) {
        if self.done {
            return;
        }
        self.buffer.push_str(chunk);
        let mut processed_up_to = self.read_offset;
        let scan_start = processed_up_to;
        let mut saw_done = false;
        for rel_pos in memchr2_iter(b'\n', b'\r', &self.buffer.as_bytes()[scan_start..]) {
            let line_end = scan_start + rel_pos;
            let line = &self.buffer[processed_up_to..line_end];
            processed_up_to = line_end + 1;
            if let Some(parsed) = classify_line(line) {
                saw_done = parsed == SseLine::Done;
                out.push(parsed);
                if saw_done {
                    break;
                }
            }
        }

        if saw_done {
            self.done = true;
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }

        self.read_offset = processed_up_to;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }
        let should_compact = self.read_offset > 0
            && (self.read_offset >= self.buffer.len() / 2 || self.read_offset >= 8 * 1024);
        if should_compact {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }

    /// Flush a trailing unterminated line once the connection has closed.
    pub fn finish_into(&mut self, out: &mut Vec<SseLine>) {
        if self.done {
            return;
        }
        let tail = &self.buffer[self.read_offset..];
        if let Some(parsed) = classify_line(tail) {
            if parsed == SseLine::Done {
                self.done = true;
            }
            out.push(parsed);
        }
        self.buffer.clear();
        self.read_offset = 0;
    }
}

impl Default for SseLineParser {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// UTF-8 carry across chunk boundaries
// ---------------------------------------------------------------------------

/// Holds the tail of a multi-byte UTF-8 sequence split across chunks.
#[derive(Default)]
struct Utf8Carry {
    remainder: Vec<u8>,
}

impl Utf8Carry {
    /// Decode `bytes` (after any carried prefix), passing text to `sink`.
    /// Invalid sequences become U+FFFD; an incomplete tail is carried over.
    fn decode(&mut self, bytes: &[u8], mut sink: impl FnMut(&str)) {
        if self.remainder.is_empty() {
            if let Ok(text) = std::str::from_utf8(bytes) {
                sink(text);
                return;
            }
        }
        self.remainder.extend_from_slice(bytes);
        loop {
            match std::str::from_utf8(&self.remainder) {
                Ok(text) => {
                    sink(text);
                    self.remainder.clear();
                    return;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.remainder[..valid_up_to]) {
                        sink(text);
                    }
                    match err.error_len() {
                        None => {
                            self.remainder.drain(..valid_up_to);
                            return;
                        }
                        Some(invalid_len) => {
                            sink("\u{FFFD}");
                            self.remainder.drain(..valid_up_to + invalid_len);
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is left at end of input, lossily.
    fn finish(&mut self, mut sink: impl FnMut(&str)) {
        if !self.remainder.is_empty() {
            sink(&String::from_utf8_lossy(&self.remainder));
            self.remainder.clear();
        }
    }
}

// ---------------------------------------------------------------------------
// Stream utility
// ---------------------------------------------------------------------------

struct LineStreamState<S> {
    stream: std::pin::Pin<Box<S>>,
    parser: SseLineParser,
    utf8: Utf8Carry,
    parsed: Vec<SseLine>,
    pending: PendingLines,
    finished: bool,
}

/// Split an HTTP body byte stream into [`SseLine`]s.
///
/// The stream ends right after yielding [`SseLine::Done`] without reading
/// further from the body, or when the body ends. A body error is yielded
/// once and then the stream ends.
pub fn sse_line_stream<S, E>(byte_stream: S) -> impl Stream<Item = Result<SseLine, E>> + Send
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    use futures_util::StreamExt;

    let state = LineStreamState {
        stream: Box::pin(byte_stream),
        parser: SseLineParser::new(),
        utf8: Utf8Carry::default(),
        parsed: Vec::with_capacity(8),
        pending: PendingLines::new(),
        finished: false,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.pending.pop_front() {
                return Some((Ok(line), state));
            }
            if state.finished {
                return None;
            }

            match state.stream.as_mut().next().await {
                Some(Ok(bytes)) => {
                    let LineStreamState {
                        parser,
                        utf8,
                        parsed,
                        ..
                    } = &mut state;
                    utf8.decode(&bytes, |text| parser.feed_into(text, parsed));
                    state.finished = state.parser.is_done();
                }
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(err), state));
                }
                None => {
                    let LineStreamState {
                        parser,
                        utf8,
                        parsed,
                        ..
                    } = &mut state;
                    utf8.finish(|text| parser.feed_into(text, parsed));
                    parser.finish_into(parsed);
                    state.finished = true;
                }
            }
            state.pending.extend_from_vec(&mut state.parsed);
        }
    })
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

/// Format an OpenAI-style SSE frame (no event type, just data).
#[must_use]
pub fn openai_sse_frame(json: &str) -> String {
    let mut out = String::with_capacity(10 + json.len());
    out.push_str("data: ");
    out.push_str(json);
    out.push_str("\n\n");
    out
}

/// Format a `[DONE]` frame as SSE text.
#[must_use]
pub fn done_frame() -> String {
    DONE_FRAME.to_owned()
}

/// Format the error frame sent when the upstream fails:
/// `data: {"error": "<message>"}`.
#[must_use]
pub fn error_frame(message: &str) -> String {
    let mut out = String::with_capacity(24 + message.len());
    out.push_str("data: {\"error\": ");
    crate::util::push_json_string_escaped(&mut out, message);
    out.push_str("}\n\n");
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::StreamExt;

    fn payload(s: &str) -> SseLine {
        SseLine::Payload(s.to_string())
    }

    // -- classify_line --

    #[test]
    fn test_classify_data_line() {
        assert_eq!(classify_line("data: {\"a\":1}"), Some(payload("{\"a\":1}")));
        assert_eq!(classify_line("data:{\"a\":1}"), Some(payload("{\"a\":1}")));
        assert_eq!(classify_line("data:   x  \r"), Some(payload("x")));
    }

    #[test]
    fn test_classify_ignores_other_fields() {
        assert_eq!(classify_line(": keep-alive"), None);
        assert_eq!(classify_line("event: message"), None);
        assert_eq!(classify_line("id: 7"), None);
        assert_eq!(classify_line(""), None);
        assert_eq!(classify_line(" data: indented"), None);
    }

    #[test]
    fn test_classify_blank_payload_is_keepalive() {
        assert_eq!(classify_line("data:"), None);
        assert_eq!(classify_line("data:    "), None);
    }

    #[test]
    fn test_classify_done() {
        assert_eq!(classify_line("data: [DONE]"), Some(SseLine::Done));
        assert_eq!(classify_line("data:[DONE]  "), Some(SseLine::Done));
    }

    // -- SseLineParser --

    #[test]
    fn test_parser_openai_sequence() {
        let mut parser = SseLineParser::new();
        let lines = parser.feed("data: {\"a\":1}\n\ndata: {\"a\":2}\n\ndata: [DONE]\n\n");
        assert_eq!(
            lines,
            vec![payload("{\"a\":1}"), payload("{\"a\":2}"), SseLine::Done]
        );
        assert!(parser.is_done());
    }

    #[test]
    fn test_parser_incremental_chunks() {
        let mut parser = SseLineParser::new();
        assert!(parser.feed("data: hel").is_empty());
        assert!(parser.feed("lo").is_empty());
        assert_eq!(parser.feed("\n"), vec![payload("hello")]);
    }

    #[test]
    fn test_parser_crlf() {
        let mut parser = SseLineParser::new();
        let lines = parser.feed("data: one\r\n\r\ndata: [DONE]\r\n\r\n");
        assert_eq!(lines, vec![payload("one"), SseLine::Done]);
    }

    #[test]
    fn test_parser_bare_cr() {
        let mut parser = SseLineParser::new();
        let lines = parser.feed("data: one\r\rdata: two\rdata: [DONE]\r");
        assert_eq!(lines, vec![payload("one"), payload("two"), SseLine::Done]);
    }

    #[test]
    fn test_parser_crlf_split_across_feeds() {
        let mut parser = SseLineParser::new();
        assert_eq!(parser.feed("data: one\r"), vec![payload("one")]);
        assert!(parser.feed("\ndata: tw").is_empty());
        assert_eq!(parser.feed("o\r\n"), vec![payload("two")]);
    }

    #[test]
    fn test_parser_stops_after_done() {
        let mut parser = SseLineParser::new();
        let lines = parser.feed("data: [DONE]\n\ndata: after\n\n");
        assert_eq!(lines, vec![SseLine::Done]);
        assert!(parser.feed("data: more\n").is_empty());
    }

    #[test]
    fn test_parser_long_line_across_many_chunks() {
        let mut parser = SseLineParser::new();
        let body = "x".repeat(100_000);
        let mut out = Vec::new();
        parser.feed_into("data: ", &mut out);
        for piece in body.as_bytes().chunks(7) {
            parser.feed_into(std::str::from_utf8(piece).unwrap(), &mut out);
        }
        assert!(out.is_empty());
        parser.feed_into("\n", &mut out);
        assert_eq!(out, vec![SseLine::Payload(body)]);
    }

    #[test]
    fn test_parser_finish_flushes_tail() {
        let mut parser = SseLineParser::new();
        let mut out = parser.feed("data: first\ndata: tail");
        parser.finish_into(&mut out);
        assert_eq!(out, vec![payload("first"), payload("tail")]);
    }

    #[test]
    fn test_feed_into_appends_without_clearing_output() {
        let mut parser = SseLineParser::new();
        let mut out = vec![payload("seed")];
        parser.feed_into("data: a\n", &mut out);
        assert_eq!(out, vec![payload("seed"), payload("a")]);
    }

    // -- Encoding --

    #[test]
    fn test_openai_sse_frame_helper() {
        assert_eq!(openai_sse_frame("{\"id\":\"x\"}"), "data: {\"id\":\"x\"}\n\n");
    }

    #[test]
    fn test_done_frame_string() {
        assert_eq!(done_frame(), "data: [DONE]\n\n");
    }

    #[test]
    fn test_error_frame_escapes_body() {
        let frame = error_frame("{\"message\":\"bad\"}\n");
        assert_eq!(
            frame,
            "data: {\"error\": \"{\\\"message\\\":\\\"bad\\\"}\\n\"}\n\n"
        );
        let json: serde_json::Value =
            serde_json::from_str(frame.trim_start_matches("data: ").trim_end()).unwrap();
        assert_eq!(json["error"], "{\"message\":\"bad\"}\n");
    }

    // -- sse_line_stream --

    #[tokio::test]
    async fn test_line_stream_split_lines_and_utf8() {
        let text = "data: {\"c\":\"héllo\"}\n\ndata: [DONE]\n\n".as_bytes().to_vec();
        // Split inside the two-byte 'é'.
        let split = text.iter().position(|&b| b == 0xc3).unwrap() + 1;
        let source = futures_util::stream::iter(vec![
            Ok::<Bytes, std::convert::Infallible>(Bytes::copy_from_slice(&text[..split])),
            Ok(Bytes::copy_from_slice(&text[split..])),
        ]);
        let lines: Vec<SseLine> = sse_line_stream(source)
            .map(|line| line.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec![payload("{\"c\":\"héllo\"}"), SseLine::Done]);
    }

    #[tokio::test]
    async fn test_line_stream_does_not_read_past_done() {
        let source = futures_util::stream::iter(vec![
            Ok::<Bytes, &'static str>(Bytes::from_static(b"data: [DONE]\n\n")),
            Err("must not be polled"),
        ]);
        let lines: Vec<Result<SseLine, &str>> = sse_line_stream(source).collect().await;
        assert_eq!(lines, vec![Ok(SseLine::Done)]);
    }

    #[tokio::test]
    async fn test_line_stream_surfaces_body_error_then_ends() {
        let source = futures_util::stream::iter(vec![
            Ok::<Bytes, &'static str>(Bytes::from_static(b"data: a\n")),
            Err("reset"),
            Ok(Bytes::from_static(b"data: b\n")),
        ]);
        let lines: Vec<Result<SseLine, &str>> = sse_line_stream(source).collect().await;
        assert_eq!(lines, vec![Ok(payload("a")), Err("reset")]);
    }

    #[tokio::test]
    async fn test_line_stream_flushes_unterminated_tail() {
        let source = futures_util::stream::iter(vec![Ok::<Bytes, std::convert::Infallible>(
            Bytes::from_static(b": comment\ndata: last"),
        )]);
        let lines: Vec<SseLine> = sse_line_stream(source)
            .map(|line| line.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec![payload("last")]);
    }
}
