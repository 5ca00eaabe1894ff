//! Resumable HTTP/1.1 request parser.
//!
//! [`Parser`] is a per-worker state machine over a fixed-size scratch
//! buffer: callers feed it successive byte chunks via [`Parser::parse`]
//! until it reports a terminal [`ParseOutcome`]. There is exactly one
//! parse per connection — no keep-alive, no pipelining — so the state
//! machine only ever runs `ReqLine -> Headers -> Body` once before it
//! resets itself for reuse on the next connection.
//!
//! The buffer is shared across all three states and compacted in place:
//! each consumed line (or the consumed body) is shifted out of `scratch`
//! by [`Parser::consume`], which is the only place this module moves
//! bytes around after they're copied in.

use memchr::memchr;

use crate::{
    errors::{InvalidReason, ParseOutcome, RpError},
    ht::HashTable,
    http::types::{slice_to_usize, Method},
    limits::{HtConfig, ReqLimits},
};

/// A parsed (or in-progress) HTTP/1.1 request.
///
/// Owned entirely by one worker; nothing here is `Sync`. A fresh `Request`
/// is normally created per connection, but [`Request::reset`] lets a
/// worker recycle one across connections without re-allocating `headers`'
/// backing array.
pub struct Request {
    method: Method,
    target: Vec<u8>,
    headers: HashTable,
    body: Vec<u8>,
    body_len: usize,
}

impl Request {
    /// Builds a `Request` with a headers table sized per `ht_config`.
    pub fn new(ht_config: &HtConfig) -> Result<Self, crate::errors::HtError> {
        Ok(Self {
            method: Method::Unknown,
            target: Vec::with_capacity(ReqLimits::TARGET_MAX),
            headers: HashTable::with_hasher(ht_config.capacity, ht_config.hash_fn)?,
            body: Vec::with_capacity(ReqLimits::BODY_MAX),
            body_len: 0,
        })
    }

    /// Clears every field so the `Request` can be handed to a new parse.
    /// Does not shrink `headers`' backing array or the `Vec` capacities.
    pub fn reset(&mut self) {
        self.method = Method::Unknown;
        self.target.clear();
        self.headers.clear();
        self.body.clear();
        self.body_len = 0;
    }

    #[inline]
    pub fn method(&self) -> Method {
        self.method
    }

    /// The request-target exactly as received; no percent-decoding or URI
    /// parsing is performed (out of scope — see `RP` in the crate's design
    /// notes).
    #[inline]
    pub fn target(&self) -> &[u8] {
        &self.target
    }

    /// Always `HTTP/1.1`: the only version this parser accepts.
    #[inline]
    pub fn version(&self) -> &'static [u8] {
        ReqLimits::VERSION
    }

    /// Looks up a header by name, case-insensitively.
    #[inline]
    pub fn header(&mut self, name: &str) -> Option<&str> {
        self.headers.lookup(name.as_bytes())
    }

    /// Number of distinct header names currently stored.
    #[inline]
    pub fn header_count(&self) -> usize {
        self.headers.len()
    }

    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The declared `content-length`, or `0` when the header was absent.
    #[inline]
    pub fn body_len(&self) -> usize {
        self.body_len
    }
}

/// `ReqLine -> Headers -> Body`, matching the state diagram this crate's
/// design is built from. `Body`'s payload caches the `content-length`
/// lookup the first time the state is entered, so later chunks in the same
/// request don't re-query the header table.
enum State {
    ReqLine,
    Headers,
    Body(Option<usize>),
}

enum LineResult {
    /// A full line (sans CRLF) ends at this offset into `scratch`.
    Line(usize),
    /// No CRLF yet, but the chunk wasn't the end-of-stream marker.
    Incomplete,
    /// No CRLF found and the stream just ended.
    Eos,
}

/// Per-worker parser state: a fixed scratch buffer, the count of valid
/// bytes in it, and the current state-machine tag. Never shared across
/// threads — see the crate's concurrency model.
pub struct Parser {
    scratch: [u8; ReqLimits::SCRATCH_SIZE],
    filled: usize,
    state: State,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            scratch: [0u8; ReqLimits::SCRATCH_SIZE],
            filled: 0,
            state: State::ReqLine,
        }
    }

    /// Drops back to the initial state with an empty buffer. Called after
    /// every terminal outcome (`Ok`, `Invalid`, `Err`), never after
    /// `Incomplete`.
    fn reset(&mut self) {
        self.filled = 0;
        self.state = State::ReqLine;
    }

    /// Shifts the unconsumed tail of `scratch` (starting at byte `n`) down
    /// to the front and shrinks `filled` accordingly.
    fn consume(&mut self, n: usize) {
        self.scratch.copy_within(n..self.filled, 0);
        self.filled -= n;
    }

    fn take_line(&self, eos: bool) -> LineResult {
        match find_crlf(&self.scratch[..self.filled]) {
            Some(idx) => LineResult::Line(idx),
            None if eos => LineResult::Eos,
            None => LineResult::Incomplete,
        }
    }

    /// Feeds `chunk` to the parser. An empty `chunk` signals end-of-stream:
    /// the parser must return a terminal outcome, never `Incomplete`.
    ///
    /// `req` must be freshly reset (or newly constructed) when this is
    /// called with a parser that is itself in its initial state; resuming
    /// an in-progress parse always targets the same `req` across calls.
    pub fn parse(&mut self, req: &mut Request, chunk: &[u8]) -> ParseOutcome {
        let eos = chunk.is_empty();

        if self.filled + chunk.len() > ReqLimits::SCRATCH_SIZE {
            self.reset();
            return ParseOutcome::Invalid(InvalidReason::ScratchOverflow);
        }
        self.scratch[self.filled..self.filled + chunk.len()].copy_from_slice(chunk);
        self.filled += chunk.len();

        loop {
            match self.state {
                State::ReqLine => match self.take_line(eos) {
                    LineResult::Line(end) => {
                        let outcome = parse_request_line(&self.scratch[..end], req);
                        self.consume(end + 2);
                        match outcome {
                            Ok(()) => self.state = State::Headers,
                            Err(reason) => {
                                self.reset();
                                return ParseOutcome::Invalid(reason);
                            }
                        }
                    }
                    LineResult::Incomplete => return ParseOutcome::Incomplete,
                    LineResult::Eos => {
                        self.reset();
                        return ParseOutcome::Invalid(InvalidReason::UnterminatedAtEos);
                    }
                },

                State::Headers => match self.take_line(eos) {
                    LineResult::Line(0) => {
                        self.consume(2);
                        self.state = State::Body(None);
                    }
                    LineResult::Line(end) => {
                        if req.headers.len() >= ReqLimits::HEADER_COUNT_MAX {
                            self.reset();
                            return ParseOutcome::Invalid(InvalidReason::TooManyHeaders);
                        }
                        match parse_header_line(&self.scratch[..end], &mut req.headers) {
                            Ok(()) => self.consume(end + 2),
                            Err(HeaderLineError::Invalid(reason)) => {
                                self.reset();
                                return ParseOutcome::Invalid(reason);
                            }
                            Err(HeaderLineError::Alloc(e)) => {
                                self.reset();
                                return ParseOutcome::Err(RpError::from(e));
                            }
                        }
                    }
                    LineResult::Incomplete => return ParseOutcome::Incomplete,
                    LineResult::Eos => {
                        self.reset();
                        return ParseOutcome::Invalid(InvalidReason::UnterminatedAtEos);
                    }
                },

                State::Body(cached) => {
                    let body_len = match cached {
                        Some(len) => len,
                        None => match req.headers.lookup(b"content-length") {
                            None => {
                                req.body.clear();
                                req.body_len = 0;
                                self.reset();
                                return ParseOutcome::Ok;
                            }
                            Some(value) => match slice_to_usize(value.as_bytes()) {
                                None => {
                                    self.reset();
                                    return ParseOutcome::Invalid(
                                        InvalidReason::ContentLengthMalformed,
                                    );
                                }
                                Some(n) if n > ReqLimits::BODY_MAX => {
                                    self.reset();
                                    return ParseOutcome::Invalid(
                                        InvalidReason::ContentLengthTooLarge,
                                    );
                                }
                                Some(n) => {
                                    self.state = State::Body(Some(n));
                                    n
                                }
                            },
                        },
                    };

                    if self.filled >= body_len {
                        req.body.clear();
                        req.body.extend_from_slice(&self.scratch[..body_len]);
                        req.body_len = body_len;
                        self.reset();
                        return ParseOutcome::Ok;
                    }
                    if eos {
                        self.reset();
                        return ParseOutcome::Invalid(InvalidReason::BodyIncompleteAtEos);
                    }
                    return ParseOutcome::Incomplete;
                }
            }
        }
    }
}

/// First index of a CRLF pair in `buf`, i.e. the offset of the `\r` that is
/// immediately followed by `\n`. A lone `\r` not followed by `\n` is
/// skipped and left for the line content to fail validation on (matching
/// the "CR-CR-LF" and "lone CR" edge cases in the design notes).
fn find_crlf(buf: &[u8]) -> Option<usize> {
    let mut start = 0;
    while let Some(rel) = memchr(b'\r', &buf[start..]) {
        let idx = start + rel;
        if buf.get(idx + 1) == Some(&b'\n') {
            return Some(idx);
        }
        start = idx + 1;
    }
    None
}

/// `METHOD SP TARGET SP VERSION`, with no interior slack: anything past
/// the exact three tokens (extra spaces, trailing bytes after the version
/// literal) is rejected rather than tolerated.
fn parse_request_line(line: &[u8], req: &mut Request) -> Result<(), InvalidReason> {
    let sp1 = memchr(b' ', line).ok_or(InvalidReason::RequestLineMalformed)?;
    let method_bytes = &line[..sp1];
    if method_bytes.len() > ReqLimits::METHOD_MAX {
        return Err(InvalidReason::MethodTooLong);
    }
    let method = Method::from_bytes(method_bytes);
    if method == Method::Unknown {
        return Err(InvalidReason::MethodUnknown);
    }

    let rest = &line[sp1 + 1..];
    let sp2 = memchr(b' ', rest).ok_or(InvalidReason::RequestLineMalformed)?;
    let target = &rest[..sp2];
    if target.is_empty() {
        return Err(InvalidReason::TargetEmpty);
    }
    if target.len() > ReqLimits::TARGET_MAX {
        return Err(InvalidReason::TargetTooLong);
    }

    let version = &rest[sp2 + 1..];
    if !version.starts_with(ReqLimits::VERSION) {
        return Err(InvalidReason::VersionMismatch);
    }
    if version.len() != ReqLimits::VERSION.len() {
        return Err(InvalidReason::RequestLineTrailingBytes);
    }

    req.method = method;
    req.target.clear();
    req.target.extend_from_slice(target);
    Ok(())
}

enum HeaderLineError {
    Invalid(InvalidReason),
    Alloc(crate::errors::HtError),
}

impl From<InvalidReason> for HeaderLineError {
    fn from(reason: InvalidReason) -> Self {
        HeaderLineError::Invalid(reason)
    }
}

/// RFC 9110 `tchar`: the visible-ASCII subset legal in a header field name.
#[inline]
fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}

/// Validates one `name: value` line and inserts it into `headers` on
/// success. `line` excludes the trailing CRLF.
fn parse_header_line(line: &[u8], headers: &mut HashTable) -> Result<(), HeaderLineError> {
    let colon = memchr(b':', line).ok_or(InvalidReason::HeaderMalformed)?;
    let name = &line[..colon];
    if name.is_empty() {
        return Err(InvalidReason::HeaderNameEmpty.into());
    }
    if name.len() > ReqLimits::HEADER_NAME_MAX {
        return Err(InvalidReason::HeaderNameTooLong.into());
    }
    if !name.iter().all(|&b| is_tchar(b)) {
        return Err(InvalidReason::HeaderNameInvalidChar.into());
    }

    let mut value = &line[colon + 1..];
    while value.first() == Some(&b' ') {
        value = &value[1..];
    }
    while value.last() == Some(&b' ') {
        value = &value[..value.len() - 1];
    }
    if value.is_empty() {
        return Err(InvalidReason::HeaderValueEmpty.into());
    }
    if value.len() > ReqLimits::HEADER_VALUE_MAX {
        return Err(InvalidReason::HeaderValueTooLong.into());
    }
    if !value.iter().all(|&b| (0x20..=0x7e).contains(&b)) {
        return Err(InvalidReason::HeaderValueInvalidByte.into());
    }

    headers.insert(name, value).map_err(HeaderLineError::Alloc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (Parser, Request) {
        (Parser::new(), Request::new(&HtConfig::default()).unwrap())
    }

    /// Feeds `input` as one chunk followed by the EOS marker, returning the
    /// first terminal outcome reached.
    fn parse_whole(input: &[u8]) -> (ParseOutcome, Request) {
        let (mut parser, mut req) = fresh();
        let mut outcome = parser.parse(&mut req, input);
        if !outcome.is_terminal() {
            outcome = parser.parse(&mut req, b"");
        }
        (outcome, req)
    }

    /// Feeds `input` split into single-byte chunks followed by EOS.
    fn parse_byte_by_byte(input: &[u8]) -> (ParseOutcome, Request) {
        let (mut parser, mut req) = fresh();
        let mut outcome = ParseOutcome::Incomplete;
        for &b in input {
            outcome = parser.parse(&mut req, &[b]);
            if outcome.is_terminal() {
                return (outcome, req);
            }
        }
        outcome = parser.parse(&mut req, b"");
        (outcome, req)
    }

    #[test]
    fn scenario_a_simple_get() {
        let (outcome, mut req) = parse_whole(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");
        assert!(matches!(outcome, ParseOutcome::Ok));
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.target(), b"/");
        assert_eq!(req.header("host"), Some("localhost"));
        assert_eq!(req.body(), b"");
    }

    #[test]
    fn scenario_b_body_matches_content_length() {
        let (outcome, req) = parse_whole(
            b"POST /submit HTTP/1.1\r\nContent-Length: 13\r\nHost: h\r\n\r\nHello, World!",
        );
        assert!(matches!(outcome, ParseOutcome::Ok));
        assert_eq!(req.body(), b"Hello, World!");
        assert_eq!(req.body_len(), 13);
    }

    #[test]
    fn scenario_c_body_truncated_to_declared_length() {
        let (outcome, req) = parse_whole(
            b"POST /submit HTTP/1.1\r\nContent-Length: 10\r\nHost: h\r\n\r\n\
              Hello, World! This is too long.",
        );
        assert!(matches!(outcome, ParseOutcome::Ok));
        assert_eq!(req.body(), b"Hello, Wor");
    }

    #[test]
    fn scenario_d_duplicate_headers_join_with_comma_space() {
        let (outcome, mut req) = parse_whole(
            b"GET / HTTP/1.1\r\nHost: example.com\r\nCookie: a\r\nCookie: b\r\n\r\n",
        );
        assert!(matches!(outcome, ParseOutcome::Ok));
        assert_eq!(req.header("cookie"), Some("a, b"));
    }

    #[test]
    fn scenario_e_unknown_method_is_invalid() {
        let (outcome, _) = parse_whole(b"FOO / HTTP/1.1\r\n\r\n");
        assert!(matches!(
            outcome,
            ParseOutcome::Invalid(InvalidReason::MethodUnknown)
        ));
    }

    #[test]
    fn scenario_f_wrong_version_is_invalid() {
        let (outcome, _) = parse_whole(b"GET / HTTP/1.2\r\n\r\n");
        assert!(matches!(
            outcome,
            ParseOutcome::Invalid(InvalidReason::VersionMismatch)
        ));
    }

    #[test]
    fn scenario_g_tab_instead_of_space_is_invalid() {
        let (outcome, _) = parse_whole(b"GET\t/ HTTP/1.1\r\n\r\n");
        assert!(matches!(outcome, ParseOutcome::Invalid(_)));
    }

    #[test]
    fn scenario_h_leading_space_before_colon_is_invalid() {
        let (outcome, _) = parse_whole(b"GET / HTTP/1.1\r\n  Host : v\r\n\r\n");
        assert!(matches!(
            outcome,
            ParseOutcome::Invalid(InvalidReason::HeaderNameInvalidChar)
        ));
    }

    #[test]
    fn scenario_i_negative_content_length_is_invalid() {
        let (outcome, _) = parse_whole(b"POST / HTTP/1.1\r\nContent-Length: -9\r\n\r\nx");
        assert!(matches!(
            outcome,
            ParseOutcome::Invalid(InvalidReason::ContentLengthMalformed)
        ));
    }

    #[test]
    fn scenario_j_byte_by_byte_matches_whole_chunk() {
        let input: &[u8] = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (whole_outcome, whole_req) = parse_whole(input);
        let (byte_outcome, byte_req) = parse_byte_by_byte(input);
        assert!(matches!(whole_outcome, ParseOutcome::Ok));
        assert_eq!(whole_outcome, byte_outcome);
        assert_eq!(whole_req.target(), byte_req.target());
    }

    #[test]
    fn chunking_equivalence_across_arbitrary_splits() {
        let input: &[u8] =
            b"POST /x HTTP/1.1\r\nContent-Length: 5\r\nHost: h\r\n\r\nhello";
        let splits: &[&[usize]] = &[&[], &[1], &[5, 10], &[3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3]];

        let (baseline, _) = parse_whole(input);
        for points in splits {
            let (mut parser, mut req) = fresh();
            let mut pos = 0;
            let mut outcome = ParseOutcome::Incomplete;
            for &cut in *points {
                let end = (pos + cut).min(input.len());
                if end > pos {
                    outcome = parser.parse(&mut req, &input[pos..end]);
                    pos = end;
                    if outcome.is_terminal() {
                        break;
                    }
                }
            }
            if !outcome.is_terminal() && pos < input.len() {
                outcome = parser.parse(&mut req, &input[pos..]);
                pos = input.len();
            }
            if !outcome.is_terminal() {
                outcome = parser.parse(&mut req, b"");
            }
            assert_eq!(outcome, baseline, "split {:?} disagreed", points);
        }
    }

    #[test]
    fn absent_content_length_yields_empty_body() {
        let (outcome, req) = parse_whole(b"GET / HTTP/1.1\r\nHost: h\r\n\r\ntrailing garbage");
        assert!(matches!(outcome, ParseOutcome::Ok));
        assert_eq!(req.body(), b"");
    }

    #[test]
    fn header_count_over_limit_is_invalid() {
        let mut wire = b"GET / HTTP/1.1\r\n".to_vec();
        for i in 0..40 {
            wire.extend_from_slice(format!("X-{i}: v\r\n").as_bytes());
        }
        wire.extend_from_slice(b"\r\n");
        let (outcome, _) = parse_whole(&wire);
        assert!(matches!(
            outcome,
            ParseOutcome::Invalid(InvalidReason::TooManyHeaders)
        ));
    }

    #[test]
    fn oversized_target_is_invalid() {
        let mut wire = b"GET /".to_vec();
        wire.extend(std::iter::repeat(b'a').take(ReqLimits::TARGET_MAX + 1));
        wire.extend_from_slice(b" HTTP/1.1\r\n\r\n");
        let (outcome, _) = parse_whole(&wire);
        assert!(matches!(
            outcome,
            ParseOutcome::Invalid(InvalidReason::TargetTooLong)
        ));
    }

    #[test]
    fn scratch_overflow_on_oversized_request_line() {
        let mut wire = b"GET /".to_vec();
        wire.extend(std::iter::repeat(b'a').take(ReqLimits::SCRATCH_SIZE + 10));
        let (outcome, _) = parse_whole(&wire);
        assert!(matches!(
            outcome,
            ParseOutcome::Invalid(InvalidReason::ScratchOverflow)
        ));
    }

    #[test]
    fn incomplete_never_returned_on_eos() {
        let mut parser = Parser::new();
        let mut req = Request::new(&HtConfig::default()).unwrap();
        let outcome = parser.parse(&mut req, b"GET / HTTP/1.1\r\n");
        assert!(matches!(outcome, ParseOutcome::Incomplete));
        let outcome = parser.parse(&mut req, b"");
        assert!(outcome.is_terminal());
    }

    #[test]
    fn fuzz_lite_random_bytes_never_panics_or_hangs_incomplete_at_eos() {
        // Deterministic xorshift so this test doesn't depend on `rand`.
        let mut state: u64 = 0x2545F4914F6CDD1D;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        for _ in 0..200 {
            let len = (next() % 300) as usize;
            let bytes: Vec<u8> = (0..len).map(|_| (next() % 256) as u8).collect();
            let (mut parser, mut req) = fresh();
            let mut outcome = parser.parse(&mut req, &bytes);
            if !outcome.is_terminal() {
                outcome = parser.parse(&mut req, b"");
            }
            assert!(outcome.is_terminal());
        }
    }

    #[test]
    fn reset_after_terminal_allows_reuse() {
        let mut parser = Parser::new();
        let mut req = Request::new(&HtConfig::default()).unwrap();
        let _ = parser.parse(&mut req, b"FOO / HTTP/1.1\r\n\r\n");
        req.reset();
        let outcome = parser.parse(&mut req, b"GET / HTTP/1.1\r\nHost: h\r\n\r\n");
        assert!(matches!(outcome, ParseOutcome::Ok));
        assert_eq!(req.method(), Method::Get);
    }
}
