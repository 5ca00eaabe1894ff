//! Error and status types shared by the bounded queue, the hash table, and the
//! request parser.
//!
//! None of these types carry an HTTP response representation: response
//! generation is outside this crate's scope, so a `400`/`413`/`431` style
//! mapping belongs to whatever caller drives [`crate::http::request::Parser`],
//! not to the error type itself.

use std::{error, fmt, io};

/// Terminal or semi-terminal outcome of [`crate::http::request::Parser::parse`].
///
/// `Incomplete` is the only non-terminal variant: the parser keeps its state
/// and expects another chunk. Every other variant resets the parser before
/// it is returned to the caller.
#[derive(Debug)]
pub enum ParseOutcome {
    /// The request was fully parsed and `req` is populated.
    Ok,
    /// More bytes are required; call `parse` again with the next chunk.
    Incomplete,
    /// The input violates the request grammar, a size limit, or a charset rule.
    Invalid(InvalidReason),
    /// An internal failure unrelated to the shape of the input (allocation,
    /// an unreachable state transition).
    Err(RpError),
}

impl ParseOutcome {
    /// `true` for `Ok`/`Invalid`/`Err` — states after which the parser has
    /// already reset itself and must not be fed more bytes without starting
    /// a fresh request.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ParseOutcome::Incomplete)
    }
}

impl PartialEq for ParseOutcome {
    fn eq(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (ParseOutcome::Ok, ParseOutcome::Ok)
                | (ParseOutcome::Incomplete, ParseOutcome::Incomplete)
                | (ParseOutcome::Invalid(_), ParseOutcome::Invalid(_))
                | (ParseOutcome::Err(_), ParseOutcome::Err(_))
        )
    }
}

/// Why a request was rejected as `Invalid`.
///
/// Ordered roughly the way the parser encounters them: request line, then
/// headers, then body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// A line-oriented state (`ReqLine`/`Headers`) could not find `\r\n`
    /// before the scratch buffer would overflow.
    ScratchOverflow,
    /// End-of-stream (empty chunk) arrived while a line was still incomplete.
    UnterminatedAtEos,

    /// A request-line or header line is missing an expected `SP`/`:`
    /// separator entirely (distinct from a token either side of the
    /// separator being malformed).
    RequestLineMalformed,
    MethodUnknown,
    MethodTooLong,
    TargetEmpty,
    TargetTooLong,
    RequestLineTrailingBytes,
    VersionMismatch,

    TooManyHeaders,
    HeaderMalformed,
    HeaderNameEmpty,
    HeaderNameTooLong,
    HeaderNameInvalidChar,
    HeaderValueEmpty,
    HeaderValueTooLong,
    HeaderValueInvalidByte,

    ContentLengthMalformed,
    ContentLengthTooLarge,
    /// End-of-stream arrived before `content-length` bytes were all received.
    BodyIncompleteAtEos,
}

impl error::Error for InvalidReason {}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            InvalidReason::ScratchOverflow => "line exceeds the scratch buffer",
            InvalidReason::UnterminatedAtEos => "stream ended mid-line",
            InvalidReason::RequestLineMalformed => "request line is missing a space separator",
            InvalidReason::MethodUnknown => "unrecognized HTTP method",
            InvalidReason::MethodTooLong => "method exceeds 6 bytes",
            InvalidReason::TargetEmpty => "empty request target",
            InvalidReason::TargetTooLong => "request target exceeds 1024 bytes",
            InvalidReason::RequestLineTrailingBytes => "trailing bytes after version",
            InvalidReason::VersionMismatch => "version is not HTTP/1.1",
            InvalidReason::TooManyHeaders => "header count exceeds 32",
            InvalidReason::HeaderMalformed => "header line is missing a colon separator",
            InvalidReason::HeaderNameEmpty => "empty header name",
            InvalidReason::HeaderNameTooLong => "header name exceeds 64 bytes",
            InvalidReason::HeaderNameInvalidChar => "header name has a non-token byte",
            InvalidReason::HeaderValueEmpty => "empty header value",
            InvalidReason::HeaderValueTooLong => "header value exceeds 512 bytes",
            InvalidReason::HeaderValueInvalidByte => "header value has a non-printable byte",
            InvalidReason::ContentLengthMalformed => "content-length is not a valid non-negative integer",
            InvalidReason::ContentLengthTooLarge => "content-length exceeds 2048",
            InvalidReason::BodyIncompleteAtEos => "stream ended before declared body length",
        };
        f.write_str(msg)
    }
}

/// Internal failure: allocation failure while growing the header table, or a
/// state-machine transition that should be unreachable.
#[derive(Debug)]
pub enum RpError {
    HeaderTable(HtError),
    /// The parser reached a state tag it never assigns; indicates a bug in
    /// this crate rather than bad input.
    Unreachable,
}

impl error::Error for RpError {}

impl fmt::Display for RpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpError::HeaderTable(e) => write!(f, "header table failure: {e}"),
            RpError::Unreachable => f.write_str("parser reached an unreachable state"),
        }
    }
}

impl From<HtError> for RpError {
    fn from(e: HtError) -> Self {
        RpError::HeaderTable(e)
    }
}

/// Failure surfaced by [`crate::ht::HashTable`].
///
/// The only practical cause is an allocation failure, either at
/// construction or while growing the backing array on resize.
#[derive(Debug)]
pub enum HtError {
    Alloc,
}

impl error::Error for HtError {}

impl fmt::Display for HtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HtError::Alloc => f.write_str("failed to allocate hash table storage"),
        }
    }
}

/// Failure surfaced by [`crate::bq::BlockingQueue`] construction.
///
/// `send`/`recv` never fail once a queue is constructed; only `with_capacity`
/// can report an error.
#[derive(Debug)]
pub enum BqError {
    /// `capacity` was not a power of two, or was less than 2.
    InvalidCapacity(usize),
    Alloc,
}

impl error::Error for BqError {}

impl fmt::Display for BqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BqError::InvalidCapacity(cap) => {
                write!(f, "capacity {cap} is not a power of two >= 2")
            }
            BqError::Alloc => f.write_str("failed to allocate queue storage"),
        }
    }
}

/// I/O failure at the worker-pipeline boundary (accept/read/write), kept
/// distinct from the core's own error types since it never reaches RP/BQ/HT.
#[derive(Debug)]
pub struct IoError(pub io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl error::Error for IoError {}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<io::Error> for IoError {
    fn from(err: io::Error) -> Self {
        IoError(err)
    }
}
