//! reqpipe — a resumable HTTP/1.1 request parser driven by a bounded
//! blocking worker pipeline.
//!
//! # What this crate is
//!
//! A per-connection request parser ([`http::request::Parser`]) together
//! with the two data structures its header handling is inseparable from:
//! a bounded blocking queue ([`bq::BlockingQueue`]) coupling a TCP accept
//! loop to a fixed worker pool, and a case-insensitive open-addressed
//! string map ([`ht::HashTable`]) backing each request's headers. A thin
//! reference wiring of the two into a full accept-loop-plus-worker-pool
//! (`worker_pool::serve`) ships alongside them so the crate is usable
//! out of the box, but it is explicitly an external collaborator: the
//! parser, queue, and hash table never depend on it.
//!
//! # What this crate is not
//!
//! There is no response generation, no routing, no request body
//! streaming beyond a bounded capture, no chunked transfer encoding, no
//! HTTP/2, no TLS, and no keep-alive multiplexing of multiple requests
//! on one connection — one parse per connection, by design. Callers that
//! need any of that sit on top of `Request`'s parsed output, not inside
//! this crate.
//!
//! # Quick start
//!
//! ```no_run
//! use reqpipe::{limits::WorkerPoolConfig, worker_pool};
//! use std::net::TcpListener;
//!
//! let listener = TcpListener::bind("127.0.0.1:8080").unwrap();
//! worker_pool::serve(listener, WorkerPoolConfig::default(), |req| {
//!     println!("{:?} {:?}", req.method(), req.target());
//! }).unwrap();
//! ```
//!
//! See `demos/` for runnable examples: a minimal accept-loop printer, a
//! per-connection request counter, and a full method/target/headers/body
//! inspector.

pub(crate) mod bq;
pub(crate) mod errors;
pub(crate) mod ht;
pub mod limits;
pub mod worker_pool;

pub(crate) mod http {
    pub(crate) mod request;
    pub(crate) mod types;
}

pub use crate::{
    bq::BlockingQueue,
    errors::{BqError, HtError, InvalidReason, IoError, ParseOutcome, RpError},
    ht::HashTable,
    http::{
        request::{Parser, Request},
        types::Method,
    },
};
