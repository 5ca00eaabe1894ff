//! Counts successfully parsed requests across the whole listener's
//! lifetime and prints a running total. Since this crate parses exactly
//! one request per connection (no keep-alive), "per-connection" and
//! "per-request" coincide here — there is no per-connection state to
//! carry between requests the way a keep-alive server would need.

use reqpipe::limits::WorkerPoolConfig;
use std::net::TcpListener;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn main() {
    let addr = "127.0.0.1:8080";
    let listener = TcpListener::bind(addr).expect("failed to bind listener");
    println!("listening on {addr}");

    let count = Arc::new(AtomicU64::new(0));
    reqpipe::worker_pool::serve(listener, WorkerPoolConfig::default(), move |req| {
        let seen = count.fetch_add(1, Ordering::Relaxed) + 1;
        println!(
            "#{seen}: {:?} {}",
            req.method(),
            String::from_utf8_lossy(req.target())
        );
    })
    .expect("worker pool exited with an error");
}
