//! Dumps method, target, version, every header, and the captured body for
//! each parsed request — useful for eyeballing exactly what the parser
//! extracted from a raw request on the wire.

use reqpipe::limits::WorkerPoolConfig;
use std::net::TcpListener;

fn main() {
    let addr = "127.0.0.1:8080";
    let listener = TcpListener::bind(addr).expect("failed to bind listener");
    println!("listening on {addr}");

    reqpipe::worker_pool::serve(listener, WorkerPoolConfig::default(), |req| {
        println!("---");
        println!("method:  {:?}", req.method());
        println!("target:  {}", String::from_utf8_lossy(req.target()));
        println!("version: {}", String::from_utf8_lossy(req.version()));
        println!("headers: {} field(s)", req.header_count());
        for name in ["host", "content-length", "content-type", "cookie", "user-agent"] {
            // `header` takes `&mut self` (lazy tombstone compaction), so each
            // lookup is its own call rather than an iterator over the table —
            // this crate does not expose header iteration, only lookup by name.
            println!("  {name}: {:?}", req.header(name));
        }
        if req.body_len() > 0 {
            println!("body ({} bytes): {}", req.body_len(), String::from_utf8_lossy(req.body()));
        }
    })
    .expect("worker pool exited with an error");
}
