//! Minimal accept-loop + worker pool that prints the method and target of
//! every successfully parsed request. No response is ever written back —
//! response generation is out of scope for this crate.

use reqpipe::limits::WorkerPoolConfig;
use std::net::TcpListener;

fn main() {
    let addr = "127.0.0.1:8080";
    let listener = TcpListener::bind(addr).expect("failed to bind listener");
    println!("listening on {addr}");

    reqpipe::worker_pool::serve(listener, WorkerPoolConfig::default(), |req| {
        println!("{:?} {}", req.method(), String::from_utf8_lossy(req.target()));
    })
    .expect("worker pool exited with an error");
}
