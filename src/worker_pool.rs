//! External-collaborator realization of the worker pipeline (WP).
//!
//! Everything in this module sits outside the crate's core contract —
//! [`crate::bq`], [`crate::ht`], and [`crate::http::request`] don't know it
//! exists, and that boundary is deliberate (see §6 of this crate's design).
//! It's shipped anyway because every consumer ends up writing some version
//! of "accept loop feeds a bounded queue, a worker pool drains it and
//! drives the parser", and a thin reference wiring saves that rewrite.
//!
//! A single accept thread is the sole producer on [`BlockingQueue`]; a
//! fixed pool of worker threads are its sole consumers and the sole
//! drivers of [`Parser`]. Neither the queue nor the parser state is ever
//! shared between workers — each worker owns its own [`Parser`] and
//! [`Request`] for the lifetime of one connection.

use std::io::{ErrorKind, Read};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::bq::BlockingQueue;
use crate::errors::{IoError, ParseOutcome};
use crate::http::request::{Parser, Request};
use crate::limits::{HtConfig, WorkerPoolConfig};

/// Size of the read buffer each worker uses to pull bytes off its socket.
/// Unrelated to any of the parser's own size limits — this only bounds how
/// much is read per `recv(2)` call, not how much a request may contain.
const READ_BUF_SIZE: usize = 4096;

/// Runs the accept loop and worker pool until `listener` stops producing
/// connections (or errors). `on_request` is called once per successfully
/// parsed request (the `Ok` outcome only); connections that end in
/// `Invalid`/`Err`/a read error are logged to stderr and dropped, matching
/// the "close the connection" caller policy from this crate's error
/// handling design.
///
/// Blocks the calling thread for as long as the pool runs. Bind and
/// configure `listener` (including any backlog tuning) before calling
/// this — [`WorkerPoolConfig::backlog`] documents the intended value but
/// `std::net::TcpListener` has no portable way to apply it after bind, so
/// applying it is left to the caller's platform-specific setup.
pub fn serve<F>(listener: TcpListener, config: WorkerPoolConfig, on_request: F) -> Result<(), IoError>
where
    F: Fn(&mut Request) + Send + Sync + 'static,
{
    let queue: BlockingQueue<TcpStream> = BlockingQueue::with_capacity(config.queue.capacity)
        .unwrap_or_else(|e| panic!("worker pool: failed to allocate queue: {e}"));
    let on_request = Arc::new(on_request);

    let workers: Vec<_> = (0..config.worker_count)
        .map(|id| {
            let queue = queue.clone();
            let on_request = Arc::clone(&on_request);
            let read_timeout = config.socket_read_timeout;
            thread::spawn(move || worker_loop(id, queue, read_timeout, on_request))
        })
        .collect();

    for stream in listener.incoming() {
        let stream = stream.map_err(IoError)?;
        if queue.send(stream).is_err() {
            break;
        }
    }

    queue.close();
    for worker in workers {
        let _ = worker.join();
    }
    Ok(())
}

fn worker_loop(
    id: usize,
    queue: BlockingQueue<TcpStream>,
    read_timeout: Duration,
    on_request: Arc<dyn Fn(&mut Request) + Send + Sync>,
) {
    let ht_config = HtConfig::default();

    while let Some(mut stream) = queue.recv() {
        let _ = stream.set_read_timeout(Some(read_timeout));
        let peer = stream.peer_addr().ok();

        let mut req = match Request::new(&ht_config) {
            Ok(req) => req,
            Err(e) => {
                eprintln!("worker {id}: failed to allocate request table: {e}");
                continue;
            }
        };
        let mut parser = Parser::new();
        let mut buf = [0u8; READ_BUF_SIZE];
        let mut eos = false;

        loop {
            let n = if eos {
                0
            } else {
                match stream.read(&mut buf) {
                    Ok(0) => {
                        eos = true;
                        0
                    }
                    Ok(n) => n,
                    Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                        eos = true;
                        0
                    }
                    Err(e) => {
                        eprintln!("worker {id}: read error from {peer:?}: {e}");
                        break;
                    }
                }
            };

            match parser.parse(&mut req, &buf[..n]) {
                ParseOutcome::Incomplete if !eos => continue,
                ParseOutcome::Incomplete => {
                    // Contract violation guard: the parser promises a terminal
                    // outcome on an empty (EOS) chunk. Abort defensively
                    // rather than spin.
                    eprintln!("worker {id}: parser returned Incomplete at EOS for {peer:?}");
                    break;
                }
                ParseOutcome::Ok => {
                    on_request(&mut req);
                    break;
                }
                ParseOutcome::Invalid(reason) => {
                    eprintln!("worker {id}: invalid request from {peer:?}: {reason}");
                    break;
                }
                ParseOutcome::Err(e) => {
                    eprintln!("worker {id}: parser error for {peer:?}: {e}");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpStream as ClientStream;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn end_to_end_accept_parse_and_callback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let received = Arc::new(AtomicUsize::new(0));
        let received_for_cb = Arc::clone(&received);

        let mut config = WorkerPoolConfig::default();
        config.worker_count = 2;

        let server = thread::spawn(move || {
            serve(listener, config, move |req| {
                assert_eq!(req.target(), b"/ping");
                received_for_cb.fetch_add(1, Ordering::SeqCst);
            })
        });

        // Give the accept loop a moment to start listening.
        thread::sleep(Duration::from_millis(20));

        for _ in 0..3 {
            let mut client = ClientStream::connect(addr).unwrap();
            client
                .write_all(b"GET /ping HTTP/1.1\r\nHost: h\r\n\r\n")
                .unwrap();
            client.shutdown(std::net::Shutdown::Write).ok();
            let mut discard = [0u8; 16];
            let _ = client.read(&mut discard);
        }

        thread::sleep(Duration::from_millis(100));
        assert_eq!(received.load(Ordering::SeqCst), 3);

        drop(server); // test process exit tears down the still-blocked accept thread
    }
}
