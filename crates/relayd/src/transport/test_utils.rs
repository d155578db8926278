//! Test helpers for the transport module.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use tiny_http::{Request, Response};

use super::{Flow, RequestHandler};

/// Answers every request with `200 {}` and counts them. Returns
/// [`Flow::Stop`] once `stop_after` requests were seen.
pub(crate) struct CountingHandler {
    count: Arc<AtomicUsize>,
    stop_after: Option<usize>,
}

impl CountingHandler {
    pub(crate) fn new() -> (Arc<AtomicUsize>, Arc<Self>) {
        Self::stopping_after(None)
    }

    pub(crate) fn stopping_after(stop_after: Option<usize>) -> (Arc<AtomicUsize>, Arc<Self>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(Self {
            count: Arc::clone(&count),
            stop_after,
        });
        (count, handler)
    }
}

impl RequestHandler for CountingHandler {
    fn handle(&self, request: Request) -> Flow {
        let seen = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = request.respond(Response::from_string("{}"));
        match self.stop_after {
            Some(limit) if seen >= limit => Flow::Stop,
            _ => Flow::Continue,
        }
    }
}

/// Minimal HTTP/1.1 client: sends one request and returns the status code
/// and body.
pub(crate) fn send_request(
    addr: SocketAddr,
    path: &str,
    headers: &[(&str, &str)],
    body: &[u8],
) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).expect("connect client");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .expect("set read timeout");
    let mut head = format!(
        "POST {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\nContent-Length: {}\r\n",
        body.len()
    );
    for (name, value) in headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes()).expect("write head");
    stream.write_all(body).expect("write body");
    stream.flush().expect("flush request");

    let mut raw = String::new();
    stream.read_to_string(&mut raw).expect("read response");
    let status = raw
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("status code");
    let body = raw
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_owned())
        .unwrap_or_default();
    (status, body)
}
