//! Request handling abstraction for the listener.

use tiny_http::Request;

/// Whether the accept loop should keep running after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The downstream consumer is gone; stop accepting.
    Stop,
}

/// Handles accepted HTTP requests.
pub trait RequestHandler: Send + Sync + 'static {
    /// Answers a single request. Implementations must respond on every path
    /// and should avoid panicking.
    fn handle(&self, request: Request) -> Flow;
}
