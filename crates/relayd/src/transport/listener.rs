//! Listener implementation for the loopback endpoint.

use std::io;
use std::net::SocketAddr;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use relay_config::ListenEndpoint;
use tiny_http::Server;
use tracing::{debug, info, warn};

use super::{Flow, LISTENER_TARGET, ListenerError, RequestHandler};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Listener bound to a loopback endpoint.
pub struct HttpListener {
    addr: SocketAddr,
    server: Server,
}

impl HttpListener {
    /// Binds `endpoint`. Port `0` picks a free port.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Bind`] when the address is unavailable.
    pub fn bind(endpoint: &ListenEndpoint) -> Result<Self, ListenerError> {
        let requested = endpoint.socket_addr();
        let server = Server::http(requested).map_err(|error| ListenerError::Bind {
            addr: requested,
            message: error.to_string(),
        })?;
        let addr = server.server_addr().to_ip().unwrap_or(requested);
        Ok(Self { addr, server })
    }

    /// Address actually bound.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Starts the accept loop on a background thread.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Spawn`] when the thread cannot be created.
    pub fn start(self, handler: Arc<dyn RequestHandler>) -> Result<ListenerHandle, ListenerError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name(String::from("relay-listener"))
            .spawn(move || run_accept_loop(&self, &shutdown_flag, &handler))
            .map_err(|source| ListenerError::Spawn { source })?;
        Ok(ListenerHandle {
            shutdown,
            handle: Some(handle),
        })
    }
}

/// Handle to the background listener thread.
pub struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Asks the accept loop to exit after its current poll.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// True once shutdown was requested, either explicitly or because a
    /// handler reported [`Flow::Stop`].
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Waits for the accept loop to exit, including the request it is
    /// serving. The socket is closed when the thread finishes.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] when the thread panicked.
    pub fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ListenerError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    listener: &HttpListener,
    shutdown: &AtomicBool,
    handler: &Arc<dyn RequestHandler>,
) {
    info!(
        target: LISTENER_TARGET,
        addr = %listener.addr,
        "http listener active"
    );
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match listener.server.recv_timeout(ACCEPT_BACKOFF) {
            Ok(Some(request)) => {
                last_error = None;
                if handler.handle(request) == Flow::Stop {
                    shutdown.store(true, Ordering::SeqCst);
                }
            }
            Ok(None) => {}
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "http accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    debug!(
        target: LISTENER_TARGET,
        addr = %listener.addr,
        "http listener stopped"
    );
}
