//! Public facade over the listener and the execution thread.
//!
//! [`Server`] owns the listener and the [`Marshaler`] used to reach the
//! execution thread. Hosts that drive their own frame loop start a `Server`
//! and drain an [`Executor`](crate::marshal::Executor) themselves;
//! [`ServerHandle`] instead spawns a dedicated execution thread.
//!
//! Admin actions (`set_token`, `set_enabled`, `notify_reloaded`) are not
//! reachable over HTTP. They run on the execution thread like any command.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use relay_config::{ListenEndpoint, ResolvedToken};
use thiserror::Error;
use tracing::info;

use crate::context::ServerContext;
use crate::dispatch::MarshalingHandler;
use crate::host::ReloadOutcome;
use crate::marshal::{self, ExecutorHandle, MarshalError, Marshaler};
use crate::transport::{HttpListener, ListenerError, ListenerHandle};

const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Running listener bound to a loopback endpoint.
pub struct Server {
    addr: SocketAddr,
    listener: ListenerHandle,
    marshaler: Marshaler<ServerContext>,
}

impl Server {
    /// Binds `endpoint` and starts accepting requests, submitting each one
    /// through `marshaler`.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when binding or spawning the accept thread
    /// fails.
    pub fn start(
        endpoint: &ListenEndpoint,
        marshaler: Marshaler<ServerContext>,
    ) -> Result<Self, ListenerError> {
        let listener = HttpListener::bind(endpoint)?;
        let addr = listener.local_addr();
        let handler = Arc::new(MarshalingHandler::new(marshaler.clone()));
        let listener = listener.start(handler)?;
        info!(
            target: SERVER_TARGET,
            %addr,
            "command server started"
        );
        Ok(Self {
            addr,
            listener,
            marshaler,
        })
    }

    /// Address actually bound.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL clients should use.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Replaces the token requests are checked against.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError`] when the execution thread is gone.
    pub fn set_token(&self, token: impl Into<String>) -> Result<(), MarshalError> {
        let token = ResolvedToken::explicit(token);
        self.marshaler
            .submit(move |ctx| ctx.gate_mut().set_token(token))
    }

    /// Flips the kill switch. This is the only way back from `panic-off`.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError`] when the execution thread is gone.
    pub fn set_enabled(&self, enabled: bool) -> Result<(), MarshalError> {
        self.marshaler
            .submit(move |ctx| ctx.gate_mut().set_enabled(enabled))
    }

    /// Applies the outcome of a code reload and returns the resulting route
    /// count.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError`] when the execution thread is gone.
    pub fn notify_reloaded(&self, outcome: ReloadOutcome) -> Result<usize, MarshalError> {
        self.marshaler
            .submit(move |ctx| ctx.apply_reload(outcome))
    }

    /// Handle for submitting arbitrary work to the execution thread.
    #[must_use]
    pub fn marshaler(&self) -> &Marshaler<ServerContext> {
        &self.marshaler
    }

    /// Asks the accept loop to exit without waiting for it.
    pub fn request_stop(&self) {
        self.listener.shutdown();
    }

    /// Stops accepting requests and waits for the accept loop to exit.
    ///
    /// The request being served is finished first, so the execution thread
    /// must either still be draining jobs or already be shut down.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] when the accept loop panicked.
    pub fn stop(self) -> Result<(), ListenerError> {
        self.listener.shutdown();
        self.listener.join()?;
        info!(
            target: SERVER_TARGET,
            addr = %self.addr,
            "command server stopped"
        );
        Ok(())
    }
}

/// Errors raised by [`ServerHandle`].
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to spawn execution thread: {0}")]
    Executor(#[source] io::Error),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error(transparent)]
    Marshal(#[from] MarshalError),
}

/// [`Server`] paired with a dedicated execution thread.
pub struct ServerHandle {
    server: Server,
    executor: ExecutorHandle,
}

impl ServerHandle {
    /// Spawns an execution thread whose state is built by `factory`, then
    /// starts listening on `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when either thread cannot be started.
    pub fn spawn<F>(endpoint: &ListenEndpoint, factory: F) -> Result<Self, ServerError>
    where
        F: FnOnce() -> ServerContext + Send + 'static,
    {
        let (marshaler, executor) =
            marshal::spawn("relay-executor", factory).map_err(ServerError::Executor)?;
        let server = Server::start(endpoint, marshaler)?;
        Ok(Self { server, executor })
    }

    /// The running server.
    #[must_use]
    pub const fn server(&self) -> &Server {
        &self.server
    }

    /// Stops the listener, then the execution thread.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when either thread panicked.
    pub fn stop(self) -> Result<(), ServerError> {
        let Self { server, executor } = self;
        let stopped = server.stop();
        executor.join()?;
        stopped?;
        Ok(())
    }
}
