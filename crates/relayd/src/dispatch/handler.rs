//! Bridge from the HTTP listener to the execution thread.
//!
//! Each request is read in full on the listener thread, submitted to the
//! marshaler, and answered with whatever [`Reply`] the dispatcher produced.
//! Parsing never touches server state.

use std::io::Read;

use tiny_http::{Header, Request, Response};
use tracing::{debug, warn};

use super::request::CommandRequest;
use super::response::Reply;
use super::router::{DISPATCH_TARGET, dispatch};
use crate::context::ServerContext;
use crate::marshal::{MarshalError, Marshaler};
use crate::transport::{Flow, RequestHandler};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// [`RequestHandler`] that runs every command on the execution thread.
pub struct MarshalingHandler {
    marshaler: Marshaler<ServerContext>,
}

impl MarshalingHandler {
    /// Handler submitting through `marshaler`.
    #[must_use]
    pub const fn new(marshaler: Marshaler<ServerContext>) -> Self {
        Self { marshaler }
    }
}

impl RequestHandler for MarshalingHandler {
    fn handle(&self, mut request: Request) -> Flow {
        let command = match read_command(&mut request) {
            Ok(command) => command,
            Err(reply) => {
                respond(request, &reply);
                return Flow::Continue;
            }
        };
        debug!(
            target: DISPATCH_TARGET,
            command = command.name(),
            bytes = command.body().len(),
            "submitting request"
        );
        match self
            .marshaler
            .submit(move |ctx| dispatch(ctx, &command))
        {
            Ok(reply) => {
                respond(request, &reply);
                Flow::Continue
            }
            Err(MarshalError::Stopped) => {
                debug!(
                    target: DISPATCH_TARGET,
                    "execution thread stopped; closing listener"
                );
                respond(request, &Reply::error(503, "server stopping"));
                Flow::Stop
            }
            Err(error @ MarshalError::Abandoned) => {
                respond(request, &Reply::error(500, format!("internal error: {error}")));
                Flow::Continue
            }
        }
    }
}

fn read_command(request: &mut Request) -> Result<CommandRequest, Reply> {
    let too_large = || Reply::error(400, format!("request body exceeds {MAX_BODY_BYTES} bytes"));
    if request.body_length().is_some_and(|length| length > MAX_BODY_BYTES) {
        return Err(too_large());
    }
    let mut body = Vec::new();
    let limit = u64::try_from(MAX_BODY_BYTES).unwrap_or(u64::MAX).saturating_add(1);
    request
        .as_reader()
        .take(limit)
        .read_to_end(&mut body)
        .map_err(|error| Reply::error(400, format!("failed to read request body: {error}")))?;
    if body.len() > MAX_BODY_BYTES {
        return Err(too_large());
    }
    let headers: Vec<(String, String)> = request
        .headers()
        .iter()
        .map(|header| {
            (
                header.field.as_str().as_str().to_owned(),
                header.value.as_str().to_owned(),
            )
        })
        .collect();
    Ok(CommandRequest::new(request.url(), headers, body))
}

fn respond(request: Request, reply: &Reply) {
    let mut response = Response::from_string(reply.to_json()).with_status_code(reply.status());
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json; charset=utf-8"[..]) {
        response = response.with_header(header);
    }
    if let Err(error) = request.respond(response) {
        warn!(
            target: DISPATCH_TARGET,
            %error,
            "failed to write response"
        );
    }
}
