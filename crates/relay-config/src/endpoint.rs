use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{Host, Url};

use crate::defaults::{DEFAULT_HOST, DEFAULT_PORT};

/// Loopback HTTP endpoint the command server binds to.
///
/// The control surface is never exposed beyond the local machine, so parsing
/// rejects any host that does not resolve to a loopback address.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ListenEndpoint {
    host: IpAddr,
    port: u16,
}

impl ListenEndpoint {
    /// Builds an endpoint, rejecting non-loopback addresses.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointParseError::NotLoopback`] when `host` is routable.
    pub fn new(host: IpAddr, port: u16) -> Result<Self, EndpointParseError> {
        if !host.is_loopback() {
            return Err(EndpointParseError::NotLoopback(host.to_string()));
        }
        Ok(Self { host, port })
    }

    /// Endpoint on `127.0.0.1` with the given port. Port `0` asks the OS for a
    /// free port, which tests rely on.
    #[must_use]
    pub const fn loopback(port: u16) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
        }
    }

    /// Socket address to bind.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Configured port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl Default for ListenEndpoint {
    fn default() -> Self {
        Self::loopback(DEFAULT_PORT)
    }
}

impl fmt::Display for ListenEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.host {
            IpAddr::V4(host) => write!(formatter, "http://{host}:{}/", self.port),
            IpAddr::V6(host) => write!(formatter, "http://[{host}]:{}/", self.port),
        }
    }
}

impl FromStr for ListenEndpoint {
    type Err = EndpointParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input)?;
        if url.scheme() != "http" {
            return Err(EndpointParseError::UnsupportedScheme(
                url.scheme().to_owned(),
            ));
        }
        let host = match url.host() {
            Some(Host::Ipv4(addr)) => IpAddr::V4(addr),
            Some(Host::Ipv6(addr)) => IpAddr::V6(addr),
            Some(Host::Domain("localhost")) => IpAddr::V4(Ipv4Addr::LOCALHOST),
            Some(Host::Domain(other)) => {
                return Err(EndpointParseError::NotLoopback(other.to_owned()));
            }
            None => return Err(EndpointParseError::MissingHost(input.to_owned())),
        };
        let port = url.port().unwrap_or(DEFAULT_PORT);
        Self::new(host, port)
    }
}

/// Parses the default endpoint literal; used by clap's `default_value`.
#[must_use]
pub fn default_listen_literal() -> String {
    format!("http://{DEFAULT_HOST}:{DEFAULT_PORT}/")
}

/// Errors encountered while parsing a [`ListenEndpoint`] from text.
#[derive(Debug, Error)]
pub enum EndpointParseError {
    /// Scheme was not `http`.
    #[error("unsupported listen scheme '{0}'")]
    UnsupportedScheme(String),
    /// Host name was missing.
    #[error("missing host in '{0}'")]
    MissingHost(String),
    /// Host is not a loopback address.
    #[error("listen host '{0}' is not a loopback address")]
    NotLoopback(String),
    /// URL failed to parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_http_scheme() {
        let endpoint = ListenEndpoint::loopback(17890);
        assert_eq!(endpoint.to_string(), "http://127.0.0.1:17890/");
    }

    #[test]
    fn parse_localhost_maps_to_ipv4_loopback() {
        let endpoint: ListenEndpoint = "http://localhost:9000".parse().expect("parse");
        assert_eq!(endpoint, ListenEndpoint::loopback(9000));
    }

    #[test]
    fn parse_ipv6_loopback() {
        let endpoint: ListenEndpoint = "http://[::1]:9000/".parse().expect("parse");
        assert_eq!(endpoint.to_string(), "http://[::1]:9000/");
    }

    #[test]
    fn parse_rejects_routable_hosts() {
        let error = "http://0.0.0.0:9000"
            .parse::<ListenEndpoint>()
            .expect_err("wildcard bind must be rejected");
        assert!(matches!(error, EndpointParseError::NotLoopback(_)));

        let error = "http://example.com:9000"
            .parse::<ListenEndpoint>()
            .expect_err("domains must be rejected");
        assert!(matches!(error, EndpointParseError::NotLoopback(_)));
    }

    #[test]
    fn parse_rejects_other_schemes() {
        let error = "tcp://127.0.0.1:9000"
            .parse::<ListenEndpoint>()
            .expect_err("scheme must be http");
        assert!(matches!(error, EndpointParseError::UnsupportedScheme(_)));
    }

    #[test]
    fn default_literal_round_trips() {
        let endpoint: ListenEndpoint = default_listen_literal().parse().expect("parse");
        assert_eq!(endpoint, ListenEndpoint::default());
    }
}
