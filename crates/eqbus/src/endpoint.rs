// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint addresses (`scheme://host:port`).
//!
//! The canonical string form (`Display`) is the key under which a subscriber
//! tracks its connections, so two spellings of the same address collapse into
//! one entry once parsed.

use crate::error::{Error, Result};
use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

/// Scheme used when none is given.
pub const DEFAULT_SCHEME: &str = "tcp";

/// Address of a publisher or broker socket.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    scheme: String,
    host: String,
    port: u16,
}

impl Endpoint {
    /// TCP endpoint from host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            host: host.into(),
            port,
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Host present and port non-zero. Only such endpoints can be connected to.
    pub fn is_fully_qualified(&self) -> bool {
        !self.host.is_empty() && self.port != 0
    }

    /// Resolve to socket addresses. `*` resolves to the unspecified address.
    pub fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        if self.scheme != DEFAULT_SCHEME {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported scheme '{}'", self.scheme),
            ));
        }
        let host = if self.host == "*" {
            "0.0.0.0"
        } else {
            self.host.as_str()
        };
        Ok((host, self.port).to_socket_addrs()?.collect())
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", self.scheme, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    /// Accepts `scheme://host:port`, `host:port`, `[v6]:port` and `host`
    /// (port 0, not fully qualified).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::Config("empty endpoint".into()));
        }

        let (scheme, rest) = match s.split_once("://") {
            Some((scheme, rest)) if !scheme.is_empty() => (scheme, rest),
            Some(_) => return Err(Error::Config(format!("missing scheme in '{}'", s))),
            None => (DEFAULT_SCHEME, s),
        };

        let (host, port) = if let Some(v6) = rest.strip_prefix('[') {
            let (host, tail) = v6
                .split_once(']')
                .ok_or_else(|| Error::Config(format!("unterminated IPv6 host in '{}'", s)))?;
            let port = match tail.strip_prefix(':') {
                Some(port) => parse_port(port, s)?,
                None if tail.is_empty() => 0,
                None => return Err(Error::Config(format!("malformed endpoint '{}'", s))),
            };
            (host, port)
        } else {
            match rest.rsplit_once(':') {
                Some((host, port)) => (host, parse_port(port, s)?),
                None => (rest, 0),
            }
        };

        Ok(Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            port,
        })
    }
}

fn parse_port(port: &str, input: &str) -> Result<u16> {
    port.parse::<u16>()
        .map_err(|_| Error::Config(format!("invalid port in endpoint '{}'", input)))
}
