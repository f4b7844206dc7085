// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection broker.
//!
//! Binds a reply socket and answers every query with an immutable address
//! table captured from its owner at construction.

use super::port::derive_port;
use super::protocol::{BrokerReply, BrokerRequest};
use super::Subscribable;
use crate::context::Context;
use crate::endpoint::{Endpoint, DEFAULT_SCHEME};
use crate::error::{Error, Result};
use crate::transport::{advertised_host, deadline_after, ReplySocket, SharedReceiver};
use mio::{Interest, Token};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

/// Time a client gets to deliver its request.
const REQUEST_IO_TIMEOUT: Duration = Duration::from_millis(500);

/// Wakeup interval of [`Broker::run`].
const RUN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Where a broker binds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindSpec {
    /// Literal `ip:port` (`*` for all interfaces, port 0 for ephemeral).
    Address(String),
    /// Symbolic name bound on all interfaces at [`derive_port`]`(name)`.
    Named(String),
}

impl BindSpec {
    /// Resolve to a socket address and the table name.
    fn resolve(&self) -> Result<(SocketAddr, Option<String>)> {
        match self {
            BindSpec::Address(address) => Ok((parse_bind_address(address)?, None)),
            BindSpec::Named(name) if name.is_empty() => {
                Err(Error::Config("empty broker service name".to_string()))
            }
            BindSpec::Named(name) => Ok((
                SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), derive_port(name)),
                Some(name.clone()),
            )),
        }
    }
}

fn parse_bind_address(address: &str) -> Result<SocketAddr> {
    let invalid = || Error::Config(format!("invalid broker address '{}'", address));

    let endpoint: Endpoint = address.parse().map_err(|_| invalid())?;
    if endpoint.scheme() != DEFAULT_SCHEME {
        return Err(invalid());
    }
    let ip = match endpoint.host() {
        "*" => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        host => host.parse::<IpAddr>().map_err(|_| invalid())?,
    };
    Ok(SocketAddr::new(ip, endpoint.port()))
}

/// Behaviour when the requested port cannot be bound.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PortSelection {
    /// Bind exactly the requested port or fail.
    #[default]
    Fixed,
    /// Fall back to an ephemeral port on the same interface.
    FixedOrRandom,
}

/// Endpoints a broker hands out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressTable {
    name: Option<String>,
    endpoints: Vec<Endpoint>,
}

impl AddressTable {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// A nameless table answers every query; a named one only its name.
    fn answers(&self, service: Option<&str>) -> bool {
        match (service, self.name.as_deref()) {
            (None, _) | (_, None) => true,
            (Some(wanted), Some(name)) => wanted == name,
        }
    }

    fn reply(&self, request: &[u8]) -> BrokerReply {
        match BrokerRequest::decode(request) {
            Ok(BrokerRequest::Query { service }) if self.answers(service.as_deref()) => {
                BrokerReply::Endpoints {
                    endpoints: self.endpoints.iter().map(Endpoint::to_string).collect(),
                }
            }
            Ok(BrokerRequest::Query { service }) => BrokerReply::Error {
                message: format!("unknown service '{}'", service.unwrap_or_default()),
            },
            Err(e) => {
                log::warn!("[Broker] {}", e);
                BrokerReply::Error {
                    message: e.to_string(),
                }
            }
        }
    }
}

/// Connection broker. See the [module docs](self).
pub struct Broker {
    context: Context,
    socket: ReplySocket,
    address: Endpoint,
    table: AddressTable,
    receiver: SharedReceiver,
    token: Token,
    max_message_size: usize,
}

impl Broker {
    /// Bind a broker handing out `owner`'s endpoints.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for an invalid address or an owner without endpoints
    /// - [`Error::BrokerBind`] if the port is taken under [`PortSelection::Fixed`]
    pub fn new<S>(context: &Context, spec: BindSpec, owner: &S, policy: PortSelection) -> Result<Self>
    where
        S: Subscribable + ?Sized,
    {
        Self::with_receiver(context, spec, owner, policy, SharedReceiver::new()?)
    }

    /// Like [`Broker::new`], polling on a shared receiver.
    pub fn with_receiver<S>(
        context: &Context,
        spec: BindSpec,
        owner: &S,
        policy: PortSelection,
        receiver: SharedReceiver,
    ) -> Result<Self>
    where
        S: Subscribable + ?Sized,
    {
        context.ensure_running()?;
        let (addr, name) = spec.resolve()?;

        let endpoints = owner.subscribable_endpoints();
        if endpoints.is_empty() {
            return Err(Error::Config(
                "broker owner offers no endpoints".to_string(),
            ));
        }

        let mut socket = match ReplySocket::bind(addr) {
            Ok(socket) => socket,
            Err(source) if policy == PortSelection::FixedOrRandom => {
                log::warn!(
                    "[Broker] cannot bind {} ({}), falling back to a random port",
                    addr,
                    source
                );
                ReplySocket::bind(SocketAddr::new(addr.ip(), 0)).map_err(|source| {
                    Error::BrokerBind {
                        address: addr.to_string(),
                        source,
                    }
                })?
            }
            Err(source) => {
                return Err(Error::BrokerBind {
                    address: addr.to_string(),
                    source,
                })
            }
        };

        let token = receiver
            .lock()
            .register(socket.source(), Interest::READABLE)?;

        let local = socket.local_addr();
        let address = Endpoint::new(advertised_host(&local).to_string(), local.port());
        log::info!(
            "[Broker] {} listening on {} ({} endpoint(s))",
            name.as_deref().unwrap_or("-"),
            address,
            endpoints.len()
        );

        Ok(Self {
            context: context.clone(),
            socket,
            address,
            table: AddressTable { name, endpoints },
            receiver,
            token,
            max_message_size: context.max_message_size(),
        })
    }

    /// Address the broker actually listens on.
    pub fn address(&self) -> &Endpoint {
        &self.address
    }

    pub fn table(&self) -> &AddressTable {
        &self.table
    }

    /// Wait up to `timeout` and answer every pending request.
    /// Returns whether any request was answered.
    pub fn receive(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = deadline_after(timeout);
        if self.serve()? > 0 {
            return Ok(true);
        }

        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            {
                let mut poller = self.receiver.lock();
                poller.wait(left)?;
                let token = self.token;
                poller.take_ready(|t| t == token);
            }

            if self.serve()? > 0 {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
        }
    }

    /// Serve requests until the context is shut down.
    pub fn run(&mut self) -> Result<()> {
        while !self.context.is_terminated() {
            self.receive(RUN_POLL_INTERVAL)?;
        }
        log::debug!("[Broker] {} stopped", self.address);
        Ok(())
    }

    fn serve(&mut self) -> Result<usize> {
        let table = &self.table;
        let served = self
            .socket
            .serve_pending(REQUEST_IO_TIMEOUT, self.max_message_size, |request| {
                table.reply(request).encode().unwrap_or_default()
            })?;
        if served > 0 {
            log::debug!("[Broker] answered {} request(s)", served);
        }
        Ok(served)
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        let _ = self
            .receiver
            .lock()
            .deregister(self.socket.source(), self.token);
    }
}

impl fmt::Debug for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broker")
            .field("address", &self.address.to_string())
            .field("table", &self.table)
            .finish()
    }
}
