// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client side of the connection broker.

use super::port::derive_port;
use super::protocol::{BrokerReply, BrokerRequest};
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::subscriber::Subscriber;
use crate::transport::{deadline_after, request};
use crate::wire::DEFAULT_MAX_MESSAGE_SIZE;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Default bound on one broker query.
pub const DEFAULT_SERVICE_TIMEOUT: Duration = Duration::from_secs(2);

/// Connection service settings.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Upper bound for connect, request and reply together.
    pub timeout: Duration,
    /// Largest reply accepted.
    pub max_message_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SERVICE_TIMEOUT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl ServiceConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::Config("service timeout must be non-zero".into()));
        }
        if self.max_message_size == 0 {
            return Err(Error::Config("max_message_size must be non-zero".into()));
        }
        Ok(())
    }
}

/// Asks brokers for endpoints and connects subscribers to them.
#[derive(Clone, Debug, Default)]
pub struct ConnectionService {
    config: ServiceConfig,
}

impl ConnectionService {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Connect `target` to the first endpoint the broker at `broker` offers.
    ///
    /// Returns false, within the configured timeout, when the broker is
    /// unreachable, silent or answers garbage, or when no endpoint connects.
    pub fn subscribe(&self, broker: &str, target: &mut Subscriber) -> bool {
        self.subscribe_with(broker, None, target)
    }

    /// Like [`subscribe`](Self::subscribe) for a broker bound to the
    /// symbolic name `service` on `host`.
    pub fn subscribe_named(&self, host: &str, service: &str, target: &mut Subscriber) -> bool {
        let broker = named_address(host, service);
        self.subscribe_with(&broker, Some(service), target)
    }

    fn subscribe_with(&self, broker: &str, service: Option<&str>, target: &mut Subscriber) -> bool {
        let endpoints = match self.query(broker, service) {
            Ok(endpoints) => endpoints,
            Err(e) => {
                log::info!("[ConnectionService] query to {} failed: {}", broker, e);
                return false;
            }
        };

        for endpoint in endpoints {
            match target.add_connection(&endpoint) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    log::warn!("[ConnectionService] cannot subscribe to {}: {}", endpoint, e);
                    return false;
                }
            }
        }
        log::info!("[ConnectionService] no endpoint from {} accepted", broker);
        false
    }

    /// Ask the broker at `broker` for its endpoints.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for an unparsable or partial broker address
    /// - [`Error::Timeout`] when no reply arrives in time
    /// - [`Error::Protocol`] for malformed or error replies
    pub fn query(&self, broker: &str, service: Option<&str>) -> Result<Vec<Endpoint>> {
        let addrs = resolve(broker)?;
        let body = BrokerRequest::Query {
            service: service.map(str::to_string),
        }
        .encode()?;

        let deadline = deadline_after(self.config.timeout);
        let mut last_err = Error::Timeout;
        let mut reply = None;
        for addr in addrs {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            match request(addr, &body, left, self.config.max_message_size) {
                Ok(bytes) => {
                    reply = Some(bytes);
                    break;
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => last_err = Error::Timeout,
                Err(e) => last_err = Error::Io(e),
            }
        }
        let reply = reply.ok_or(last_err)?;

        match BrokerReply::decode(&reply)? {
            BrokerReply::Endpoints { endpoints } => Ok(endpoints
                .iter()
                .filter_map(|text| match text.parse::<Endpoint>() {
                    Ok(endpoint) if endpoint.is_fully_qualified() => Some(endpoint),
                    _ => {
                        log::warn!("[ConnectionService] ignoring endpoint '{}'", text);
                        None
                    }
                })
                .collect()),
            BrokerReply::Error { message } => Err(Error::Protocol(message)),
        }
    }
}

fn named_address(host: &str, service: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, derive_port(service))
    } else {
        format!("{}:{}", host, derive_port(service))
    }
}

/// Resolve a broker address, IPv4 first.
fn resolve(broker: &str) -> Result<Vec<SocketAddr>> {
    let endpoint: Endpoint = broker.parse()?;
    if !endpoint.is_fully_qualified() {
        return Err(Error::Config(format!(
            "broker address '{}' needs host and port",
            broker
        )));
    }
    let mut addrs = endpoint
        .socket_addrs()
        .map_err(|e| Error::Config(format!("cannot resolve broker '{}': {}", broker, e)))?;
    if addrs.is_empty() {
        return Err(Error::Config(format!(
            "broker '{}' resolved to no address",
            broker
        )));
    }
    addrs.sort_by_key(|addr| !addr.is_ipv4());
    Ok(addrs)
}
