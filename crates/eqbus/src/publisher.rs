// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publishing side of the bus.
//!
//! A publisher binds a [`PubSocket`] and announces `host:port` under
//! [`PUBLISHER_SERVICE`] with its session and the context's instance id, so
//! that subscribers in the same session find it and subscribers in the same
//! context skip it.

use crate::connection::Subscribable;
use crate::context::Context;
use crate::discovery::{Announcement, Metadata, KEY_INSTANCE, KEY_SESSION, PUBLISHER_SERVICE};
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::session::{self, NULL_SESSION};
use crate::transport::{advertised_host, PubSocket};
use crate::wire::{Event, Serializable};
use std::fmt;
use std::net::SocketAddr;

/// Default bind address (all interfaces, ephemeral port).
pub const DEFAULT_BIND: &str = "0.0.0.0:0";

/// Publisher construction options.
#[derive(Clone, Debug)]
pub struct PublisherConfig {
    /// Session announced to subscribers (`None` = default session).
    /// [`NULL_SESSION`] disables the announcement.
    pub session: Option<String>,

    /// Local `host:port` to bind.
    pub bind: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            session: None,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

impl PublisherConfig {
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.session.as_deref() == Some("") {
            return Err(Error::Config(
                "Invalid session name for publisher".to_string(),
            ));
        }
        self.bind_addr().map(|_| ())
    }

    fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .map_err(|_| Error::Config(format!("invalid bind address '{}'", self.bind)))
    }
}

/// Event publisher.
pub struct Publisher {
    socket: PubSocket,
    endpoint: Endpoint,
    session: String,
    _announcement: Announcement,
}

impl Publisher {
    pub fn new(context: &Context, config: PublisherConfig) -> Result<Self> {
        context.ensure_running()?;
        config.validate()?;
        let session = session::resolve_publisher(config.session.as_deref())?;
        let bind = config.bind_addr()?;

        let socket = PubSocket::bind(bind, context.max_message_size())?;
        let local = socket.local_addr();
        let endpoint = Endpoint::new(advertised_host(&local).to_string(), local.port());

        let announcement = if session == NULL_SESSION {
            Announcement::none()
        } else {
            let mut metadata = Metadata::new();
            metadata.insert(KEY_SESSION.to_string(), session.clone());
            metadata.insert(KEY_INSTANCE.to_string(), context.instance_id().to_string());
            let instance = instance_key(&endpoint);
            context
                .discovery()
                .announce(PUBLISHER_SERVICE, &instance, metadata)?
        };

        log::info!("[Publisher] bound {} (session={})", endpoint, session);
        Ok(Self {
            socket,
            endpoint,
            session,
            _announcement: announcement,
        })
    }

    /// Address subscribers connect to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    /// Connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.socket.peer_count()
    }

    /// Send `event` to every subscriber registered for its type.
    /// Returns the number of subscribers it was sent to.
    pub fn publish(&mut self, event: &Event) -> Result<usize> {
        Ok(self.socket.send(event)?)
    }

    /// Publish the current state of a stateful object.
    pub fn publish_serializable(&mut self, object: &dyn Serializable) -> Result<usize> {
        self.publish(&Event::from_serializable(object))
    }

    /// Accept new subscribers and apply their filter updates without sending.
    pub fn poll(&mut self) -> Result<()> {
        Ok(self.socket.poll_peers()?)
    }
}

/// Discovery instance key: `host:port`, IPv6 hosts bracketed.
fn instance_key(endpoint: &Endpoint) -> String {
    if endpoint.host().contains(':') {
        format!("[{}]:{}", endpoint.host(), endpoint.port())
    } else {
        format!("{}:{}", endpoint.host(), endpoint.port())
    }
}

impl Subscribable for Publisher {
    fn subscribable_endpoints(&self) -> Vec<Endpoint> {
        vec![self.endpoint.clone()]
    }
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("endpoint", &self.endpoint.to_string())
            .field("session", &self.session)
            .field("subscribers", &self.socket.peer_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::LocalDirectory;

    #[test]
    fn test_publisher_announces_itself() {
        let directory = LocalDirectory::new();
        let ctx = Context::builder().discovery(directory.clone()).build();
        let publisher = Publisher::new(
            &ctx,
            PublisherConfig::default()
                .with_session("alpha")
                .with_bind("127.0.0.1:0"),
        )
        .unwrap();

        let records = directory.instances(PUBLISHER_SERVICE);
        let key = format!("127.0.0.1:{}", publisher.endpoint().port());
        let metadata = &records[&key];
        assert_eq!(metadata[KEY_SESSION], "alpha");
        assert_eq!(metadata[KEY_INSTANCE], ctx.instance_id().to_string());

        drop(publisher);
        assert!(directory.instances(PUBLISHER_SERVICE).is_empty());
    }

    #[test]
    fn test_null_session_is_not_announced() {
        let directory = LocalDirectory::new();
        let ctx = Context::builder().discovery(directory.clone()).build();
        let publisher = Publisher::new(
            &ctx,
            PublisherConfig::default()
                .with_session(NULL_SESSION)
                .with_bind("127.0.0.1:0"),
        )
        .unwrap();
        assert_eq!(publisher.session(), NULL_SESSION);
        assert!(directory.instances(PUBLISHER_SERVICE).is_empty());
    }

    #[test]
    fn test_invalid_config() {
        let ctx = Context::new();
        assert!(Publisher::new(&ctx, PublisherConfig::default().with_session("")).is_err());
        assert!(Publisher::new(&ctx, PublisherConfig::default().with_bind("nope")).is_err());
    }

    #[test]
    fn test_wildcard_bind_advertises_concrete_host() {
        let ctx = Context::new();
        let publisher = Publisher::new(&ctx, PublisherConfig::default()).unwrap();
        assert!(publisher.endpoint().is_fully_qualified());
        assert_ne!(publisher.endpoint().host(), "0.0.0.0");
        assert_eq!(publisher.subscribable_endpoints().len(), 1);
    }
}
