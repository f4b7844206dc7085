// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # eqbus - Topic-based publish/subscribe with discovery
//!
//! Loosely-coupled processes exchange typed events identified by a 128-bit
//! [`EventType`]. Subscribers find publishers through a zero-configuration
//! [`discovery`] backend, or through a [`connection::Broker`] rendezvous point
//! when passive discovery is not available.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eqbus::{Context, Event, EventType, Publisher, PublisherConfig, Subscriber,
//!             SubscriberConfig, Result};
//! use std::time::Duration;
//!
//! fn main() -> Result<()> {
//!     let context = Context::new();
//!     let echo = EventType::from_name("eqbus::vocabulary::Echo");
//!
//!     let mut publisher = Publisher::new(&context, PublisherConfig::default())?;
//!     let mut subscriber = Subscriber::new(
//!         &context,
//!         SubscriberConfig::default().with_endpoint(publisher.endpoint().clone()),
//!     )?;
//!
//!     subscriber.register_handler(echo, |event: &Event| {
//!         println!("echo: {:?}", event.data());
//!     })?;
//!
//!     publisher.publish(&Event::with_payload(echo, b"hello".to_vec()))?;
//!     subscriber.receive(Duration::from_millis(100))?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |  Subscriber (registry, topic filters, dispatch)   Publisher         |
//! +---------------------------------------------------------------------+
//! |  Connection Service  --query-->  Broker (static rendezvous)         |
//! +---------------------------------------------------------------------+
//! |  Discovery (Browser / DiscoveryBackend)                             |
//! +---------------------------------------------------------------------+
//! |  Transport: SubSocket | PubSocket | Poller | request/reply          |
//! +---------------------------------------------------------------------+
//! |  Wire: two-frame messages, little-endian EventType, frame codec     |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Threading
//!
//! A [`Subscriber`] is driven by exactly one thread at a time. Handlers run
//! inline on the thread calling [`Subscriber::receive`]. Independent
//! instances share nothing and may live on separate threads.

/// Broker rendezvous and the client-side connection service.
pub mod connection;
/// Process-wide messaging context (self identity, discovery, shutdown).
pub mod context;
/// Zero-configuration discovery contract and in-process backends.
pub mod discovery;
/// Publisher/subscriber endpoint addresses.
pub mod endpoint;
/// Error types.
pub mod error;
/// Publishing side of the bus.
pub mod publisher;
/// Session names partitioning discovery.
pub mod session;
/// Subscriber dispatch engine.
pub mod subscriber;
/// TCP sockets and readiness polling.
pub mod transport;
/// Message framing and event types.
pub mod wire;

pub use connection::{
    BindSpec, Broker, ConnectionService, PortSelection, ServiceConfig, Subscribable,
};
pub use context::{Context, ContextBuilder, InstanceId};
pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use publisher::{Publisher, PublisherConfig};
pub use session::{default_session, NULL_SESSION};
pub use subscriber::{ConnectionStatus, Subscriber, SubscriberConfig};
pub use transport::SharedReceiver;
pub use wire::{Event, EventType, Serializable};

/// eqbus version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
