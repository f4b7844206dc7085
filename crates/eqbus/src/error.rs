// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for eqbus operations.
//!
//! Fatal conditions surface synchronously to the caller of the operation that
//! triggered them. Nothing here is retried automatically.

use crate::wire::EventType;
use std::io;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// eqbus error.
///
/// # Example
///
/// ```rust,no_run
/// use eqbus::{Context, Error, Subscriber, SubscriberConfig};
///
/// let context = Context::new();
/// match Subscriber::new(&context, SubscriberConfig::default().with_session("")) {
///     Err(Error::Config(msg)) => println!("bad config: {}", msg),
///     Err(e) => println!("other error: {}", e),
///     Ok(_) => println!("subscribed"),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ========================================================================
    // Construction
    // ========================================================================
    /// Invalid session, malformed address, discovery unavailable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The owning [`Context`](crate::Context) was shut down.
    #[error("Messaging context terminated")]
    ContextTerminated,

    // ========================================================================
    // Transport
    // ========================================================================
    /// Peer unreachable.
    #[error("Cannot connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    /// Applying or retracting a topic filter on an open connection failed.
    #[error("Cannot update topic filter on {endpoint}: {source}")]
    TopicFilter {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    /// Broker could not bind its rendezvous address.
    #[error("Cannot bind broker to {address}: {source}")]
    BrokerBind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Bounded request ran out of time.
    #[error("Operation timed out")]
    Timeout,

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // ========================================================================
    // Data
    // ========================================================================
    /// An event arrived for a type with no registration.
    #[error("Got unsubscribed event {0}")]
    ProtocolViolation(EventType),

    /// Malformed frame, request or reply.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A stateful object rejected its payload.
    #[error("Cannot deserialize {event_type}: {reason}")]
    Deserialize { event_type: EventType, reason: String },
}

impl Error {
    /// True for errors a caller can only fix by changing configuration.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}
