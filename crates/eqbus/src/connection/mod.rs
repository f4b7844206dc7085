// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Static rendezvous for networks without passive discovery.
//!
//! A [`Broker`] listens on a well-known address (literal, or derived from a
//! service name) and answers queries with the endpoints of the object that
//! owns it. A [`ConnectionService`] asks a broker and connects a
//! [`Subscriber`](crate::Subscriber) to the first endpoint that works.
//!
//! ```text
//!  Subscriber          ConnectionService           Broker          Publisher
//!      |                      |   query(service)     |                 |
//!      |                      |--------------------->|                 |
//!      |                      |   endpoints [..]     |                 |
//!      |                      |<---------------------|                 |
//!      |  add_connection(ep)  |                                        |
//!      |<---------------------|                                        |
//!      |---------------------------- subscribe ----------------------->|
//! ```

mod broker;
mod port;
mod protocol;
mod service;

pub use broker::{AddressTable, BindSpec, Broker, PortSelection};
pub use port::{derive_port, fnv1a_32, NAME_PORT_DERIVATION_VERSION};
pub use protocol::{BrokerReply, BrokerRequest};
pub use service::{ConnectionService, ServiceConfig};

use crate::endpoint::Endpoint;

/// An object a broker can hand out endpoints for.
pub trait Subscribable {
    /// Endpoints a subscriber may connect to, in preference order.
    fn subscribable_endpoints(&self) -> Vec<Endpoint>;
}

impl Subscribable for Endpoint {
    fn subscribable_endpoints(&self) -> Vec<Endpoint> {
        vec![self.clone()]
    }
}

impl Subscribable for [Endpoint] {
    fn subscribable_endpoints(&self) -> Vec<Endpoint> {
        self.to_vec()
    }
}
