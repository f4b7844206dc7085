// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Zero-configuration discovery contract.
//!
//! The subscriber consumes discovery through two traits:
//!
//! - [`DiscoveryBackend`] - factory for browsers, and the announce side used
//!   by publishers
//! - [`Browser`] - browse/query view over announced instances
//!
//! Instance keys encode `host:port`. Recognized metadata keys are
//! [`KEY_SESSION`] and [`KEY_INSTANCE`].
//!
//! Two backends ship with the crate:
//!
//! - [`LocalDirectory`] - in-process directory (tests, single-host setups)
//! - [`NullDiscovery`] - reports itself unavailable; subscribers must then be
//!   given an explicit endpoint or use the connection broker

mod local;
mod null;

pub use local::{LocalBrowser, LocalDirectory};
pub use null::{NullBrowser, NullDiscovery};

use crate::error::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Service name publishers announce under.
pub const PUBLISHER_SERVICE: &str = "_eqbus._tcp";

/// Metadata key carrying the publisher's session.
pub const KEY_SESSION: &str = "session";

/// Metadata key carrying the announcing process' instance identifier.
pub const KEY_INSTANCE: &str = "instance";

/// Metadata attached to an announced instance.
pub type Metadata = BTreeMap<String, String>;

/// Network scope for browsing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interface {
    /// All interfaces.
    #[default]
    All,
    /// Loopback only.
    Local,
}

/// Browse/query view on one service.
pub trait Browser: Send {
    /// Whether a working implementation backs this browser.
    fn is_available(&self) -> bool;

    /// Start tracking announcements in `scope`.
    fn begin_browsing(&mut self, scope: Interface) -> Result<()>;

    /// Refresh the instance list, waiting at most `timeout` for news.
    fn browse(&mut self, timeout: Duration) -> Result<()>;

    fn is_browsing(&self) -> bool;

    fn end_browsing(&mut self);

    /// Instance keys (`host:port`) seen by the last browse.
    fn instances(&self) -> Vec<String>;

    /// Metadata value for `key`, if the instance advertises it.
    fn get(&self, instance: &str, key: &str) -> Option<String>;

    fn contains_key(&self, instance: &str, key: &str) -> bool {
        self.get(instance, key).is_some()
    }
}

/// Discovery implementation shared through the [`Context`](crate::Context).
pub trait DiscoveryBackend: Send + Sync {
    fn is_available(&self) -> bool;

    /// Create a browser for `service`.
    fn browser(&self, service: &str) -> Box<dyn Browser>;

    /// Announce `instance` under `service`. Withdrawn when the returned
    /// [`Announcement`] is dropped.
    fn announce(&self, service: &str, instance: &str, metadata: Metadata) -> Result<Announcement>;
}

/// Live announcement; dropping it withdraws the instance.
pub struct Announcement {
    withdraw: Option<Box<dyn FnOnce() + Send>>,
}

impl Announcement {
    /// Announcement that withdraws by running `withdraw`.
    pub fn new(withdraw: impl FnOnce() + Send + 'static) -> Self {
        Self {
            withdraw: Some(Box::new(withdraw)),
        }
    }

    /// Announcement with nothing to withdraw.
    pub fn none() -> Self {
        Self { withdraw: None }
    }
}

impl Drop for Announcement {
    fn drop(&mut self) {
        if let Some(withdraw) = self.withdraw.take() {
            withdraw();
        }
    }
}

impl fmt::Debug for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Announcement")
            .field("active", &self.withdraw.is_some())
            .finish()
    }
}
