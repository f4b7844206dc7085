// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Messaging context.
//!
//! A [`Context`] owns the process-wide pieces every socket needs: the
//! discovery backend, the transport limits and the instance identifier used
//! to recognize our own announcements. Clones share one inner state.

use crate::discovery::{DiscoveryBackend, LocalDirectory};
use crate::error::{Error, Result};
use crate::wire::DEFAULT_MAX_MESSAGE_SIZE;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default TCP connect timeout for subscriber connections.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Unique identifier of one context (one "process" on the bus).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceId(u128);

impl InstanceId {
    /// Fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().as_u128())
    }

    pub fn value(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for InstanceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        u128::from_str_radix(s.trim(), 16)
            .map(Self)
            .map_err(|_| Error::Config(format!("invalid instance id '{}'", s)))
    }
}

struct ContextInner {
    instance_id: InstanceId,
    discovery: Arc<dyn DiscoveryBackend>,
    connect_timeout: Duration,
    max_message_size: usize,
    terminated: AtomicBool,
}

/// Shared messaging context.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Context with a private in-process discovery directory.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    pub fn instance_id(&self) -> InstanceId {
        self.inner.instance_id
    }

    pub fn discovery(&self) -> &Arc<dyn DiscoveryBackend> {
        &self.inner.discovery
    }

    pub fn connect_timeout(&self) -> Duration {
        self.inner.connect_timeout
    }

    pub fn max_message_size(&self) -> usize {
        self.inner.max_message_size
    }

    /// Terminate the context. Blocking loops bound to it (e.g.
    /// [`Broker::run`](crate::Broker::run)) return at their next wakeup.
    pub fn shutdown(&self) {
        if !self.inner.terminated.swap(true, Ordering::AcqRel) {
            log::debug!("[Context] {} terminated", self.inner.instance_id);
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_running(&self) -> Result<()> {
        if self.is_terminated() {
            Err(Error::ContextTerminated)
        } else {
            Ok(())
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("instance_id", &self.inner.instance_id)
            .field("discovery_available", &self.inner.discovery.is_available())
            .field("connect_timeout", &self.inner.connect_timeout)
            .field("max_message_size", &self.inner.max_message_size)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// Builder for [`Context`].
pub struct ContextBuilder {
    discovery: Option<Arc<dyn DiscoveryBackend>>,
    connect_timeout: Duration,
    max_message_size: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            discovery: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl ContextBuilder {
    /// Use `backend` for discovery. Contexts sharing a backend see each
    /// other's publishers.
    pub fn discovery(mut self, backend: impl DiscoveryBackend + 'static) -> Self {
        self.discovery = Some(Arc::new(backend));
        self
    }

    pub fn shared_discovery(mut self, backend: Arc<dyn DiscoveryBackend>) -> Self {
        self.discovery = Some(backend);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn build(self) -> Context {
        let discovery = self
            .discovery
            .unwrap_or_else(|| Arc::new(LocalDirectory::new()));
        Context {
            inner: Arc::new(ContextInner {
                instance_id: InstanceId::generate(),
                discovery,
                connect_timeout: self.connect_timeout,
                max_message_size: self.max_message_size,
                terminated: AtomicBool::new(false),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::NullDiscovery;

    #[test]
    fn test_instance_ids_are_unique() {
        let a = Context::new();
        let b = Context::new();
        assert_ne!(a.instance_id(), b.instance_id());
        assert_eq!(a.clone().instance_id(), a.instance_id());
    }

    #[test]
    fn test_instance_id_text_round_trip() {
        let id = InstanceId::generate();
        let text = id.to_string();
        assert_eq!(text.len(), 32);
        assert_eq!(text.parse::<InstanceId>().unwrap(), id);
        assert!("xyz".parse::<InstanceId>().is_err());
    }

    #[test]
    fn test_builder_settings() {
        let ctx = Context::builder()
            .discovery(NullDiscovery)
            .connect_timeout(Duration::from_millis(250))
            .max_message_size(1024)
            .build();
        assert!(!ctx.discovery().is_available());
        assert_eq!(ctx.connect_timeout(), Duration::from_millis(250));
        assert_eq!(ctx.max_message_size(), 1024);
    }

    #[test]
    fn test_shutdown_is_shared_by_clones() {
        let ctx = Context::new();
        let clone = ctx.clone();
        assert!(ctx.ensure_running().is_ok());
        clone.shutdown();
        assert!(ctx.is_terminated());
        assert!(matches!(ctx.ensure_running(), Err(Error::ContextTerminated)));
    }
}
