// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscriber configuration.

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::session::NULL_SESSION;
use crate::transport::SharedReceiver;

/// Subscriber construction options.
///
/// # Example
///
/// ```rust
/// use eqbus::{Endpoint, SubscriberConfig};
///
/// let config = SubscriberConfig::default()
///     .with_session("lab")
///     .with_endpoint(Endpoint::new("127.0.0.1", 6000))
///     .with_strict(false);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug)]
pub struct SubscriberConfig {
    /// Session to bind to (`None` = default session).
    pub session: Option<String>,

    /// Publisher to connect to directly. Absent or not fully qualified
    /// selects discovery mode.
    pub endpoint: Option<Endpoint>,

    /// Poller shared with other subscribers or brokers.
    pub shared_receiver: Option<SharedReceiver>,

    /// Unregistered events are an error (true) or discarded (false).
    pub strict: bool,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            session: None,
            endpoint: None,
            shared_receiver: None,
            strict: cfg!(debug_assertions),
        }
    }
}

impl SubscriberConfig {
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn with_shared_receiver(mut self, receiver: SharedReceiver) -> Self {
        self.shared_receiver = Some(receiver);
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// True when a direct connection (no discovery) is requested.
    pub fn is_direct(&self) -> bool {
        self.endpoint
            .as_ref()
            .is_some_and(Endpoint::is_fully_qualified)
    }

    /// Check the configuration without touching the network.
    pub fn validate(&self) -> Result<()> {
        match self.session.as_deref() {
            Some("") | Some(NULL_SESSION) => Err(Error::Config(
                "Invalid session name for subscriber".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SubscriberConfig::default();
        assert!(config.session.is_none());
        assert!(!config.is_direct());
        assert_eq!(config.strict, cfg!(debug_assertions));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_direct_requires_fully_qualified_endpoint() {
        let partial = SubscriberConfig::default().with_endpoint(Endpoint::new("localhost", 0));
        assert!(!partial.is_direct());

        let full = SubscriberConfig::default().with_endpoint(Endpoint::new("localhost", 7000));
        assert!(full.is_direct());
    }

    #[test]
    fn test_validate_rejects_invalid_sessions() {
        assert!(SubscriberConfig::default().with_session("").validate().is_err());
        assert!(SubscriberConfig::default()
            .with_session(NULL_SESSION)
            .validate()
            .is_err());
    }
}
