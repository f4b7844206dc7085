// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscriber dispatch engine.
//!
//! A [`Subscriber`] tracks a set of publisher connections, keeps the topic
//! filters on every live connection equal to the set of registered event
//! types, and dispatches incoming events to callbacks or stateful objects.
//!
//! # Architecture
//!
//! ```text
//! +----------------------------------------------------------------+
//! |                          Subscriber                            |
//! |                                                                |
//! |   Registry                      Connections (by endpoint)      |
//! |   +------------------------+    +---------------------------+  |
//! |   | EventType -> Callback  |    | tcp://a:1  Connected      |  |
//! |   | EventType -> Stateful  |    | tcp://b:2  PermanentlyFailed |
//! |   +------------------------+    +---------------------------+  |
//! |              ^                               |                 |
//! |              | dispatch                      | SubSocket       |
//! |              +----------- receive() <--------+ (Poller)        |
//! |                                                                |
//! |   Browser --update()--> new instances --> add_connection()     |
//! +----------------------------------------------------------------+
//! ```
//!
//! # Modes
//!
//! - **Direct**: the configured endpoint is fully qualified. The subscriber
//!   connects once and construction fails if the connect fails.
//! - **Discovery**: publishers are found through the context's discovery
//!   backend and connected on [`Subscriber::update`].
//!
//! # Threading
//!
//! All operations take `&mut self`; a subscriber is driven by one thread at a
//! time. Handlers run inline inside [`Subscriber::receive`] and
//! [`Subscriber::process`].

mod config;
mod connection;
mod registry;

pub use config::SubscriberConfig;
pub use connection::ConnectionStatus;
pub use registry::Handler;

use crate::connection::Subscribable;
use crate::context::{Context, InstanceId};
use crate::discovery::{Browser, Interface, KEY_INSTANCE, KEY_SESSION, PUBLISHER_SERVICE};
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::session;
use crate::transport::{deadline_after, SharedReceiver, SubSocket};
use crate::wire::{Event, EventType, Serializable};
use connection::Connection;
use mio::{Interest, Token};
use parking_lot::Mutex;
use registry::{Registration, Registry};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Subscriber dispatch engine. See the [module docs](self).
pub struct Subscriber {
    context: Context,
    session: String,
    strict: bool,
    receiver: SharedReceiver,
    browser: Option<Box<dyn Browser>>,
    registry: Registry,
    connections: BTreeMap<String, Connection>,
    tokens: HashMap<Token, String>,
    /// Applied to every socket opened from now on.
    #[cfg(test)]
    write_fault: Option<io::ErrorKind>,
}

impl Subscriber {
    /// Create a subscriber.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for an empty or null session, or when discovery
    ///   mode is selected and the backend is unavailable
    /// - [`Error::Connect`] when a direct endpoint cannot be reached
    /// - [`Error::ContextTerminated`] after [`Context::shutdown`]
    pub fn new(context: &Context, config: SubscriberConfig) -> Result<Self> {
        context.ensure_running()?;
        config.validate()?;
        let session = session::resolve_subscriber(config.session.as_deref())?;
        let direct = config.is_direct();

        let receiver = match config.shared_receiver {
            Some(receiver) => receiver,
            None => SharedReceiver::new()?,
        };

        let mut subscriber = Self {
            context: context.clone(),
            session,
            strict: config.strict,
            receiver,
            browser: None,
            registry: Registry::default(),
            connections: BTreeMap::new(),
            tokens: HashMap::new(),
            #[cfg(test)]
            write_fault: None,
        };

        match config.endpoint {
            Some(endpoint) if direct => {
                let socket = subscriber.open(&endpoint).map_err(|source| Error::Connect {
                    endpoint: endpoint.to_string(),
                    source,
                })?;
                subscriber.attach(endpoint, socket)?;
            }
            _ => {
                let backend = context.discovery();
                if !backend.is_available() {
                    return Err(Error::Config(
                        "Empty discovery implementation, an endpoint is required".to_string(),
                    ));
                }
                let mut browser = backend.browser(PUBLISHER_SERVICE);
                browser.begin_browsing(Interface::All)?;
                subscriber.browser = Some(browser);
                subscriber.update()?;
            }
        }

        log::debug!(
            "[Subscriber] created (session={}, connections={})",
            subscriber.session,
            subscriber.connections.len()
        );
        Ok(subscriber)
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    // ========================================================================
    // Registrations
    // ========================================================================

    /// Register `handler` for `event_type`.
    ///
    /// Returns `Ok(false)` if the type already has a registration; the
    /// existing one stays active. The topic filter is applied to every live
    /// connection before the handler is stored.
    pub fn register_handler<F>(&mut self, event_type: EventType, handler: F) -> Result<bool>
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.register(event_type, Registration::Callback(Box::new(handler)))
    }

    /// Remove the registration for `event_type`, callback or stateful.
    pub fn deregister_handler(&mut self, event_type: EventType) -> Result<bool> {
        if self.registry.remove(event_type).is_none() {
            return Ok(false);
        }
        self.retract_filter(event_type)?;
        Ok(true)
    }

    pub fn has_handler(&self, event_type: EventType) -> bool {
        self.registry.contains(event_type)
    }

    /// Register a stateful object under its own type identifier.
    pub fn subscribe<T>(&mut self, object: &Arc<Mutex<T>>) -> Result<bool>
    where
        T: Serializable + 'static,
    {
        let event_type = object.lock().type_identifier();
        let object: Arc<Mutex<dyn Serializable>> = object.clone();
        self.register(event_type, Registration::Stateful(object))
    }

    /// Remove `object` if it is the registration for its type.
    pub fn unsubscribe<T>(&mut self, object: &Arc<Mutex<T>>) -> Result<bool>
    where
        T: Serializable + 'static,
    {
        let event_type = object.lock().type_identifier();
        let object: Arc<Mutex<dyn Serializable>> = object.clone();
        if !self.registry.remove_stateful(event_type, &object) {
            return Ok(false);
        }
        self.retract_filter(event_type)?;
        Ok(true)
    }

    fn register(&mut self, event_type: EventType, registration: Registration) -> Result<bool> {
        if self.registry.contains(event_type) {
            return Ok(false);
        }
        self.apply_filter(event_type)?;
        self.registry.insert(event_type, registration);
        log::debug!("[Subscriber] registered {}", event_type);
        Ok(true)
    }

    /// Install `event_type` on every live connection, all or nothing.
    fn apply_filter(&mut self, event_type: EventType) -> Result<()> {
        let mut applied = Vec::new();
        let mut failure = None;

        for (key, conn) in self.connections.iter_mut() {
            let Some(socket) = conn.socket.as_mut() else {
                continue;
            };
            match socket.subscribe(event_type) {
                Ok(_) => applied.push(key.clone()),
                Err(source) => {
                    failure = Some(Error::TopicFilter {
                        endpoint: key.clone(),
                        source,
                    });
                    break;
                }
            }
        }

        let Some(err) = failure else {
            return Ok(());
        };

        for key in applied {
            if let Some(socket) = self.connections.get_mut(&key).and_then(|c| c.socket.as_mut()) {
                let _ = socket.unsubscribe(event_type);
            }
        }
        Err(err)
    }

    /// Retract `event_type` from every live connection. Reports the first
    /// failure after trying all of them.
    fn retract_filter(&mut self, event_type: EventType) -> Result<()> {
        let mut failure = None;
        for (key, conn) in self.connections.iter_mut() {
            let Some(socket) = conn.socket.as_mut() else {
                continue;
            };
            if let Err(source) = socket.unsubscribe(event_type) {
                failure.get_or_insert(Error::TopicFilter {
                    endpoint: key.clone(),
                    source,
                });
            }
        }
        log::debug!("[Subscriber] deregistered {}", event_type);
        failure.map_or(Ok(()), Err)
    }

    // ========================================================================
    // Connections
    // ========================================================================

    /// Connect to `endpoint` unless it is already tracked.
    ///
    /// Returns `Ok(true)` when the endpoint is (or already was) connected and
    /// `Ok(false)` when the connect failed. Failures are remembered and never
    /// retried.
    pub fn add_connection(&mut self, endpoint: &Endpoint) -> Result<bool> {
        self.connect(endpoint, None)
    }

    fn connect(&mut self, endpoint: &Endpoint, instance: Option<InstanceId>) -> Result<bool> {
        self.context.ensure_running()?;

        if instance == Some(self.context.instance_id()) {
            log::trace!("[Subscriber] skipping own publisher {}", endpoint);
            return Ok(true);
        }

        let key = endpoint.to_string();
        match self.connections.get(&key).map(|conn| conn.status) {
            Some(ConnectionStatus::Connected) => return Ok(true),
            Some(ConnectionStatus::PermanentlyFailed) => return Ok(false),
            Some(ConnectionStatus::Unresolved) | None => {}
        }
        self.connections
            .entry(key.clone())
            .or_insert_with(|| Connection::new(endpoint.clone()));

        match self.open(endpoint) {
            Ok(socket) => {
                self.attach(endpoint.clone(), socket)?;
                Ok(true)
            }
            Err(e) => {
                log::info!("[Subscriber] cannot connect to {}: {}", endpoint, e);
                if let Some(conn) = self.connections.get_mut(&key) {
                    conn.fail();
                }
                Ok(false)
            }
        }
    }

    fn open(&self, endpoint: &Endpoint) -> io::Result<SubSocket> {
        #[allow(unused_mut)]
        let mut socket = SubSocket::connect(
            endpoint,
            self.context.connect_timeout(),
            self.context.max_message_size(),
        )?;
        #[cfg(test)]
        if let Some(kind) = self.write_fault {
            socket.fail_writes(kind);
        }
        Ok(socket)
    }

    /// Register a fresh socket and install every current filter on it.
    fn attach(&mut self, endpoint: Endpoint, mut socket: SubSocket) -> Result<()> {
        let key = endpoint.to_string();
        let token = self
            .receiver
            .lock()
            .register(socket.source(), Interest::READABLE | Interest::WRITABLE)?;

        for event_type in self.registry.types() {
            if let Err(source) = socket.subscribe(event_type) {
                let _ = self.receiver.lock().deregister(socket.source(), token);
                return Err(Error::TopicFilter {
                    endpoint: key,
                    source,
                });
            }
        }

        log::info!("[Subscriber] connected to {}", endpoint);
        self.tokens.insert(token, key.clone());
        let conn = self
            .connections
            .entry(key)
            .or_insert_with(|| Connection::new(endpoint));
        conn.status = ConnectionStatus::Connected;
        conn.socket = Some(socket);
        conn.token = Some(token);
        Ok(())
    }

    /// Deregister a dead connection and mark it permanently failed.
    fn close_connection(&mut self, key: &str, reason: &dyn fmt::Display) {
        let Some(conn) = self.connections.get_mut(key) else {
            return;
        };
        if let (Some(socket), Some(token)) = (conn.socket.as_mut(), conn.token) {
            let _ = self.receiver.lock().deregister(socket.source(), token);
            self.tokens.remove(&token);
        }
        conn.fail();
        log::info!("[Subscriber] lost connection to {}: {}", key, reason);
    }

    pub fn connection_status(&self, endpoint: &Endpoint) -> Option<ConnectionStatus> {
        self.connections
            .get(&endpoint.to_string())
            .map(|conn| conn.status)
    }

    /// Every tracked endpoint with its status.
    pub fn connections(&self) -> impl Iterator<Item = (&Endpoint, ConnectionStatus)> + '_ {
        self.connections
            .values()
            .map(|conn| (&conn.endpoint, conn.status))
    }

    /// Refresh discovery and connect to publishers seen for the first time.
    ///
    /// Records advertising a different non-empty session are skipped, as are
    /// records announced by this context. No-op in direct mode.
    pub fn update(&mut self) -> Result<()> {
        self.context.ensure_running()?;
        let Some(browser) = self.browser.as_mut() else {
            return Ok(());
        };
        browser.browse(Duration::ZERO)?;

        let mut candidates = Vec::new();
        for instance in browser.instances() {
            let endpoint = match instance.parse::<Endpoint>() {
                Ok(endpoint) if endpoint.is_fully_qualified() => endpoint,
                _ => {
                    log::debug!("[Subscriber] ignoring malformed instance '{}'", instance);
                    continue;
                }
            };
            if self.connections.contains_key(&endpoint.to_string()) {
                continue;
            }

            if let Some(session) = browser.get(&instance, KEY_SESSION) {
                if !session.is_empty() && session != self.session {
                    log::debug!(
                        "[Subscriber] skipping {} (session {} != {})",
                        instance,
                        session,
                        self.session
                    );
                    continue;
                }
            }

            let instance_id = browser
                .get(&instance, KEY_INSTANCE)
                .and_then(|id| id.parse::<InstanceId>().ok());
            candidates.push((endpoint, instance_id));
        }

        for (endpoint, instance_id) in candidates {
            self.connect(&endpoint, instance_id)?;
        }
        Ok(())
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Consume and dispatch one message from `endpoint`, reading from the
    /// socket if nothing is buffered. Returns whether a message was handled.
    pub fn process(&mut self, endpoint: &Endpoint) -> Result<bool> {
        let key = endpoint.to_string();
        match self.next_event(&key)? {
            Some(event) => {
                self.registry.dispatch(&event, self.strict)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Wait up to `timeout` for messages and dispatch everything available.
    ///
    /// Returns whether at least one message was handled. Never blocks past
    /// `timeout`; a zero timeout polls once.
    pub fn receive(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = deadline_after(timeout);

        self.take_ready();
        if self.drain()? > 0 {
            return Ok(true);
        }

        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            self.receiver.lock().wait(left)?;
            self.take_ready();

            if self.drain()? > 0 {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
        }
    }

    /// Claim our stored readiness so siblings do not see it.
    fn take_ready(&mut self) {
        let tokens = &self.tokens;
        self.receiver
            .lock()
            .take_ready(|token| tokens.contains_key(&token));
    }

    /// Dispatch every complete message on every live connection.
    fn drain(&mut self) -> Result<usize> {
        let keys: Vec<String> = self
            .connections
            .iter()
            .filter(|(_, conn)| conn.is_connected())
            .map(|(key, _)| key.clone())
            .collect();

        let mut handled = 0;
        for key in keys {
            while let Some(event) = self.next_event(&key)? {
                self.registry.dispatch(&event, self.strict)?;
                handled += 1;
            }
        }
        Ok(handled)
    }

    /// Next buffered message of one connection, reading when needed.
    fn next_event(&mut self, key: &str) -> Result<Option<Event>> {
        let Some(socket) = self
            .connections
            .get_mut(key)
            .and_then(|conn| conn.socket.as_mut())
        else {
            return Ok(None);
        };

        let result = read_event(socket);
        let closed = socket.is_closed() && !socket.has_buffered();

        match result {
            Ok(Some(event)) => Ok(Some(event)),
            Ok(None) => {
                if closed {
                    self.close_connection(key, &"closed by peer");
                }
                Ok(None)
            }
            Err(e) => {
                self.close_connection(key, &e);
                Ok(None)
            }
        }
    }
}

fn read_event(socket: &mut SubSocket) -> io::Result<Option<Event>> {
    if let Some(event) = socket.next_message()? {
        return Ok(Some(event));
    }
    socket.fill()?;
    socket.next_message()
}

impl Subscribable for Subscriber {
    fn subscribable_endpoints(&self) -> Vec<Endpoint> {
        self.connections
            .values()
            .filter(|conn| conn.is_connected())
            .map(|conn| conn.endpoint.clone())
            .collect()
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        {
            let mut poller = self.receiver.lock();
            for conn in self.connections.values_mut() {
                if let (Some(socket), Some(token)) = (conn.socket.as_mut(), conn.token) {
                    let _ = poller.deregister(socket.source(), token);
                }
            }
        }
        if let Some(browser) = self.browser.as_mut() {
            browser.end_browsing();
        }
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("session", &self.session)
            .field("strict", &self.strict)
            .field("registrations", &self.registry.len())
            .field("connections", &self.connections.len())
            .field("discovery", &self.browser.is_some())
            .finish()
    }
}
