// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Readiness polling over mio.
//!
//! One [`Poller`] may serve several owners (subscribers, brokers). Every
//! token reported by [`Poller::wait`] is kept in a ready set until its owner
//! claims it with [`Poller::take_ready`], so a wakeup meant for a sibling is
//! never lost.

use crate::error::Result;
use mio::event::Source;
use mio::{Events, Interest, Poll, Token};
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// Maximum events collected per wait.
const MAX_EVENTS: usize = 128;

/// Longest single OS wait. Callers loop until their own deadline.
const MAX_POLL_WAIT: Duration = Duration::from_secs(60 * 60);

/// mio poll instance plus the ready set.
pub struct Poller {
    poll: Poll,
    events: Events,
    next_token: usize,
    ready: HashSet<Token>,
}

impl Poller {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(MAX_EVENTS),
            next_token: 0,
            ready: HashSet::new(),
        })
    }

    /// Register `source` under a fresh token.
    pub fn register<S>(&mut self, source: &mut S, interest: Interest) -> io::Result<Token>
    where
        S: Source + ?Sized,
    {
        let token = Token(self.next_token);
        self.next_token += 1;
        self.poll.registry().register(source, token, interest)?;
        Ok(token)
    }

    pub fn deregister<S>(&mut self, source: &mut S, token: Token) -> io::Result<()>
    where
        S: Source + ?Sized,
    {
        self.ready.remove(&token);
        self.poll.registry().deregister(source)
    }

    /// Block up to `timeout` for readiness. Returns the number of events.
    pub fn wait(&mut self, timeout: Duration) -> io::Result<usize> {
        match self
            .poll
            .poll(&mut self.events, Some(timeout.min(MAX_POLL_WAIT)))
        {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(0),
            Err(e) => return Err(e),
        }

        let mut count = 0;
        for event in self.events.iter() {
            log::trace!("[Poller] ready {:?}", event.token());
            self.ready.insert(event.token());
            count += 1;
        }
        Ok(count)
    }

    /// Remove and return the ready tokens selected by `owns`.
    pub fn take_ready(&mut self, owns: impl Fn(Token) -> bool) -> Vec<Token> {
        let mine: Vec<Token> = self.ready.iter().copied().filter(|t| owns(*t)).collect();
        for token in &mine {
            self.ready.remove(token);
        }
        mine
    }

    /// True if any stored readiness is selected by `owns`.
    pub fn has_ready(&self, owns: impl Fn(Token) -> bool) -> bool {
        self.ready.iter().any(|t| owns(*t))
    }
}

/// Cloneable handle to a [`Poller`] shared by several sockets on one thread.
///
/// ```rust,no_run
/// use eqbus::{Context, SharedReceiver, Subscriber, SubscriberConfig};
///
/// # fn main() -> eqbus::Result<()> {
/// let context = Context::new();
/// let receiver = SharedReceiver::new()?;
/// let a = Subscriber::new(
///     &context,
///     SubscriberConfig::default().with_shared_receiver(receiver.clone()),
/// )?;
/// let b = Subscriber::new(&context, SubscriberConfig::default().with_shared_receiver(receiver))?;
/// # drop((a, b));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SharedReceiver {
    poller: Arc<Mutex<Poller>>,
}

impl SharedReceiver {
    pub fn new() -> Result<Self> {
        Ok(Self {
            poller: Arc::new(Mutex::new(Poller::new()?)),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Poller> {
        self.poller.lock()
    }

    /// Number of handles sharing this poller.
    pub fn members(&self) -> usize {
        Arc::strong_count(&self.poller)
    }
}

impl fmt::Debug for SharedReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedReceiver")
            .field("members", &self.members())
            .finish()
    }
}
