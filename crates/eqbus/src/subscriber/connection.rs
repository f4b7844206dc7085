// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-endpoint connection state.

use crate::endpoint::Endpoint;
use crate::transport::SubSocket;
use mio::Token;
use std::fmt;

/// Connection state as seen by the subscriber.
///
/// ```text
///   Unresolved --connect ok--> Connected --peer closed--> PermanentlyFailed
///     |    ^                                                    ^
///     |    +--filter failed                                     |
///     +----------------------connect failed---------------------+
/// ```
///
/// An endpoint stays `Unresolved` when its socket connected but the topic
/// filters could not be installed; `add_connection` tries it again.
/// `PermanentlyFailed` is terminal: the endpoint is never retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Unresolved,
    Connected,
    PermanentlyFailed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Unresolved => write!(f, "unresolved"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::PermanentlyFailed => write!(f, "permanently failed"),
        }
    }
}

/// One tracked publisher.
pub(crate) struct Connection {
    pub(crate) endpoint: Endpoint,
    pub(crate) status: ConnectionStatus,
    pub(crate) socket: Option<SubSocket>,
    pub(crate) token: Option<Token>,
}

impl Connection {
    pub(crate) fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            status: ConnectionStatus::Unresolved,
            socket: None,
            token: None,
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected && self.socket.is_some()
    }

    /// Drop the socket and make the failure permanent.
    pub(crate) fn fail(&mut self) {
        self.status = ConnectionStatus::PermanentlyFailed;
        self.socket = None;
        self.token = None;
    }
}
