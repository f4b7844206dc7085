// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP transport.
//!
//! ```text
//!   Publisher                          Subscriber
//!  +-----------+   event frames      +-----------+
//!  | PubSocket | ------------------> | SubSocket |--+
//!  +-----------+ <------------------ +-----------+  |   +--------+
//!                 command frames                    +-->| Poller |
//!   Broker                             Service          +--------+
//!  +-------------+  length-prefixed  +---------+        (mio::Poll)
//!  | ReplySocket | <---------------> | request |
//!  +-------------+       JSON        +---------+
//! ```
//!
//! Subscriber sockets are non-blocking mio streams registered on a
//! [`Poller`]. Publisher sockets are plain non-blocking std sockets serviced
//! whenever the publisher sends.

mod poller;
mod pub_socket;
mod reqrep;
mod sub_socket;

pub use poller::{Poller, SharedReceiver};
pub use pub_socket::PubSocket;
pub use reqrep::{request, ReplySocket, REQUEST_HEADER_SIZE};
pub use sub_socket::SubSocket;

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::time::{Duration, Instant};

/// Listen backlog for publisher and broker sockets.
pub const LISTEN_BACKLOG: i32 = 128;

/// Read chunk size for non-blocking sockets.
pub(crate) const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Horizon used when a timeout reaches past what `Instant` can represent.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Point in time `timeout` from now.
///
/// Timeouts such as `Duration::MAX` are clamped instead of overflowing, so
/// they behave as "wait indefinitely".
pub fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Bind a non-blocking TCP listener on `addr`.
pub fn bind_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    // SO_REUSEADDR lets a restarted process rebind through TIME_WAIT. It does
    // not allow two live listeners on one port on unix.
    #[cfg(unix)]
    socket.set_reuse_address(true)?;

    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    let listener: TcpListener = socket.into();
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// Host other processes should use to reach a socket bound on `addr`.
///
/// Unspecified addresses are replaced by the primary local IP, falling back
/// to loopback when none can be determined.
pub fn advertised_host(addr: &SocketAddr) -> IpAddr {
    if !addr.ip().is_unspecified() {
        return addr.ip();
    }
    match local_ip_address::local_ip() {
        Ok(ip) => ip,
        Err(e) => {
            log::debug!("[Transport] no local IP ({}), advertising loopback", e);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

/// True when `err` means the peer is gone rather than a local failure.
pub(crate) fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}
