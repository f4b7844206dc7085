// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One-shot request/reply over TCP.
//!
//! ```text
//! +----------------+-------------------+
//! | Length (4B BE) | Body              |
//! +----------------+-------------------+
//! ```
//!
//! A client connects, sends one request, reads one reply and disconnects.
//! Every step on both sides is bounded by a timeout.

use super::{bind_listener, deadline_after};
use mio::net::{TcpListener, TcpStream};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Request/reply header size (4 bytes for length).
pub const REQUEST_HEADER_SIZE: usize = 4;

/// Send `body` to `addr` and wait for the reply, all within `timeout`.
///
/// Running out of time yields `ErrorKind::TimedOut`.
pub fn request(
    addr: SocketAddr,
    body: &[u8],
    timeout: Duration,
    max_size: usize,
) -> io::Result<Vec<u8>> {
    let deadline = deadline_after(timeout);

    let mut stream = std::net::TcpStream::connect_timeout(&addr, remaining(deadline)?)
        .map_err(timed_out_on_would_block)?;
    stream.set_nodelay(true)?;

    stream.set_write_timeout(Some(remaining(deadline)?))?;
    let mut message = Vec::with_capacity(REQUEST_HEADER_SIZE + body.len());
    message.extend_from_slice(&(body.len() as u32).to_be_bytes());
    message.extend_from_slice(body);
    stream
        .write_all(&message)
        .map_err(timed_out_on_would_block)?;

    read_message(&mut stream, deadline, max_size)
}

/// Read one length-prefixed message before `deadline`.
fn read_message(
    stream: &mut std::net::TcpStream,
    deadline: Instant,
    max_size: usize,
) -> io::Result<Vec<u8>> {
    let mut header = [0u8; REQUEST_HEADER_SIZE];
    read_full(stream, &mut header, deadline)?;

    let len = u32::from_be_bytes(header) as usize;
    if len > max_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message too large: {} bytes (max {})", len, max_size),
        ));
    }

    let mut body = vec![0u8; len];
    read_full(stream, &mut body, deadline)?;
    Ok(body)
}

fn read_full(stream: &mut std::net::TcpStream, buf: &mut [u8], deadline: Instant) -> io::Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        stream.set_read_timeout(Some(remaining(deadline)?))?;
        match stream.read(&mut buf[filled..]) {
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(timed_out_on_would_block(e)),
        }
    }
    Ok(())
}

fn remaining(deadline: Instant) -> io::Result<Duration> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        Err(io::ErrorKind::TimedOut.into())
    } else {
        Ok(left)
    }
}

// Socket timeouts surface as WouldBlock on unix and TimedOut on windows.
fn timed_out_on_would_block(e: io::Error) -> io::Error {
    if e.kind() == io::ErrorKind::WouldBlock {
        io::ErrorKind::TimedOut.into()
    } else {
        e
    }
}

/// Listening reply socket, registered on a [`Poller`](super::Poller).
#[derive(Debug)]
pub struct ReplySocket {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl ReplySocket {
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::from_std(bind_listener(addr)?);
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn source(&mut self) -> &mut TcpListener {
        &mut self.listener
    }

    /// Answer every request waiting in the accept queue.
    ///
    /// Each client gets at most `io_timeout` to deliver its request. Failed
    /// exchanges are logged and do not stop the loop. Returns the number of
    /// requests answered.
    pub fn serve_pending<F>(
        &mut self,
        io_timeout: Duration,
        max_size: usize,
        mut handler: F,
    ) -> io::Result<usize>
    where
        F: FnMut(&[u8]) -> Vec<u8>,
    {
        let mut served = 0;
        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            match answer(stream, io_timeout, max_size, &mut handler) {
                Ok(()) => served += 1,
                Err(e) => log::warn!("[ReplySocket] request from {} failed: {}", peer, e),
            }
        }
        Ok(served)
    }
}

fn answer<F>(stream: TcpStream, io_timeout: Duration, max_size: usize, handler: &mut F) -> io::Result<()>
where
    F: FnMut(&[u8]) -> Vec<u8>,
{
    let mut stream = std::net::TcpStream::from(stream);
    stream.set_nonblocking(false)?;
    let deadline = deadline_after(io_timeout);

    let request = read_message(&mut stream, deadline, max_size)?;
    let reply = handler(&request);

    stream.set_write_timeout(Some(remaining(deadline)?))?;
    let mut message = Vec::with_capacity(REQUEST_HEADER_SIZE + reply.len());
    message.extend_from_slice(&(reply.len() as u32).to_be_bytes());
    message.extend_from_slice(&reply);
    stream
        .write_all(&message)
        .map_err(timed_out_on_would_block)
}
