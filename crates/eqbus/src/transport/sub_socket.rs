// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscribe side of a publisher connection.
//!
//! A `SubSocket` owns one non-blocking TCP stream to a publisher. It sends
//! topic filter commands and reassembles two-frame messages from the byte
//! stream. Readiness is driven externally by a [`Poller`](super::Poller).

use super::{is_disconnect, READ_CHUNK_SIZE};
use crate::endpoint::Endpoint;
use crate::wire::{encode_command, Event, EventType, Frame, FrameCodec};
use mio::net::TcpStream;
use std::collections::HashSet;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::Duration;

/// Smallest connect timeout handed to the OS.
const MIN_CONNECT_TIMEOUT: Duration = Duration::from_millis(1);

/// Frame 1 seen, frame 2 still expected.
#[derive(Debug)]
enum Partial {
    Payload(EventType),
    Discard,
}

/// Non-blocking subscriber connection.
#[derive(Debug)]
pub struct SubSocket {
    stream: TcpStream,
    peer: Endpoint,
    codec: FrameCodec,
    filters: HashSet<EventType>,
    outbound: Vec<u8>,
    partial: Option<Partial>,
    closed: bool,
    #[cfg(test)]
    write_fault: Option<io::ErrorKind>,
}

impl SubSocket {
    /// Connect to `peer`, trying each resolved address within `timeout`.
    pub fn connect(peer: &Endpoint, timeout: Duration, max_message_size: usize) -> io::Result<Self> {
        let addrs = peer.socket_addrs()?;
        let timeout = timeout.max(MIN_CONNECT_TIMEOUT);

        let mut last_err = None;
        for addr in addrs {
            match connect_one(addr, timeout) {
                Ok(stream) => {
                    log::trace!("[SubSocket] connected to {} via {}", peer, addr);
                    return Ok(Self {
                        stream,
                        peer: peer.clone(),
                        codec: FrameCodec::new(max_message_size),
                        filters: HashSet::new(),
                        outbound: Vec::new(),
                        partial: None,
                        closed: false,
                        #[cfg(test)]
                        write_fault: None,
                    });
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{} resolved to no address", peer),
            )
        }))
    }

    pub fn peer(&self) -> &Endpoint {
        &self.peer
    }

    pub fn source(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Peer closed the stream or reset it.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn has_filter(&self, event_type: EventType) -> bool {
        self.filters.contains(&event_type)
    }

    /// Install a topic filter. Returns false if it was already installed.
    ///
    /// On error the filter is not installed.
    pub fn subscribe(&mut self, event_type: EventType) -> io::Result<bool> {
        if !self.filters.insert(event_type) {
            return Ok(false);
        }
        self.outbound.extend(encode_command(true, event_type));
        if let Err(e) = self.flush() {
            self.filters.remove(&event_type);
            return Err(e);
        }
        Ok(true)
    }

    /// Retract a topic filter. Returns false if it was not installed.
    pub fn unsubscribe(&mut self, event_type: EventType) -> io::Result<bool> {
        if !self.filters.remove(&event_type) {
            return Ok(false);
        }
        self.outbound.extend(encode_command(false, event_type));
        self.flush()?;
        Ok(true)
    }

    /// Make every later write fail with `kind`.
    #[cfg(test)]
    pub(crate) fn fail_writes(&mut self, kind: io::ErrorKind) {
        self.write_fault = Some(kind);
    }

    /// Write queued commands. A vanished peer marks the socket closed.
    pub fn flush(&mut self) -> io::Result<()> {
        #[cfg(test)]
        if let Some(kind) = self.write_fault {
            if !self.outbound.is_empty() {
                self.outbound.clear();
                return Err(io::Error::from(kind));
            }
        }

        while !self.outbound.is_empty() {
            match self.stream.write(&self.outbound) {
                Ok(0) => {
                    self.closed = true;
                    break;
                }
                Ok(n) => {
                    self.outbound.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if is_disconnect(&e) => {
                    self.closed = true;
                    self.outbound.clear();
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Read everything currently available. Returns the number of bytes read.
    pub fn fill(&mut self) -> io::Result<usize> {
        self.flush()?;
        if self.closed {
            return Ok(0);
        }

        let mut buf = [0u8; READ_CHUNK_SIZE];
        let mut total = 0;
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    self.closed = true;
                    break;
                }
                Ok(n) => {
                    self.codec.feed(&buf[..n]);
                    total += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if is_disconnect(&e) => {
                    self.closed = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    /// True if undecoded bytes are buffered.
    pub fn has_buffered(&self) -> bool {
        self.codec.has_buffered_data()
    }

    /// Next complete logical message from the buffered bytes.
    ///
    /// Messages whose type has no installed filter are dropped, as are
    /// malformed type frames, each along with its payload.
    /// Oversized frames are an `InvalidData` error; the stream is unusable
    /// afterwards.
    pub fn next_message(&mut self) -> io::Result<Option<Event>> {
        loop {
            let Some(frame) = self.codec.decode()? else {
                return Ok(None);
            };

            match self.partial.take() {
                Some(Partial::Payload(event_type)) => {
                    return Ok(Some(Event::with_payload(event_type, frame.data)));
                }
                Some(Partial::Discard) => continue,
                None => {}
            }

            if let Some(event) = self.first_frame(frame) {
                return Ok(Some(event));
            }
        }
    }

    fn first_frame(&mut self, frame: Frame) -> Option<Event> {
        if frame.is_command() {
            log::debug!("[SubSocket] ignoring command frame from {}", self.peer);
            return None;
        }

        match EventType::from_wire(&frame.data) {
            Ok(event_type) if !self.filters.contains(&event_type) => {
                log::trace!("[SubSocket] {} not subscribed, dropped", event_type);
                if frame.more() {
                    self.partial = Some(Partial::Discard);
                }
                None
            }
            Ok(event_type) if frame.more() => {
                self.partial = Some(Partial::Payload(event_type));
                None
            }
            Ok(event_type) => Some(Event::new(event_type)),
            Err(e) => {
                log::warn!("[SubSocket] dropping message from {}: {}", self.peer, e);
                if frame.more() {
                    self.partial = Some(Partial::Discard);
                }
                None
            }
        }
    }
}

fn connect_one(addr: SocketAddr, timeout: Duration) -> io::Result<TcpStream> {
    let stream = std::net::TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_nodelay(true)?;
    stream.set_nonblocking(true)?;
    Ok(TcpStream::from_std(stream))
}
