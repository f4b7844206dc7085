// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publish side: a listener plus one filtered outbound stream per subscriber.
//!
//! Filtering happens here. A subscriber only receives events whose type it
//! announced with a subscribe command.

use super::{bind_listener, is_disconnect, READ_CHUNK_SIZE};
use crate::wire::{encode_event, Event, EventType, FrameCodec, COMMAND_SUBSCRIBE, EVENT_TYPE_SIZE};
use std::collections::HashSet;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

/// Bytes queued per peer beyond which new events are dropped for that peer.
pub const PEER_HIGH_WATER_MARK: usize = 8 * 1024 * 1024;

struct Peer {
    stream: TcpStream,
    addr: SocketAddr,
    codec: FrameCodec,
    filters: HashSet<EventType>,
    outbound: Vec<u8>,
}

impl Peer {
    /// Read and apply pending filter commands. Returns false once the peer
    /// is gone or misbehaved.
    fn read_commands(&mut self) -> bool {
        let mut buf = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => return false,
                Ok(n) => self.codec.feed(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    log::debug!("[PubSocket] read from {} failed: {}", self.addr, e);
                    return false;
                }
            }
        }

        loop {
            let frame = match self.codec.decode() {
                Ok(Some(frame)) => frame,
                Ok(None) => return true,
                Err(e) => {
                    log::warn!("[PubSocket] dropping subscriber {}: {}", self.addr, e);
                    return false;
                }
            };
            if !frame.is_command() || frame.data.len() != 1 + EVENT_TYPE_SIZE {
                log::warn!(
                    "[PubSocket] unexpected frame from {} ({} bytes)",
                    self.addr,
                    frame.data.len()
                );
                continue;
            }
            let Ok(event_type) = EventType::from_wire(&frame.data[1..]) else {
                continue;
            };
            if frame.data[0] == COMMAND_SUBSCRIBE {
                self.filters.insert(event_type);
                log::debug!("[PubSocket] {} subscribed to {}", self.addr, event_type);
            } else {
                self.filters.remove(&event_type);
                log::debug!("[PubSocket] {} unsubscribed from {}", self.addr, event_type);
            }
        }
    }

    /// Write queued bytes. Returns false once the peer is gone.
    fn flush(&mut self) -> bool {
        while !self.outbound.is_empty() {
            match self.stream.write(&self.outbound) {
                Ok(0) => return false,
                Ok(n) => {
                    self.outbound.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    if !is_disconnect(&e) {
                        log::debug!("[PubSocket] write to {} failed: {}", self.addr, e);
                    }
                    return false;
                }
            }
        }
        true
    }
}

/// Listening publish socket.
pub struct PubSocket {
    listener: TcpListener,
    local_addr: SocketAddr,
    peers: Vec<Peer>,
    max_message_size: usize,
}

impl PubSocket {
    pub fn bind(addr: SocketAddr, max_message_size: usize) -> io::Result<Self> {
        let listener = bind_listener(addr)?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            peers: Vec::new(),
            max_message_size,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connected subscribers.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Accept pending subscribers and apply their filter commands.
    pub fn poll_peers(&mut self) -> io::Result<()> {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    stream.set_nonblocking(true)?;
                    stream.set_nodelay(true)?;
                    log::debug!("[PubSocket] {} accepted subscriber {}", self.local_addr, addr);
                    self.peers.push(Peer {
                        stream,
                        addr,
                        codec: FrameCodec::new(self.max_message_size),
                        filters: HashSet::new(),
                        outbound: Vec::new(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        self.peers.retain_mut(|peer| {
            let alive = peer.read_commands() && peer.flush();
            if !alive {
                log::debug!("[PubSocket] subscriber {} gone", peer.addr);
            }
            alive
        });
        Ok(())
    }

    /// Send `event` to every subscriber filtering for its type.
    /// Returns the number of subscribers it was queued for.
    pub fn send(&mut self, event: &Event) -> io::Result<usize> {
        if event.size() > self.max_message_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "payload of {} bytes exceeds max message size {}",
                    event.size(),
                    self.max_message_size
                ),
            ));
        }

        self.poll_peers()?;

        let event_type = event.event_type();
        let mut encoded: Option<Vec<u8>> = None;
        let mut sent = 0;

        self.peers.retain_mut(|peer| {
            if !peer.filters.contains(&event_type) {
                return true;
            }
            if peer.outbound.len() >= PEER_HIGH_WATER_MARK {
                log::debug!(
                    "[PubSocket] {} over high water mark, dropping {}",
                    peer.addr,
                    event_type
                );
                return true;
            }
            let bytes = encoded.get_or_insert_with(|| encode_event(event));
            peer.outbound.extend_from_slice(bytes);
            sent += 1;
            peer.flush()
        });

        log::trace!("[PubSocket] {} queued for {} subscriber(s)", event_type, sent);
        Ok(sent)
    }

    /// Subscribers currently filtering for `event_type`.
    pub fn subscribers_of(&self, event_type: EventType) -> usize {
        self.peers
            .iter()
            .filter(|peer| peer.filters.contains(&event_type))
            .count()
    }
}
