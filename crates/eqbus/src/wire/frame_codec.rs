// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Flagged length-prefix framing for messages over TCP.
//!
//! TCP is a stream protocol without message boundaries. Each frame carries a
//! flag byte and a length:
//!
//! ```text
//! +-----------+----------------+-------------------+
//! | Flags (1B)| Length (4B BE) | Frame body        |
//! +-----------+----------------+-------------------+
//! ```
//!
//! - `FLAG_MORE` (0x01): another frame of the same message follows
//! - `FLAG_COMMAND` (0x02): subscriber -> publisher control frame
//!
//! The codec accumulates bytes read from a non-blocking socket and hands out
//! complete frames.

use super::event::Event;
use super::{COMMAND_SUBSCRIBE, COMMAND_UNSUBSCRIBE};
use crate::wire::EventType;
use std::io;

/// Frame header size (flag byte + 4 bytes for length).
pub const FRAME_HEADER_SIZE: usize = 5;

/// Default maximum frame size (16 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Another frame of the same message follows.
pub const FLAG_MORE: u8 = 0x01;

/// Control frame (topic filter update).
pub const FLAG_COMMAND: u8 = 0x02;

/// One decoded frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub flags: u8,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn more(&self) -> bool {
        self.flags & FLAG_MORE != 0
    }

    pub fn is_command(&self) -> bool {
        self.flags & FLAG_COMMAND != 0
    }
}

/// Frame codec with an accumulation buffer.
#[derive(Debug)]
pub struct FrameCodec {
    /// Bytes received but not yet decoded
    accumulator: Vec<u8>,

    /// Read position in accumulator
    accumulator_pos: usize,

    /// Maximum allowed frame size (anti-OOM protection)
    max_size: usize,

    /// Statistics: frames decoded
    frames_decoded: u64,

    /// Statistics: frames too large (rejected)
    frames_rejected: u64,
}

impl FrameCodec {
    /// Create a new frame codec with the specified max frame size.
    pub fn new(max_size: usize) -> Self {
        Self {
            accumulator: Vec::with_capacity(16384),
            accumulator_pos: 0,
            max_size,
            frames_decoded: 0,
            frames_rejected: 0,
        }
    }

    /// Create a codec with default max size (16 MB).
    pub fn with_default_max() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    pub fn frames_rejected(&self) -> u64 {
        self.frames_rejected
    }

    /// Feed raw bytes read from the socket.
    pub fn feed(&mut self, data: &[u8]) {
        // Compact once more than half of the buffer has been consumed
        if self.accumulator_pos > 0 && self.accumulator_pos > self.accumulator.len() / 2 {
            self.accumulator.drain(..self.accumulator_pos);
            self.accumulator_pos = 0;
        }
        self.accumulator.extend_from_slice(data);
    }

    /// True if undecoded bytes are waiting.
    pub fn has_buffered_data(&self) -> bool {
        self.accumulator_pos < self.accumulator.len()
    }

    /// Try to decode one complete frame from the accumulator.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - A complete frame was decoded
    /// - `Ok(None)` - Need more data
    /// - `Err(e)` - Frame exceeds the maximum size; the stream is unusable
    pub fn decode(&mut self) -> io::Result<Option<Frame>> {
        let available = &self.accumulator[self.accumulator_pos..];
        if available.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let flags = available[0];
        let len = u32::from_be_bytes([available[1], available[2], available[3], available[4]])
            as usize;

        if len > self.max_size {
            self.frames_rejected += 1;
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame too large: {} bytes (max {})", len, self.max_size),
            ));
        }

        let total = FRAME_HEADER_SIZE + len;
        if available.len() < total {
            return Ok(None);
        }

        let data = available[FRAME_HEADER_SIZE..total].to_vec();
        self.accumulator_pos += total;
        self.frames_decoded += 1;

        if self.accumulator_pos == self.accumulator.len() {
            self.accumulator.clear();
            self.accumulator_pos = 0;
        }

        Ok(Some(Frame { flags, data }))
    }
}

/// Append one frame: `[flags][length: u32 BE][body]`.
pub fn encode_frame(flags: u8, body: &[u8], buf: &mut Vec<u8>) {
    buf.push(flags);
    buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
    buf.extend_from_slice(body);
}

/// Encode a full event: frame 1 (type) and, if present, frame 2 (payload).
pub fn encode_event(event: &Event) -> Vec<u8> {
    let wire = event.event_type().to_wire();
    let mut buf = Vec::with_capacity(2 * FRAME_HEADER_SIZE + wire.len() + event.size());
    match event.data() {
        Some(payload) => {
            encode_frame(FLAG_MORE, &wire, &mut buf);
            encode_frame(0, payload, &mut buf);
        }
        None => encode_frame(0, &wire, &mut buf),
    }
    buf
}

/// Encode a topic filter update sent from subscriber to publisher.
pub fn encode_command(subscribe: bool, event_type: EventType) -> Vec<u8> {
    let mut body = Vec::with_capacity(1 + super::EVENT_TYPE_SIZE);
    body.push(if subscribe {
        COMMAND_SUBSCRIBE
    } else {
        COMMAND_UNSUBSCRIBE
    });
    body.extend_from_slice(&event_type.to_wire());

    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + body.len());
    encode_frame(FLAG_COMMAND, &body, &mut buf);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame_layout() {
        let mut buf = Vec::new();
        encode_frame(FLAG_MORE, b"abc", &mut buf);
        assert_eq!(buf, vec![FLAG_MORE, 0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_decode_partial_feed() {
        let mut encoded = Vec::new();
        encode_frame(0, b"hello", &mut encoded);

        let mut codec = FrameCodec::with_default_max();
        codec.feed(&encoded[..3]);
        assert_eq!(codec.decode().unwrap(), None);
        assert!(codec.has_buffered_data());

        codec.feed(&encoded[3..]);
        let frame = codec.decode().unwrap().unwrap();
        assert_eq!(frame.data, b"hello");
        assert!(!frame.more());
        assert!(!codec.has_buffered_data());
        assert_eq!(codec.frames_decoded(), 1);
    }

    #[test]
    fn test_event_with_payload_is_two_frames() {
        let event = Event::with_payload(EventType::new(42), vec![9, 9]);
        let mut codec = FrameCodec::with_default_max();
        codec.feed(&encode_event(&event));

        let head = codec.decode().unwrap().unwrap();
        assert!(head.more());
        assert_eq!(EventType::from_wire(&head.data).unwrap(), EventType::new(42));

        let body = codec.decode().unwrap().unwrap();
        assert!(!body.more());
        assert_eq!(body.data, vec![9, 9]);
        assert_eq!(codec.decode().unwrap(), None);
    }

    #[test]
    fn test_marker_and_empty_payload_encode_differently() {
        let event_type = EventType::new(1);
        let marker = encode_event(&Event::new(event_type));
        let empty = encode_event(&Event::with_payload(event_type, Vec::new()));

        assert_eq!(marker.len(), FRAME_HEADER_SIZE + 16);
        assert_eq!(empty.len(), 2 * FRAME_HEADER_SIZE + 16);
        assert_eq!(marker[0] & FLAG_MORE, 0);
        assert_eq!(empty[0] & FLAG_MORE, FLAG_MORE);
    }

    #[test]
    fn test_command_frame() {
        let mut codec = FrameCodec::with_default_max();
        codec.feed(&encode_command(true, EventType::new(5)));
        let frame = codec.decode().unwrap().unwrap();
        assert!(frame.is_command());
        assert_eq!(frame.data[0], COMMAND_SUBSCRIBE);
        assert_eq!(EventType::from_wire(&frame.data[1..]).unwrap(), EventType::new(5));
    }

    #[test]
    fn test_frame_too_large_rejected() {
        let mut codec = FrameCodec::new(4);
        let mut buf = Vec::new();
        encode_frame(0, b"too long", &mut buf);
        codec.feed(&buf);
        assert!(codec.decode().is_err());
        assert_eq!(codec.frames_rejected(), 1);
    }
}
