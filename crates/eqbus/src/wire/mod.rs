// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire framing shared by publisher and subscriber.
//!
//! Every logical message is one or two frames:
//!
//! ```text
//! frame 1: [flags][len = 16][EventType, 16 bytes little-endian]
//! frame 2: [flags][len      ][payload]        (only if frame 1 has MORE)
//! ```
//!
//! The 16 bytes of frame 1 are also the topic filter value, so filtering and
//! dispatch always agree on the key. A message without frame 2 is a body-less
//! marker event, distinct from an explicit zero-length payload.

mod event;
mod frame_codec;

pub use event::{Event, EventType, Serializable, EVENT_TYPE_SIZE};
pub use frame_codec::{
    encode_command, encode_event, encode_frame, Frame, FrameCodec, DEFAULT_MAX_MESSAGE_SIZE,
    FLAG_COMMAND, FLAG_MORE, FRAME_HEADER_SIZE,
};

/// Command byte announcing a new topic filter.
pub const COMMAND_SUBSCRIBE: u8 = 0x01;

/// Command byte retracting a topic filter.
pub const COMMAND_UNSUBSCRIBE: u8 = 0x00;
