// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event types, event values and the stateful-object contract.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Size of an encoded [`EventType`] (frame 1 body).
pub const EVENT_TYPE_SIZE: usize = 16;

const FNV128_OFFSET_BASIS: u128 = 0x6c62272e07bb014262b821756295c58d;
const FNV128_PRIME: u128 = 0x0000000001000000000000000000013b;

/// 128-bit identifier naming a message schema.
///
/// Doubles as the transport topic filter: the subscriber installs exactly the
/// bytes returned by [`EventType::to_wire`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventType(u128);

impl EventType {
    /// Wrap a raw identifier.
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    /// Stable identifier from a schema name (FNV-1a, 128 bit).
    ///
    /// ```
    /// use eqbus::EventType;
    ///
    /// let a = EventType::from_name("eqbus::vocabulary::Echo");
    /// assert_eq!(a, EventType::from_name("eqbus::vocabulary::Echo"));
    /// ```
    pub fn from_name(name: &str) -> Self {
        let hash = name.bytes().fold(FNV128_OFFSET_BASIS, |hash, byte| {
            (hash ^ u128::from(byte)).wrapping_mul(FNV128_PRIME)
        });
        Self(hash)
    }

    /// Raw 128-bit value.
    pub const fn value(&self) -> u128 {
        self.0
    }

    /// Canonical wire bytes (little-endian on every host).
    pub fn to_wire(&self) -> [u8; EVENT_TYPE_SIZE] {
        self.0.to_le_bytes()
    }

    /// Decode frame 1. Converts from wire order to host order.
    pub fn from_wire(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; EVENT_TYPE_SIZE] = bytes.try_into().map_err(|_| {
            Error::Protocol(format!(
                "event type frame must be {} bytes, got {}",
                EVENT_TYPE_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(u128::from_le_bytes(raw)))
    }
}

impl From<u128> for EventType {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.trim_start_matches("0x");
        u128::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|e| Error::Protocol(format!("invalid event type '{}': {}", s, e)))
    }
}

/// An event as delivered to a callback.
///
/// `data()` is `None` for a body-less marker event and `Some(&[])` for an
/// explicit empty payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    event_type: EventType,
    payload: Option<Vec<u8>>,
}

impl Event {
    /// Body-less marker event.
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            payload: None,
        }
    }

    /// Event carrying a payload (possibly empty).
    pub fn with_payload(event_type: EventType, payload: Vec<u8>) -> Self {
        Self {
            event_type,
            payload: Some(payload),
        }
    }

    /// Event from a stateful object's current state.
    pub fn from_serializable(object: &dyn Serializable) -> Self {
        Self::with_payload(object.type_identifier(), object.to_binary())
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Payload size in bytes (0 for marker events).
    pub fn size(&self) -> usize {
        self.payload.as_ref().map_or(0, Vec::len)
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Take ownership of the payload.
    pub fn into_payload(self) -> Option<Vec<u8>> {
        self.payload
    }
}

/// A stateful object updated in place by the subscriber.
///
/// Delivered payloads are passed to [`from_binary`](Self::from_binary), then
/// [`notify_updated`](Self::notify_updated) is invoked. Marker events skip
/// deserialization and only notify.
pub trait Serializable: Send {
    /// Type identifier this object is published and subscribed under.
    fn type_identifier(&self) -> EventType;

    /// Replace the object's state from payload bytes.
    fn from_binary(&mut self, data: &[u8]) -> Result<()>;

    /// Serialize the current state.
    fn to_binary(&self) -> Vec<u8>;

    /// Called after every delivered update.
    fn notify_updated(&mut self) {}
}
