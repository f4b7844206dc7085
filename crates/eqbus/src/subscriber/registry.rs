// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Handler registry and dispatch.

use crate::error::{Error, Result};
use crate::wire::{Event, EventType, Serializable};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Callback invoked for every delivered event of one type.
pub type Handler = Box<dyn FnMut(&Event) + Send>;

/// What to do with an event of a registered type.
pub(crate) enum Registration {
    Callback(Handler),
    Stateful(Arc<Mutex<dyn Serializable>>),
}

/// At most one registration per event type.
#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<EventType, Registration>,
}

impl Registry {
    pub(crate) fn contains(&self, event_type: EventType) -> bool {
        self.entries.contains_key(&event_type)
    }

    pub(crate) fn insert(&mut self, event_type: EventType, registration: Registration) {
        self.entries.insert(event_type, registration);
    }

    pub(crate) fn remove(&mut self, event_type: EventType) -> Option<Registration> {
        self.entries.remove(&event_type)
    }

    /// Remove only if `object` is the stateful entry registered for its type.
    pub(crate) fn remove_stateful(
        &mut self,
        event_type: EventType,
        object: &Arc<Mutex<dyn Serializable>>,
    ) -> bool {
        match self.entries.get(&event_type) {
            Some(Registration::Stateful(current)) if Arc::ptr_eq(current, object) => {
                self.entries.remove(&event_type);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn types(&self) -> impl Iterator<Item = EventType> + '_ {
        self.entries.keys().copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Deliver `event` to its registration.
    ///
    /// An unregistered type is a [`Error::ProtocolViolation`] when `strict`,
    /// otherwise it is discarded.
    pub(crate) fn dispatch(&mut self, event: &Event, strict: bool) -> Result<()> {
        let event_type = event.event_type();
        let Some(registration) = self.entries.get_mut(&event_type) else {
            if strict {
                return Err(Error::ProtocolViolation(event_type));
            }
            log::debug!("[Subscriber] discarding unsubscribed event {}", event_type);
            return Ok(());
        };

        match registration {
            Registration::Callback(handler) => handler(event),
            Registration::Stateful(object) => {
                let mut object = object.lock();
                // Notified even when the payload is rejected.
                if let Some(data) = event.data() {
                    if let Err(e) = object.from_binary(data) {
                        log::warn!("[Subscriber] cannot update {}: {}", event_type, e);
                    }
                }
                object.notify_updated();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        value: u32,
        updates: u32,
    }

    impl Serializable for Counter {
        fn type_identifier(&self) -> EventType {
            EventType::new(42)
        }

        fn from_binary(&mut self, data: &[u8]) -> Result<()> {
            let bytes: [u8; 4] = data.try_into().map_err(|_| Error::Deserialize {
                event_type: self.type_identifier(),
                reason: format!("expected 4 bytes, got {}", data.len()),
            })?;
            self.value = u32::from_le_bytes(bytes);
            Ok(())
        }

        fn to_binary(&self) -> Vec<u8> {
            self.value.to_le_bytes().to_vec()
        }

        fn notify_updated(&mut self) {
            self.updates += 1;
        }
    }

    #[test]
    fn test_unregistered_strict_and_lenient() {
        let mut registry = Registry::default();
        let event = Event::new(EventType::new(5));
        assert!(matches!(
            registry.dispatch(&event, true),
            Err(Error::ProtocolViolation(t)) if t == EventType::new(5)
        ));
        assert!(registry.dispatch(&event, false).is_ok());
    }

    #[test]
    fn test_stateful_dispatch() {
        let counter = Arc::new(Mutex::new(Counter {
            value: 0,
            updates: 0,
        }));
        let object: Arc<Mutex<dyn Serializable>> = counter.clone();

        let mut registry = Registry::default();
        registry.insert(EventType::new(42), Registration::Stateful(object.clone()));

        let update = Event::with_payload(EventType::new(42), 7u32.to_le_bytes().to_vec());
        registry.dispatch(&update, true).unwrap();
        assert_eq!(counter.lock().value, 7);
        assert_eq!(counter.lock().updates, 1);

        // Marker: notify without deserializing.
        registry.dispatch(&Event::new(EventType::new(42)), true).unwrap();
        assert_eq!(counter.lock().value, 7);
        assert_eq!(counter.lock().updates, 2);

        // Rejected payload: state kept, still notified.
        let bad = Event::with_payload(EventType::new(42), vec![1]);
        registry.dispatch(&bad, true).unwrap();
        assert_eq!(counter.lock().value, 7);
        assert_eq!(counter.lock().updates, 3);

        assert!(registry.remove_stateful(EventType::new(42), &object));
        assert!(!registry.contains(EventType::new(42)));
    }

    #[test]
    fn test_remove_stateful_requires_same_object() {
        let a: Arc<Mutex<dyn Serializable>> = Arc::new(Mutex::new(Counter {
            value: 0,
            updates: 0,
        }));
        let b: Arc<Mutex<dyn Serializable>> = Arc::new(Mutex::new(Counter {
            value: 0,
            updates: 0,
        }));

        let mut registry = Registry::default();
        registry.insert(EventType::new(42), Registration::Stateful(a));
        assert!(!registry.remove_stateful(EventType::new(42), &b));
        assert_eq!(registry.len(), 1);
    }
}
