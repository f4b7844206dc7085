// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Helpers shared by the integration tests.

#![allow(dead_code)]

use eqbus::{Context, Event, EventType, Publisher, PublisherConfig, Subscriber};
use std::net::TcpListener;
use std::time::{Duration, Instant};

/// Upper bound for a delivery to show up on loopback.
pub const DELIVERY_WINDOW: Duration = Duration::from_secs(3);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Random event type, so parallel tests never share a topic.
pub fn random_type() -> EventType {
    EventType::new(fastrand::u128(..))
}

/// Publisher bound on loopback.
pub fn local_publisher(context: &Context, session: &str) -> Publisher {
    Publisher::new(
        context,
        PublisherConfig::default()
            .with_session(session)
            .with_bind("127.0.0.1:0"),
    )
    .expect("bind publisher")
}

/// A loopback port nothing listens on.
pub fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind scratch listener");
    listener.local_addr().expect("scratch addr").port()
}

/// Publish `event` and poll `subscriber` until `done` holds.
pub fn deliver_until(
    publisher: &mut Publisher,
    subscriber: &mut Subscriber,
    event: &Event,
    mut done: impl FnMut() -> bool,
) -> bool {
    let deadline = Instant::now() + DELIVERY_WINDOW;
    while Instant::now() < deadline {
        publisher.publish(event).expect("publish");
        subscriber
            .receive(Duration::from_millis(20))
            .expect("receive");
        if done() {
            return true;
        }
    }
    false
}
