// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery-driven connections and session filtering.

mod common;

use common::{dead_port, deliver_until, init_logging, local_publisher, random_type};
use eqbus::discovery::{LocalDirectory, Metadata, NullDiscovery, KEY_SESSION, PUBLISHER_SERVICE};
use eqbus::{
    ConnectionStatus, Context, Endpoint, Event, Subscriber, SubscriberConfig, NULL_SESSION,
};
use std::sync::mpsc;

/// Two contexts on one directory behave like two processes on one network.
fn two_processes() -> (LocalDirectory, Context, Context) {
    let directory = LocalDirectory::new();
    let publishers = Context::builder().discovery(directory.clone()).build();
    let subscribers = Context::builder().discovery(directory.clone()).build();
    (directory, publishers, subscribers)
}

fn instance_key(endpoint: &Endpoint) -> String {
    format!("{}:{}", endpoint.host(), endpoint.port())
}

#[test]
fn test_session_filtering() {
    init_logging();
    let (directory, pub_ctx, sub_ctx) = two_processes();

    let same = local_publisher(&pub_ctx, "A");
    let different = local_publisher(&pub_ctx, "B");

    // Publisher that did not announce, advertised by hand without a session.
    let anonymous = local_publisher(&pub_ctx, NULL_SESSION);
    directory.insert(
        PUBLISHER_SERVICE,
        &instance_key(anonymous.endpoint()),
        Metadata::new(),
    );

    // Empty session value counts as no session.
    let blank = local_publisher(&pub_ctx, NULL_SESSION);
    let mut blank_meta = Metadata::new();
    blank_meta.insert(KEY_SESSION.to_string(), String::new());
    directory.insert(PUBLISHER_SERVICE, &instance_key(blank.endpoint()), blank_meta);

    let sub = Subscriber::new(&sub_ctx, SubscriberConfig::default().with_session("A")).unwrap();
    assert_eq!(sub.session(), "A");

    assert_eq!(
        sub.connection_status(same.endpoint()),
        Some(ConnectionStatus::Connected)
    );
    assert_eq!(sub.connection_status(different.endpoint()), None);
    assert_eq!(
        sub.connection_status(anonymous.endpoint()),
        Some(ConnectionStatus::Connected)
    );
    assert_eq!(
        sub.connection_status(blank.endpoint()),
        Some(ConnectionStatus::Connected)
    );
}

#[test]
fn test_own_publishers_are_skipped() {
    let ctx = Context::new();
    let publisher = local_publisher(&ctx, "self");
    let sub = Subscriber::new(&ctx, SubscriberConfig::default().with_session("self")).unwrap();

    assert_eq!(sub.connection_status(publisher.endpoint()), None);
    assert_eq!(sub.connections().count(), 0);
}

#[test]
fn test_late_publisher_found_by_update() {
    let (_directory, pub_ctx, sub_ctx) = two_processes();
    let mut sub =
        Subscriber::new(&sub_ctx, SubscriberConfig::default().with_session("late")).unwrap();
    assert_eq!(sub.connections().count(), 0);

    let mut publisher = local_publisher(&pub_ctx, "late");
    sub.update().unwrap();
    assert_eq!(
        sub.connection_status(publisher.endpoint()),
        Some(ConnectionStatus::Connected)
    );

    let t = random_type();
    let (tx, rx) = mpsc::channel();
    sub.register_handler(t, move |event: &Event| {
        let _ = tx.send(event.clone());
    })
    .unwrap();
    assert!(deliver_until(
        &mut publisher,
        &mut sub,
        &Event::with_payload(t, b"found".to_vec()),
        || rx.try_recv().is_ok()
    ));
}

#[test]
fn test_stale_record_fails_once() {
    let (directory, _pub_ctx, sub_ctx) = two_processes();
    let stale = format!("127.0.0.1:{}", dead_port());
    directory.insert(PUBLISHER_SERVICE, &stale, Metadata::new());
    directory.insert(PUBLISHER_SERVICE, "not an endpoint", Metadata::new());

    let mut sub =
        Subscriber::new(&sub_ctx, SubscriberConfig::default().with_session("stale")).unwrap();
    let endpoint: Endpoint = stale.parse().unwrap();
    assert_eq!(
        sub.connection_status(&endpoint),
        Some(ConnectionStatus::PermanentlyFailed)
    );

    sub.update().unwrap();
    assert_eq!(sub.connections().count(), 1);
    assert_eq!(
        sub.connection_status(&endpoint),
        Some(ConnectionStatus::PermanentlyFailed)
    );
}

#[test]
fn test_withdrawn_publisher_is_not_discovered() {
    let (_directory, pub_ctx, sub_ctx) = two_processes();
    let publisher = local_publisher(&pub_ctx, "withdrawn");
    let endpoint = publisher.endpoint().clone();
    drop(publisher);

    let sub =
        Subscriber::new(&sub_ctx, SubscriberConfig::default().with_session("withdrawn")).unwrap();
    assert_eq!(sub.connection_status(&endpoint), None);
}

#[test]
fn test_unavailable_discovery() {
    let ctx = Context::builder().discovery(NullDiscovery).build();
    assert!(Subscriber::new(&ctx, SubscriberConfig::default())
        .unwrap_err()
        .is_config());

    // A partial endpoint still selects discovery mode.
    let partial = SubscriberConfig::default().with_endpoint(Endpoint::new("127.0.0.1", 0));
    assert!(Subscriber::new(&ctx, partial).unwrap_err().is_config());

    // A full endpoint does not need discovery.
    let publisher = local_publisher(&ctx, "null");
    let direct = SubscriberConfig::default().with_endpoint(publisher.endpoint().clone());
    assert!(Subscriber::new(&ctx, direct).is_ok());
}

#[test]
fn test_invalid_subscriber_sessions() {
    let ctx = Context::new();
    for session in ["", NULL_SESSION] {
        let err = Subscriber::new(&ctx, SubscriberConfig::default().with_session(session))
            .unwrap_err();
        assert!(err.is_config(), "session {:?}", session);
    }
}
