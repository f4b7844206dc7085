// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Broker rendezvous and connection service.

mod common;

use common::{dead_port, deliver_until, init_logging, local_publisher, random_type};
use eqbus::connection::{derive_port, AddressTable};
use eqbus::{
    BindSpec, Broker, ConnectionService, ConnectionStatus, Context, Endpoint, Error, Event,
    PortSelection, ServiceConfig, Subscribable, Subscriber, SubscriberConfig,
};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

fn unique_name(prefix: &str) -> String {
    format!("{}-{:016x}", prefix, fastrand::u64(..))
}

fn quick_service() -> ConnectionService {
    ConnectionService::new(ServiceConfig::default().with_timeout(Duration::from_millis(300)))
        .unwrap()
}

/// Run `broker` on its own thread until `context` shuts down.
fn spawn_broker(mut broker: Broker) -> JoinHandle<()> {
    thread::spawn(move || broker.run().expect("broker loop"))
}

#[test]
fn test_service_subscribes_through_broker() {
    init_logging();
    let broker_ctx = Context::new();
    let mut publisher = local_publisher(&broker_ctx, "brokered");
    let broker = Broker::new(
        &broker_ctx,
        BindSpec::Address("127.0.0.1:0".into()),
        &publisher,
        PortSelection::Fixed,
    )
    .unwrap();
    assert_eq!(broker.table().endpoints(), &[publisher.endpoint().clone()]);
    let address = broker.address().to_string();
    let server = spawn_broker(broker);

    let sub_ctx = Context::new();
    let mut sub = Subscriber::new(&sub_ctx, SubscriberConfig::default()).unwrap();
    let t = random_type();
    let (tx, rx) = mpsc::channel();
    sub.register_handler(t, move |event: &Event| {
        let _ = tx.send(event.clone());
    })
    .unwrap();

    assert!(ConnectionService::default().subscribe(&address, &mut sub));
    assert_eq!(
        sub.connection_status(publisher.endpoint()),
        Some(ConnectionStatus::Connected)
    );
    assert!(deliver_until(&mut publisher, &mut sub, &Event::new(t), || {
        rx.try_recv().is_ok()
    }));

    broker_ctx.shutdown();
    server.join().unwrap();
}

#[test]
fn test_query_returns_owner_endpoints() {
    let ctx = Context::new();
    let owners = [
        Endpoint::new("127.0.0.1", 4100),
        Endpoint::new("127.0.0.1", 4101),
    ];
    let broker = Broker::new(
        &ctx,
        BindSpec::Address("127.0.0.1:0".into()),
        &owners[..],
        PortSelection::Fixed,
    )
    .unwrap();
    let address = broker.address().to_string();
    let server = spawn_broker(broker);

    let endpoints = ConnectionService::default().query(&address, None).unwrap();
    assert_eq!(endpoints, owners);

    ctx.shutdown();
    server.join().unwrap();
}

#[test]
fn test_service_accepts_unbounded_timeout() {
    let ctx = Context::new();
    let owner = Endpoint::new("127.0.0.1", 4150);
    let broker = Broker::new(
        &ctx,
        BindSpec::Address("127.0.0.1:0".into()),
        &owner,
        PortSelection::Fixed,
    )
    .unwrap();
    let address = broker.address().to_string();
    let server = spawn_broker(broker);

    let service =
        ConnectionService::new(ServiceConfig::default().with_timeout(Duration::MAX)).unwrap();
    assert_eq!(service.query(&address, None).unwrap(), vec![owner]);

    ctx.shutdown();
    server.join().unwrap();
}

#[test]
fn test_named_broker_port_policies() {
    let ctx = Context::new();
    let owner = Endpoint::new("127.0.0.1", 4200);
    let name = unique_name("policy");

    let first = Broker::new(&ctx, BindSpec::Named(name.clone()), &owner, PortSelection::Fixed)
        .unwrap();
    assert_eq!(first.address().port(), derive_port(&name));
    assert_eq!(first.table().name(), Some(name.as_str()));

    let second = Broker::new(&ctx, BindSpec::Named(name.clone()), &owner, PortSelection::Fixed);
    assert!(matches!(second, Err(Error::BrokerBind { .. })));

    let third = Broker::new(
        &ctx,
        BindSpec::Named(name.clone()),
        &owner,
        PortSelection::FixedOrRandom,
    )
    .unwrap();
    assert_ne!(third.address().port(), first.address().port());
}

#[test]
fn test_subscribe_named() {
    let broker_ctx = Context::new();
    let mut publisher = local_publisher(&broker_ctx, "named");
    let name = unique_name("named");
    let broker = Broker::new(
        &broker_ctx,
        BindSpec::Named(name.clone()),
        &publisher,
        PortSelection::Fixed,
    )
    .unwrap();
    let server = spawn_broker(broker);

    let sub_ctx = Context::new();
    let mut sub = Subscriber::new(&sub_ctx, SubscriberConfig::default()).unwrap();
    let t = random_type();
    let (tx, rx) = mpsc::channel();
    sub.register_handler(t, move |event: &Event| {
        let _ = tx.send(event.clone());
    })
    .unwrap();

    let service = ConnectionService::default();
    assert!(service.subscribe_named("127.0.0.1", &name, &mut sub));
    assert!(deliver_until(&mut publisher, &mut sub, &Event::new(t), || {
        rx.try_recv().is_ok()
    }));

    // Wrong name on an explicit address: the broker refuses.
    let address = format!("127.0.0.1:{}", derive_port(&name));
    assert!(matches!(
        service.query(&address, Some("someone-else")),
        Err(Error::Protocol(_))
    ));

    broker_ctx.shutdown();
    server.join().unwrap();
}

#[test]
fn test_invalid_broker_address() {
    let ctx = Context::new();
    let owner = Endpoint::new("127.0.0.1", 4300);
    for policy in [PortSelection::Fixed, PortSelection::FixedOrRandom] {
        let err = Broker::new(&ctx, BindSpec::Address("invalidIP".into()), &owner, policy)
            .unwrap_err();
        assert!(err.is_config(), "{:?}: {}", policy, err);
    }
}

#[test]
fn test_subscriber_without_connections_cannot_own_broker() {
    let ctx = Context::new();
    let sub = Subscriber::new(&ctx, SubscriberConfig::default()).unwrap();
    assert!(sub.subscribable_endpoints().is_empty());

    let err = Broker::new(
        &ctx,
        BindSpec::Address("127.0.0.1:0".into()),
        &sub,
        PortSelection::Fixed,
    )
    .unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_subscriber_owned_broker_hands_out_connections() {
    let ctx = Context::new();
    let publisher = local_publisher(&ctx, "relay");
    let mut sub = Subscriber::new(&ctx, SubscriberConfig::default()).unwrap();
    assert!(sub.add_connection(publisher.endpoint()).unwrap());

    let broker = Broker::new(
        &ctx,
        BindSpec::Address("127.0.0.1:0".into()),
        &sub,
        PortSelection::Fixed,
    )
    .unwrap();
    let expected: &AddressTable = broker.table();
    assert_eq!(expected.endpoints(), &[publisher.endpoint().clone()]);
}

#[test]
fn test_unreachable_broker_returns_false() {
    let ctx = Context::new();
    let mut sub = Subscriber::new(&ctx, SubscriberConfig::default()).unwrap();

    let start = Instant::now();
    let address = format!("127.0.0.1:{}", dead_port());
    assert!(!quick_service().subscribe(&address, &mut sub));
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(sub.connections().count(), 0);
}

#[test]
fn test_silent_broker_times_out() {
    // Completes the TCP handshake in the kernel but never answers.
    let silent = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = silent.local_addr().unwrap().to_string();

    let ctx = Context::new();
    let mut sub = Subscriber::new(&ctx, SubscriberConfig::default()).unwrap();

    let start = Instant::now();
    assert!(!quick_service().subscribe(&address, &mut sub));
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(250), "gave up after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(2), "gave up after {:?}", elapsed);

    assert!(matches!(
        quick_service().query(&address, None),
        Err(Error::Timeout)
    ));
}

#[test]
fn test_broker_receive_is_bounded() {
    let ctx = Context::new();
    let owner = Endpoint::new("127.0.0.1", 4400);
    let mut broker = Broker::new(
        &ctx,
        BindSpec::Address("127.0.0.1:0".into()),
        &owner,
        PortSelection::Fixed,
    )
    .unwrap();

    let start = Instant::now();
    assert!(!broker.receive(Duration::from_millis(50)).unwrap());
    assert!(start.elapsed() < Duration::from_secs(2));
}
