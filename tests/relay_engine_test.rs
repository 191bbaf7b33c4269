//! Dial and resolve failure classification tests for the relay engine.

use std::net::Ipv4Addr;

use socksd::protocol::{SocksError, TargetAddr};
use socksd::relay::RelayEngine;
use socksd::Config;
use tokio::net::TcpListener;

/// A localhost port with nothing listening on it.
async fn refused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn refused_dial_is_connection_refused() {
    let engine = RelayEngine::from_config(&Config::default());
    let port = refused_port().await;

    let err = engine
        .connect_to_target(&TargetAddr::Ipv4(Ipv4Addr::LOCALHOST), port)
        .await
        .unwrap_err();
    assert!(matches!(err, SocksError::ConnectionRefused));
    assert_eq!(err.reply_code(), Some(0x05));
}

#[tokio::test]
async fn unresolvable_domain_is_network_unreachable() {
    let engine = RelayEngine::from_config(&Config::default());

    // RFC 2606 reserves .invalid; resolution can never succeed.
    let err = engine
        .connect_to_target(&TargetAddr::Domain("no-such-host.invalid".into()), 80)
        .await
        .unwrap_err();
    assert!(matches!(err, SocksError::NetworkUnreachable));
    assert_eq!(err.reply_code(), Some(0x03));
}

#[tokio::test]
async fn successful_dial_reports_ipv4_local_endpoint() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let engine = RelayEngine::from_config(&Config::default());
    let (stream, bound) = engine
        .connect_to_target(&TargetAddr::Ipv4(Ipv4Addr::LOCALHOST), addr.port())
        .await
        .unwrap();

    assert_eq!(*bound.ip(), Ipv4Addr::LOCALHOST);
    assert_ne!(bound.port(), 0);
    drop(stream);
}

#[tokio::test]
async fn domain_resolution_prefers_ipv4() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let engine = RelayEngine::from_config(&Config::default());
    let (stream, bound) = engine
        .connect_to_target(&TargetAddr::Domain("localhost".into()), addr.port())
        .await
        .unwrap();

    assert_eq!(*bound.ip(), Ipv4Addr::LOCALHOST);
    drop(stream);
}
