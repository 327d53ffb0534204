//! End-to-end session tests against an in-process TLS peer.

use tls_transport::{
    ConnectParams, ConnectionStatus, Countdown, IoError, SessionState, SetupError, TlsTransport,
    Transport, TransportError, VerifyFlags,
};

mod common;

use common::{start_tls_server, ServerOptions};

fn open_session(params: ConnectParams) -> TlsTransport {
    TlsTransport::builder(params)
        .credential_store(common::fixture_store())
        .build()
}

fn anonymous(port: u16) -> TlsTransport {
    open_session(ConnectParams::new("127.0.0.1", port).with_server_verification(false))
}

fn replying(reply: &[u8]) -> ServerOptions {
    ServerOptions {
        reply: reply.to_vec(),
        ..ServerOptions::default()
    }
}

#[test]
fn test_connect_walks_every_state() {
    let server = start_tls_server(ServerOptions::default());
    let mut session = anonymous(server.port);

    session.connect(None).unwrap();

    assert_eq!(
        session.state_trail(),
        &[
            SessionState::Uninitialized,
            SessionState::SocketConnecting,
            SessionState::SocketConnected,
            SessionState::EngineConfigured,
            SessionState::Handshaking,
            SessionState::VerificationSkipped,
            SessionState::Ready,
        ]
    );
    assert_eq!(session.is_connected(), Ok(ConnectionStatus::PhysicalLayerConnected));
    assert!(session.session_info().is_some());

    session.disconnect().unwrap();
    session.destroy().unwrap();
    assert!(server.finish().clean_close);
}

#[test]
fn test_write_ping() {
    let server = start_tls_server(ServerOptions::default());
    let mut session = anonymous(server.port);
    session.connect(None).unwrap();

    let timer = Countdown::from_millis(5_000);
    assert_eq!(session.write(b"PING", &timer), Ok(4));
    assert_eq!(session.write(b"", &timer), Ok(0));

    session.disconnect().unwrap();
    session.destroy().unwrap();
    assert_eq!(server.finish().received, b"PING");
}

#[test]
fn test_large_write_arrives_in_order() {
    let server = start_tls_server(ServerOptions::default());
    let mut session = anonymous(server.port);
    session.connect(None).unwrap();

    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let timer = Countdown::from_millis(10_000);
    assert_eq!(session.write(&payload, &timer), Ok(payload.len()));

    session.disconnect().unwrap();
    session.destroy().unwrap();
    assert_eq!(server.finish().received, payload);
}

#[test]
fn test_read_exact() {
    let server = start_tls_server(replying(b"PONG"));
    let mut session = anonymous(server.port);
    session.connect(None).unwrap();

    let mut buf = [0u8; 4];
    assert_eq!(session.read(&mut buf, &Countdown::from_millis(2_000)), Ok(4));
    assert_eq!(&buf, b"PONG");

    session.disconnect().unwrap();
    session.destroy().unwrap();
    server.finish();
}

#[test]
fn test_read_partial_times_out() {
    let server = start_tls_server(replying(b"PO"));
    let mut session = anonymous(server.port);
    session.connect(None).unwrap();

    let mut buf = [0u8; 4];
    let err = session
        .read(&mut buf, &Countdown::from_millis(500))
        .unwrap_err();
    assert_eq!(err, TransportError::Io(IoError::SslReadTimeout { read: 2 }));
    assert!(err.is_retryable());
    assert_eq!(&buf[..2], b"PO");

    session.disconnect().unwrap();
    session.destroy().unwrap();
    server.finish();
}

#[test]
fn test_read_nothing() {
    let server = start_tls_server(ServerOptions::default());
    let mut session = anonymous(server.port);
    session.connect(None).unwrap();

    let mut buf = [0u8; 4];
    assert_eq!(
        session.read(&mut buf, &Countdown::from_millis(200)),
        Err(TransportError::Io(IoError::NothingToRead))
    );

    // A timed-out read leaves the session usable.
    assert_eq!(session.write(b"still here", &Countdown::from_millis(2_000)), Ok(10));

    session.disconnect().unwrap();
    session.destroy().unwrap();
    assert_eq!(server.finish().received, b"still here");
}

#[test]
fn test_read_after_peer_close_fails() {
    let server = start_tls_server(ServerOptions::default());
    let port = server.port;
    let mut session = anonymous(port);
    session.connect(None).unwrap();

    // Closing our side makes the peer's read end and its socket drop.
    session.disconnect().unwrap();
    server.finish();

    let mut buf = [0u8; 4];
    let err = session
        .read(&mut buf, &Countdown::from_millis(2_000))
        .unwrap_err();
    assert!(matches!(err, TransportError::Io(IoError::SslRead { read: 0 })));
    session.destroy().unwrap();
}

#[test]
fn test_verified_session() {
    let server = start_tls_server(replying(b"ok"));
    let mut session = open_session(
        ConnectParams::new("127.0.0.1", server.port)
            .with_root_ca("ca.crt")
            .with_server_verification(true),
    );

    session.connect(None).unwrap();
    assert!(session.state_trail().contains(&SessionState::Verified));
    assert!(session.verify_flags().is_empty());

    session.disconnect().unwrap();
    session.destroy().unwrap();
    server.finish();
}

#[test]
fn test_untrusted_server_accepted_without_verification() {
    let server = start_tls_server(ServerOptions::default());
    let mut session = open_session(
        ConnectParams::new("127.0.0.1", server.port)
            .with_root_ca("rogue_ca.crt")
            .with_server_verification(false),
    );

    session.connect(None).unwrap();
    assert_eq!(session.state(), &SessionState::Ready);
    assert!(session.verify_flags().contains(VerifyFlags::NOT_TRUSTED));

    session.disconnect().unwrap();
    session.destroy().unwrap();
    server.finish();
}

#[test]
fn test_destroy_clears_verify_flags() {
    let server = start_tls_server(ServerOptions::default());
    let mut session = open_session(
        ConnectParams::new("127.0.0.1", server.port)
            .with_root_ca("rogue_ca.crt")
            .with_server_verification(false),
    );

    session.connect(None).unwrap();
    assert!(!session.verify_flags().is_empty());

    session.disconnect().unwrap();
    session.destroy().unwrap();
    assert!(session.verify_flags().is_empty());
    server.finish();
}

#[test]
fn test_verification_forced_off_without_root_ca() {
    let server = start_tls_server(ServerOptions::default());
    let mut session = open_session(
        ConnectParams::new("127.0.0.1", server.port).with_server_verification(true),
    );
    assert!(!session.params().verify_server());

    session.connect(None).unwrap();
    assert!(session
        .state_trail()
        .contains(&SessionState::VerificationSkipped));

    session.disconnect().unwrap();
    session.destroy().unwrap();
    server.finish();
}

#[test]
fn test_mutual_tls() {
    let server = start_tls_server(ServerOptions {
        reply: b"hi".to_vec(),
        require_client_cert: true,
    });
    let mut session = open_session(
        ConnectParams::new("127.0.0.1", server.port)
            .with_root_ca("ca.crt")
            .with_device_identity("client.crt", "client.key"),
    );

    session.connect(None).unwrap();
    let mut buf = [0u8; 2];
    assert_eq!(session.read(&mut buf, &Countdown::from_millis(2_000)), Ok(2));
    assert_eq!(&buf, b"hi");

    session.disconnect().unwrap();
    session.destroy().unwrap();
    assert!(server.finish().client_cert_presented);
}

#[test]
fn test_mismatched_identity_is_rejected() {
    let server = start_tls_server(ServerOptions {
        reply: b"hi".to_vec(),
        require_client_cert: true,
    });
    let mut session = open_session(
        ConnectParams::new("127.0.0.1", server.port)
            .with_root_ca("ca.crt")
            .with_device_identity("client.crt", "server.key"),
    );

    match session.connect(None) {
        Err(TransportError::Setup(SetupError::SslConnection(_))) => {}
        // The client's final flight carries its identity; the peer may only
        // reject it once the client already considers the handshake done.
        Ok(()) => {
            let mut buf = [0u8; 2];
            let err = session
                .read(&mut buf, &Countdown::from_millis(2_000))
                .unwrap_err();
            assert!(matches!(err, TransportError::Io(IoError::SslRead { .. })));
        }
        Err(other) => panic!("unexpected error: {other}"),
    }

    session.destroy().unwrap();
    assert!(!server.finish().client_cert_presented);
}

#[test]
fn test_connect_overrides_params() {
    let server = start_tls_server(ServerOptions::default());
    let mut session = anonymous(common::closed_port());

    session
        .connect(Some(
            ConnectParams::new("127.0.0.1", server.port).with_server_verification(false),
        ))
        .unwrap();
    assert_eq!(session.params().port(), server.port);

    session.disconnect().unwrap();
    session.destroy().unwrap();
    server.finish();
}

#[test]
fn test_reconnect_drops_previous_identity() {
    let first = start_tls_server(ServerOptions {
        reply: Vec::new(),
        require_client_cert: true,
    });
    let mut session = open_session(
        ConnectParams::new("127.0.0.1", first.port)
            .with_root_ca("ca.crt")
            .with_device_identity("client.crt", "client.key"),
    );
    session.connect(None).unwrap();
    session.disconnect().unwrap();
    assert!(first.finish().client_cert_presented);

    let second = start_tls_server(ServerOptions {
        reply: b"hi".to_vec(),
        require_client_cert: true,
    });
    let anonymous_params =
        ConnectParams::new("127.0.0.1", second.port).with_server_verification(false);
    match session.connect(Some(anonymous_params)) {
        Err(TransportError::Setup(SetupError::SslConnection(_))) => {}
        // The peer may only reject the missing certificate after the client
        // has finished its side of the handshake.
        Ok(()) => {
            let mut buf = [0u8; 2];
            let err = session
                .read(&mut buf, &Countdown::from_millis(2_000))
                .unwrap_err();
            assert!(matches!(err, TransportError::Io(IoError::SslRead { .. })));
        }
        Err(other) => panic!("unexpected error: {other}"),
    }

    session.destroy().unwrap();
    let report = second.finish();
    assert!(!report.client_cert_presented);
    assert!(report.handshake_error.is_some());
}

#[test]
fn test_failed_reconnect_does_not_reuse_old_session() {
    let server = start_tls_server(ServerOptions::default());
    let mut session = anonymous(server.port);
    session.connect(None).unwrap();

    let err = session
        .connect(Some(
            ConnectParams::new("127.0.0.1", common::closed_port())
                .with_server_verification(false),
        ))
        .unwrap_err();
    assert!(matches!(
        err,
        TransportError::Setup(SetupError::SocketConnect(_))
    ));
    assert!(matches!(session.state(), SessionState::Failed(_)));
    assert!(session.session_info().is_none());

    assert_eq!(
        session.write(b"STALE", &Countdown::from_millis(500)),
        Err(TransportError::NullArgument)
    );
    let mut buf = [0u8; 4];
    assert_eq!(
        session.read(&mut buf, &Countdown::from_millis(100)),
        Err(TransportError::NullArgument)
    );

    session.destroy().unwrap();
    assert!(server.finish().received.is_empty());
}

#[test]
fn test_destroy_is_idempotent() {
    let server = start_tls_server(ServerOptions::default());
    let mut session = anonymous(server.port);
    session.connect(None).unwrap();

    assert_eq!(session.destroy(), Ok(()));
    assert_eq!(session.destroy(), Ok(()));
    assert_eq!(session.state(), &SessionState::Uninitialized);
    assert!(session.session_info().is_none());
    assert_eq!(
        session.write(b"PING", &Countdown::from_millis(100)),
        Err(TransportError::NullArgument)
    );
    server.finish();

    let mut never_connected = TlsTransport::init(ConnectParams::new("127.0.0.1", 8883));
    assert_eq!(never_connected.destroy(), Ok(()));
    assert_eq!(never_connected.destroy(), Ok(()));
}

#[test]
fn test_disconnect_is_best_effort() {
    let server = start_tls_server(ServerOptions::default());
    let mut session = anonymous(server.port);
    session.connect(None).unwrap();

    assert_eq!(session.disconnect(), Ok(()));
    server.finish();
    // The peer is gone; a second close still reports success.
    assert_eq!(session.disconnect(), Ok(()));
    session.destroy().unwrap();
}
