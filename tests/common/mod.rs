//! Shared utilities for integration testing: in-process TLS and raw TCP peers.

#![allow(dead_code)]

use std::fs;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig, ServerConnection};

use tls_transport::net::{ConnectError, Connector};
use tls_transport::storage::FsCredentialStore;

/// How long a test peer waits on a silent client before giving up.
const PEER_TIMEOUT: Duration = Duration::from_secs(5);

pub fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

pub fn fixture(name: &str) -> Vec<u8> {
    fs::read(fixture_dir().join(name)).unwrap()
}

/// Credential store over `tests/fixtures`.
pub fn fixture_store() -> FsCredentialStore {
    FsCredentialStore::with_root(fixture_dir())
}

fn certs(name: &str) -> Vec<CertificateDer<'static>> {
    rustls_pemfile::certs(&mut fixture(name).as_slice())
        .collect::<Result<_, _>>()
        .unwrap()
}

fn key(name: &str) -> PrivateKeyDer<'static> {
    rustls_pemfile::private_key(&mut fixture(name).as_slice())
        .unwrap()
        .unwrap()
}

/// What the TLS peer does with its one connection.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Sent as soon as the handshake completes.
    pub reply: Vec<u8>,
    /// Demand a client certificate issued by the test CA.
    pub require_client_cert: bool,
}

/// What the TLS peer observed.
#[derive(Debug, Default)]
pub struct ServerReport {
    pub received: Vec<u8>,
    pub client_cert_presented: bool,
    pub handshake_error: Option<String>,
    pub clean_close: bool,
}

pub struct TestServer {
    pub port: u16,
    handle: JoinHandle<ServerReport>,
}

impl TestServer {
    /// Wait for the peer to finish and collect what it saw.
    pub fn finish(self) -> ServerReport {
        self.handle.join().unwrap()
    }
}

fn server_config(options: &ServerOptions) -> Arc<ServerConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .unwrap();

    let builder = if options.require_client_cert {
        let mut roots = RootCertStore::empty();
        roots.add_parsable_certificates(certs("ca.crt"));
        let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
            .build()
            .unwrap();
        builder.with_client_cert_verifier(verifier)
    } else {
        builder.with_no_client_auth()
    };

    Arc::new(
        builder
            .with_single_cert(certs("server.crt"), key("server.key"))
            .unwrap(),
    )
}

/// Accept one TLS connection on 127.0.0.1, send `options.reply`, then record
/// everything the client sends until it closes.
pub fn start_tls_server(options: ServerOptions) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = server_config(&options);

    let handle = thread::spawn(move || {
        let mut report = ServerReport::default();
        let (mut sock, _) = listener.accept().unwrap();
        sock.set_read_timeout(Some(PEER_TIMEOUT)).unwrap();

        let mut conn = ServerConnection::new(config).unwrap();
        while conn.is_handshaking() {
            if let Err(e) = conn.complete_io(&mut sock) {
                report.handshake_error = Some(e.to_string());
                return report;
            }
        }
        report.client_cert_presented = conn.peer_certificates().is_some();

        let mut stream = rustls::Stream::new(&mut conn, &mut sock);
        if !options.reply.is_empty() {
            stream.write_all(&options.reply).unwrap();
            stream.flush().unwrap();
        }

        let mut buf = [0u8; 1024];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => {
                    report.clean_close = true;
                    break;
                }
                Ok(n) => report.received.extend_from_slice(&buf[..n]),
                Err(_) => break,
            }
        }
        report
    });

    TestServer { port, handle }
}

/// Accept one connection and answer with `bytes` that are not TLS.
pub fn start_garbage_server(bytes: &'static [u8]) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        if let Ok((mut sock, _)) = listener.accept() {
            let mut hello = [0u8; 512];
            let _ = sock.read(&mut hello);
            let _ = sock.write_all(bytes);
        }
    });
    port
}

/// Accept one connection and never answer. Returns the port and a handle
/// that completes once the client hangs up or the peer times out.
pub fn start_silent_server() -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        if let Ok((mut sock, _)) = listener.accept() {
            sock.set_read_timeout(Some(PEER_TIMEOUT)).unwrap();
            let mut sink = [0u8; 1024];
            while matches!(sock.read(&mut sink), Ok(n) if n > 0) {}
        }
    });
    (port, handle)
}

/// A port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Connector that reaches 127.0.0.1:`port` whatever host it is asked for.
pub struct LoopbackConnector(pub u16);

impl Connector for LoopbackConnector {
    type Stream = TcpStream;

    fn connect(
        &mut self,
        _host: &str,
        _port: u16,
        timeout: Option<Duration>,
    ) -> Result<TcpStream, ConnectError> {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.0));
        let stream = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        stream.map_err(ConnectError::Connect)
    }
}

/// Connector whose socket allocation always fails.
pub struct ExhaustedConnector;

impl Connector for ExhaustedConnector {
    type Stream = TcpStream;

    fn connect(
        &mut self,
        _host: &str,
        _port: u16,
        _timeout: Option<Duration>,
    ) -> Result<TcpStream, ConnectError> {
        Err(ConnectError::Create(io::Error::new(
            io::ErrorKind::OutOfMemory,
            "no socket buffers available",
        )))
    }
}
