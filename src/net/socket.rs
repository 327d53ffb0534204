//! TCP socket collaborator.
//!
//! # Responsibilities
//! - Resolve the destination host
//! - Open a TCP connection, trying each resolved address in turn
//! - Report socket creation, resolution and connect failures separately
//!
//! The TLS engine drives whatever [`Socket`] the [`Connector`] returns, so
//! tests can substitute an in-memory stream or a failing connector.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;

use crate::error::SetupError;

/// Byte stream the TLS engine runs over.
pub trait Socket: Read + Write + Send {
    /// Put the socket into blocking mode.
    fn set_blocking(&mut self) -> io::Result<()>;

    /// Bound how long a single read may block. `None` blocks indefinitely.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
}

impl Socket for TcpStream {
    fn set_blocking(&mut self) -> io::Result<()> {
        self.set_nonblocking(false)
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }
}

/// Failure to open a transport connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("socket could not be created: {0}")]
    Create(#[source] io::Error),

    #[error("host {0} did not resolve")]
    Resolve(String),

    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),
}

impl From<ConnectError> for SetupError {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::Create(e) => SetupError::SocketCreate(e.to_string()),
            ConnectError::Resolve(host) => SetupError::HostResolution(host),
            ConnectError::Connect(e) => SetupError::SocketConnect(e.to_string()),
        }
    }
}

/// Opens transport connections.
pub trait Connector {
    type Stream: Socket;

    fn connect(
        &mut self,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<Self::Stream, ConnectError>;
}

/// Connector backed by `std::net::TcpStream`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl TcpConnector {
    pub fn new() -> Self {
        Self
    }
}

/// Errors that mean no socket could be allocated, as opposed to a peer or
/// route failure.
fn is_creation_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::OutOfMemory | io::ErrorKind::Unsupported
    )
}

fn open(addr: &SocketAddr, timeout: Option<Duration>) -> io::Result<TcpStream> {
    match timeout {
        Some(timeout) => TcpStream::connect_timeout(addr, timeout),
        None => TcpStream::connect(addr),
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(
        &mut self,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<TcpStream, ConnectError> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| {
                tracing::debug!(host, error = %e, "Resolution failed");
                ConnectError::Resolve(host.to_string())
            })?
            .collect();

        if addrs.is_empty() {
            return Err(ConnectError::Resolve(host.to_string()));
        }

        let mut last_error = None;
        for addr in &addrs {
            tracing::debug!(address = %addr, "Connecting");
            match open(addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) if is_creation_error(&e) => return Err(ConnectError::Create(e)),
                Err(e) => {
                    tracing::debug!(address = %addr, error = %e, "Address refused connection");
                    last_error = Some(e);
                }
            }
        }

        Err(ConnectError::Connect(last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "no address accepted the connection")
        })))
    }
}
