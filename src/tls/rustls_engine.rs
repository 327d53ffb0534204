//! [`TlsEngine`] backed by a rustls client connection over a blocking socket.
//!
//! The connection's randomness comes from the session DRBG lent to the
//! calling thread (see [`crate::entropy`]); every call into this engine is
//! expected to run inside an `ActiveDrbg` scope.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use rustls::client::Resumption;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore};

use crate::entropy::SESSION_RANDOM;
use crate::error::SetupError;
use crate::net::socket::Socket;
use crate::tls::credentials::ClientIdentity;
use crate::tls::engine::{EngineError, SessionInfo, TlsEngine};
use crate::tls::verifier::{AuthMode, FlagCell, RecordingVerifier, VerifyFlags};

/// Inputs for building a client engine.
pub struct EngineConfig<'a> {
    /// Host name sent as SNI and matched against the server certificate.
    pub server_name: &'a str,
    pub auth_mode: AuthMode,
    pub roots: Option<Arc<RootCertStore>>,
    pub identity: Option<&'a ClientIdentity>,
    /// Socket read timeout while handshaking. `None` blocks indefinitely.
    pub handshake_timeout: Option<Duration>,
}

/// The ring provider with its random source replaced by the session DRBG.
fn session_provider() -> Arc<CryptoProvider> {
    Arc::new(CryptoProvider {
        secure_random: &SESSION_RANDOM,
        ..rustls::crypto::ring::default_provider()
    })
}

fn setup_error(context: &str, err: impl std::fmt::Display) -> SetupError {
    SetupError::SslConnection(format!("{context}: {err}"))
}

fn tls_failure(err: rustls::Error) -> EngineError {
    match &err {
        rustls::Error::InvalidCertificate(_) => EngineError::CertificateVerifyFailed(err.to_string()),
        _ => EngineError::Fatal(err.to_string()),
    }
}

fn would_block(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

pub struct RustlsEngine<S> {
    conn: ClientConnection,
    socket: S,
    flags: FlagCell,
    close_sent: bool,
}

impl<S: Socket> RustlsEngine<S> {
    /// Build the client configuration and bind a fresh connection to `socket`.
    ///
    /// Session resumption is disabled and no ALPN protocols are offered.
    pub fn configure(mut socket: S, config: &EngineConfig<'_>) -> Result<Self, SetupError> {
        let provider = session_provider();
        let flags = FlagCell::default();

        let verifier = RecordingVerifier::new(
            config.roots.clone(),
            config.auth_mode,
            flags.clone(),
            Arc::clone(&provider),
        )
        .map_err(|e| setup_error("verifier setup failed", e))?;

        let builder = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| setup_error("protocol setup failed", e))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier));

        let mut tls_config = match config.identity {
            Some(identity) => {
                let (chain, key) = identity.clone_parts();
                builder
                    .with_client_auth_cert(chain, key)
                    .map_err(|e| setup_error("client certificate rejected", e))?
            }
            None => builder.with_no_client_auth(),
        };
        tls_config.resumption = Resumption::disabled();

        let server_name = ServerName::try_from(config.server_name.to_string())
            .map_err(|e| setup_error("invalid server name", e))?;

        socket
            .set_read_timeout(config.handshake_timeout)
            .map_err(|e| setup_error("could not set handshake timeout", e))?;

        let conn = ClientConnection::new(Arc::new(tls_config), server_name)
            .map_err(|e| setup_error("engine setup failed", e))?;

        Ok(Self {
            conn,
            socket,
            flags,
            close_sent: false,
        })
    }

    /// Push pending records to the socket.
    fn flush(&mut self) -> Result<(), EngineError> {
        while self.conn.wants_write() {
            match self.conn.write_tls(&mut self.socket) {
                Ok(_) => {}
                Err(e) if would_block(&e) => return Err(EngineError::WantWrite),
                Err(e) => return Err(EngineError::Fatal(e.to_string())),
            }
        }
        Ok(())
    }

    /// Read one batch of records from the socket and process them.
    fn fill(&mut self) -> Result<(), EngineError> {
        match self.conn.read_tls(&mut self.socket) {
            Ok(0) => return Err(EngineError::Closed),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Err(EngineError::WantRead),
            Err(e) if would_block(&e) => return Err(EngineError::Timeout),
            Err(e) => return Err(EngineError::Fatal(e.to_string())),
        }

        if let Err(e) = self.conn.process_new_packets() {
            // Best effort: deliver the alert rustls queued for the peer.
            let _ = self.flush();
            return Err(tls_failure(e));
        }
        Ok(())
    }

    /// `None` when no plaintext is buffered yet.
    fn take_plaintext(&mut self, buf: &mut [u8]) -> Option<Result<usize, EngineError>> {
        match self.conn.reader().read(buf) {
            Ok(n) => Some(Ok(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => Some(Err(EngineError::Fatal(e.to_string()))),
        }
    }
}

impl<S: Socket> TlsEngine for RustlsEngine<S> {
    fn handshake(&mut self) -> Result<(), EngineError> {
        self.flush()?;
        if !self.conn.is_handshaking() {
            return Ok(());
        }

        self.fill()?;
        self.flush()?;
        if self.conn.is_handshaking() {
            Err(EngineError::WantRead)
        } else {
            Ok(())
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, EngineError> {
        self.flush()?;

        let accepted = self
            .conn
            .writer()
            .write(buf)
            .map_err(|e| EngineError::Fatal(e.to_string()))?;
        if accepted == 0 && !buf.is_empty() {
            return Err(EngineError::WantWrite);
        }

        match self.flush() {
            Ok(()) | Err(EngineError::WantWrite) => Ok(accepted),
            Err(e) => Err(e),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, EngineError> {
        if let Some(result) = self.take_plaintext(buf) {
            return result;
        }

        self.fill()?;
        match self.flush() {
            Ok(()) | Err(EngineError::WantWrite) => {}
            Err(e) => return Err(e),
        }

        self.take_plaintext(buf).unwrap_or(Err(EngineError::WantRead))
    }

    fn close_notify(&mut self) -> Result<(), EngineError> {
        if !self.close_sent {
            self.conn.send_close_notify();
            self.close_sent = true;
        }
        self.flush()
    }

    fn verify_result(&self) -> VerifyFlags {
        self.flags.get()
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), EngineError> {
        self.socket
            .set_read_timeout(timeout)
            .map_err(|e| EngineError::Fatal(e.to_string()))
    }

    fn session_info(&self) -> Option<SessionInfo> {
        let protocol = self.conn.protocol_version()?;
        let suite = self.conn.negotiated_cipher_suite()?;
        Some(SessionInfo {
            protocol: format!("{protocol:?}"),
            cipher_suite: format!("{:?}", suite.suite()),
            peer_chain_len: self.conn.peer_certificates().map_or(0, |chain| chain.len()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Socket that never yields data and swallows writes.
    struct Silent;

    impl Read for Silent {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::WouldBlock))
        }
    }

    impl Write for Silent {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Socket for Silent {
        fn set_blocking(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }
    }

    fn config(name: &str) -> EngineConfig<'_> {
        EngineConfig {
            server_name: name,
            auth_mode: AuthMode::Optional,
            roots: None,
            identity: None,
            handshake_timeout: Some(Duration::from_millis(50)),
        }
    }

    #[test]
    fn invalid_server_name_is_a_setup_error() {
        let err = RustlsEngine::configure(Silent, &config("not a host name!")).err();
        assert!(matches!(err, Some(SetupError::SslConnection(_))));
    }

    #[test]
    fn silent_peer_times_out_the_handshake() {
        let mut engine = RustlsEngine::configure(Silent, &config("localhost")).unwrap();
        assert_eq!(engine.handshake(), Err(EngineError::Timeout));
        assert!(engine.verify_result().is_empty());
        assert!(engine.session_info().is_none());
    }
}
