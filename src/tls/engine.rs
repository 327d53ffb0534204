//! The TLS engine seam.
//!
//! A [`TlsEngine`] owns the record layer and the socket beneath it. Every
//! call performs at most one unit of progress and reports "would block" as
//! [`EngineError::WantRead`] / [`EngineError::WantWrite`], which callers
//! retry.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::tls::verifier::VerifyFlags;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine needs more data from the peer")]
    WantRead,

    #[error("engine needs to flush data to the peer")]
    WantWrite,

    /// The socket read timeout elapsed with nothing received.
    #[error("read timed out")]
    Timeout,

    #[error("certificate verification failed: {0}")]
    CertificateVerifyFailed(String),

    /// The peer closed the transport without a close notification.
    #[error("connection closed by peer")]
    Closed,

    #[error("{0}")]
    Fatal(String),
}

impl EngineError {
    pub fn is_would_block(&self) -> bool {
        matches!(self, EngineError::WantRead | EngineError::WantWrite)
    }
}

/// Negotiated session parameters, for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub protocol: String,
    pub cipher_suite: String,
    pub peer_chain_len: usize,
}

impl fmt::Display for SessionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({} peer certificates)",
            self.protocol, self.cipher_suite, self.peer_chain_len
        )
    }
}

pub trait TlsEngine {
    /// Drive the handshake one step. `Ok(())` once it has completed.
    fn handshake(&mut self) -> Result<(), EngineError>;

    /// Encrypt and send part of `buf`, returning how many plaintext bytes
    /// were accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize, EngineError>;

    /// Read decrypted bytes into `buf`. `Ok(0)` means the peer closed the
    /// session.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, EngineError>;

    /// Queue and flush a close notification.
    fn close_notify(&mut self) -> Result<(), EngineError>;

    /// Outcome of peer verification from the last handshake.
    fn verify_result(&self) -> VerifyFlags;

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), EngineError>;

    fn session_info(&self) -> Option<SessionInfo>;
}
