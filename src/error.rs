//! Transport error taxonomy.
//!
//! Errors are split by the phase that produced them so callers can decide
//! recovery policy by pattern matching:
//!
//! ```text
//! TransportError
//!     ├── Setup(SetupError)   connect-time, session is unusable → destroy + reconnect
//!     ├── Io(IoError)         per read/write call, timeouts are retryable
//!     └── NullArgument        no live session to operate on
//! ```

use thiserror::Error;

use crate::tls::credentials::Credential;

/// Failures raised while establishing a session.
///
/// None of these are recoverable for the session that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    /// Seeding the random generator from the entropy source failed.
    #[error("entropy source failed: {0}")]
    EntropySource(String),

    /// The credential store could not produce the requested material.
    #[error("could not read {credential} from {path:?}")]
    CertRead { credential: Credential, path: String },

    /// The root CA material held no usable certificate.
    #[error("root CA parse error: {0}")]
    RootCertParse(String),

    /// The device certificate could not be parsed.
    #[error("device certificate parse error: {0}")]
    DeviceCertParse(String),

    /// The device private key could not be parsed.
    #[error("private key parse error: {0}")]
    PrivateKeyParse(String),

    /// The TCP socket could not be created.
    #[error("socket creation failed: {0}")]
    SocketCreate(String),

    /// The destination host did not resolve.
    #[error("could not resolve host {0}")]
    HostResolution(String),

    /// The TCP connection was refused or otherwise failed.
    #[error("TCP connect failed: {0}")]
    SocketConnect(String),

    /// Engine configuration, handshake, or peer verification failed.
    #[error("TLS connection error: {0}")]
    SslConnection(String),
}

/// Failures raised by a single read or write call.
///
/// Every variant carries the number of bytes moved before the call stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IoError {
    /// The engine reported a fatal send error.
    #[error("TLS write failed after {written} bytes")]
    SslWrite { written: usize },

    /// The deadline expired before every byte was sent.
    #[error("TLS write timed out after {written} bytes")]
    SslWriteTimeout { written: usize },

    /// The peer closed the connection or the engine reported a fatal receive error.
    #[error("TLS read failed after {read} bytes")]
    SslRead { read: usize },

    /// The deadline expired with part of the request filled.
    #[error("TLS read timed out after {read} bytes")]
    SslReadTimeout { read: usize },

    /// The deadline expired before any byte arrived.
    #[error("nothing to read")]
    NothingToRead,
}

impl IoError {
    /// Bytes transferred before the call stopped.
    pub fn transferred(&self) -> usize {
        match *self {
            IoError::SslWrite { written } | IoError::SslWriteTimeout { written } => written,
            IoError::SslRead { read } | IoError::SslReadTimeout { read } => read,
            IoError::NothingToRead => 0,
        }
    }

    /// Whether the session should be considered broken after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IoError::SslWrite { .. } | IoError::SslRead { .. })
    }
}

/// Phase an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPhase {
    /// Caller misuse: the operation had nothing to act on.
    Argument,
    /// Session establishment.
    Setup,
    /// Steady-state I/O.
    Io,
}

/// Error returned by every public transport operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The operation needs a live session and there is none.
    #[error("session handle is absent")]
    NullArgument,

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Io(#[from] IoError),
}

impl TransportError {
    pub fn phase(&self) -> ErrorPhase {
        match self {
            TransportError::NullArgument => ErrorPhase::Argument,
            TransportError::Setup(_) => ErrorPhase::Setup,
            TransportError::Io(_) => ErrorPhase::Io,
        }
    }

    /// True for errors after which the same call may simply be repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Io(
                IoError::SslWriteTimeout { .. }
                    | IoError::SslReadTimeout { .. }
                    | IoError::NothingToRead
            )
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_tagged() {
        let setup: TransportError = SetupError::HostResolution("nowhere".into()).into();
        assert_eq!(setup.phase(), ErrorPhase::Setup);
        assert!(!setup.is_retryable());

        let io: TransportError = IoError::SslReadTimeout { read: 3 }.into();
        assert_eq!(io.phase(), ErrorPhase::Io);
        assert!(io.is_retryable());

        assert_eq!(TransportError::NullArgument.phase(), ErrorPhase::Argument);
    }

    #[test]
    fn fatal_io_errors_are_not_retryable() {
        let err: TransportError = IoError::SslWrite { written: 2 }.into();
        assert!(!err.is_retryable());
        assert!(IoError::SslRead { read: 0 }.is_fatal());
        assert!(!IoError::NothingToRead.is_fatal());
    }

    #[test]
    fn partial_counts_survive() {
        assert_eq!(IoError::SslWriteTimeout { written: 7 }.transferred(), 7);
        assert_eq!(IoError::SslReadTimeout { read: 4 }.transferred(), 4);
        assert_eq!(IoError::NothingToRead.transferred(), 0);
    }

    #[test]
    fn display_names_the_credential() {
        let err = SetupError::CertRead {
            credential: Credential::RootCa,
            path: "certs/root.pem".into(),
        };
        assert!(err.to_string().contains("root CA"));
    }
}
