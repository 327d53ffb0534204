//! Blocking TLS client transport for device messaging clients.

// Collaborators
pub mod entropy;
pub mod storage;
pub mod timer;

// Core subsystems
pub mod error;
pub mod net;
pub mod tls;

// Cross-cutting concerns
pub mod config;
pub mod observability;
pub mod resilience;

pub use error::{ErrorPhase, IoError, SetupError, TransportError, TransportResult};
pub use net::{ConnectParams, ConnectionStatus, SessionState, TlsTransport, Transport};
pub use timer::{Countdown, Timer};
pub use tls::VerifyFlags;
