//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ConnectParams (params.rs)
//!     → transport.rs (TlsTransport: the session and its connect sequence)
//!     → socket.rs (resolve + TCP connect)
//!     → handshake.rs (drive handshake, apply verification policy)
//!     → io.rs (timed read/write loops once Ready)
//!
//! Session States (connection.rs):
//!     Uninitialized → SocketConnecting → SocketConnected → EngineConfigured
//!     → Handshaking → Verified | VerificationSkipped → Ready
//!     (any step) → Failed
//! ```
//!
//! # Design Decisions
//! - One thread per session, blocking sockets, deadlines polled between calls
//! - Setup errors end the session; I/O errors are per call
//! - The socket and engine are collaborators behind traits for fault injection

pub mod connection;
pub mod handshake;
pub mod io;
pub mod params;
pub mod socket;
pub mod transport;

pub use connection::{SessionId, SessionState};
pub use params::ConnectParams;
pub use socket::{ConnectError, Connector, Socket, TcpConnector};
pub use transport::{ConnectionStatus, TlsTransport, Transport, TransportBuilder};
