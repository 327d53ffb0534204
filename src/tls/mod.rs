//! TLS subsystem.
//!
//! # Data Flow
//! ```text
//! credential store → credentials.rs (trust anchors, client identity)
//!     → rustls_engine.rs (client config, connection over the socket)
//!         → verifier.rs (records verification flags during the handshake)
//! ```
//!
//! # Design Decisions
//! - The engine sits behind the `TlsEngine` trait so the I/O loops can be
//!   driven by scripted engines
//! - Verification failures are recorded rather than raised unless the auth
//!   mode is required; the session decides afterwards
//! - Parsed credentials outlive a handshake, raw file bytes do not

pub mod credentials;
pub mod engine;
pub mod rustls_engine;
pub mod verifier;

pub use credentials::{ClientIdentity, Credential, TrustAnchors};
pub use engine::{EngineError, SessionInfo, TlsEngine};
pub use rustls_engine::{EngineConfig, RustlsEngine};
pub use verifier::{AuthMode, VerifyFlags};
