//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! transport, credentials, engine
//!     → tracing events (structured fields)
//!     → `tls_session` span per connect (session id, host, port)
//!
//! Consumer:
//!     → logging.rs subscriber (stdout, compact or pretty)
//! ```
//!
//! # Design Decisions
//! - Library code only emits events; binaries install the subscriber
//! - Session ID flows through every event of a connect via the span

pub mod logging;

pub use logging::init_logging;
