//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! handshake step / write / close-notify
//!     → retry.rs (repeat while "would block", stop on fatal error or deadline)
//! ```
//!
//! # Design Decisions
//! - One retry shape shared by every engine loop
//! - Deadlines are polled between attempts, never preemptive
//! - Retry immediately: the socket's own timeouts pace the loop

pub mod retry;

pub use retry::{retry, Deadline, Retry};
