//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProbeConfig (validated, immutable)
//!     → ConnectParams for the transport
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, read_config, ConfigError};
pub use validation::validate_config;
pub use schema::{LogFormat, LoggingConfig, ProbeConfig};
