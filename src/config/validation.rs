//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the credential set is coherent (cert and key come together)
//! - Validate value ranges (port and I/O deadline non-zero)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProbeConfig → Result<(), Vec<ValidationError>>

use std::fmt;

use crate::config::schema::ProbeConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ProbeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.endpoint.host.trim().is_empty() {
        errors.push(ValidationError::new("endpoint.host", "must not be empty"));
    }
    if config.endpoint.port == 0 {
        errors.push(ValidationError::new("endpoint.port", "must be non-zero"));
    }

    let creds = &config.credentials;
    match (&creds.device_cert, &creds.device_key) {
        (Some(_), None) => errors.push(ValidationError::new(
            "credentials.device_key",
            "required when device_cert is set",
        )),
        (None, Some(_)) => errors.push(ValidationError::new(
            "credentials.device_cert",
            "required when device_key is set",
        )),
        _ => {}
    }

    if config.security.verify_server && creds.root_ca.is_none() {
        errors.push(ValidationError::new(
            "security.verify_server",
            "requires credentials.root_ca; without it verification is disabled",
        ));
    }

    if config.timeouts.io_ms == 0 {
        errors.push(ValidationError::new("timeouts.io_ms", "must be non-zero"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
