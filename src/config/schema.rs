//! Configuration schema definitions.
//!
//! This module defines the configuration structure for the `tls-probe`
//! binary. All types derive Serde traits for deserialization from config
//! files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::net::params::{ConnectParams, DEFAULT_TIMEOUT_MS};

/// Root configuration for the probe.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProbeConfig {
    /// Server to connect to.
    pub endpoint: EndpointConfig,

    /// Credential file names.
    pub credentials: CredentialsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Server verification policy.
    pub security: SecurityConfig,

    /// Log output settings.
    pub logging: LoggingConfig,
}

/// Destination endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8883,
        }
    }
}

/// Credential names, resolved against `credential_dir` when set.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Trust anchors for the server chain (PEM or DER).
    pub root_ca: Option<String>,

    /// Device certificate for mutual TLS.
    pub device_cert: Option<String>,

    /// Device private key, unencrypted.
    pub device_key: Option<String>,

    /// Directory relative names are looked up in.
    pub credential_dir: Option<PathBuf>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Handshake read timeout. Zero disables it.
    pub handshake_ms: u32,

    /// Deadline for each read and write the probe performs.
    pub io_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            handshake_ms: DEFAULT_TIMEOUT_MS,
            io_ms: 5_000,
        }
    }
}

/// Server verification policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Require the server chain to verify against `root_ca`.
    pub verify_server: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            verify_server: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "tls_transport=info,tls_probe=info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl ProbeConfig {
    /// Connection parameters described by this configuration.
    pub fn connect_params(&self) -> ConnectParams {
        let mut params = ConnectParams::new(self.endpoint.host.clone(), self.endpoint.port)
            .with_timeout_ms(self.timeouts.handshake_ms)
            .with_server_verification(self.security.verify_server);

        if let Some(root_ca) = &self.credentials.root_ca {
            params = params.with_root_ca(root_ca.clone());
        }
        if let Some(cert) = &self.credentials.device_cert {
            params = params.with_device_cert(cert.clone());
        }
        if let Some(key) = &self.credentials.device_key {
            params = params.with_device_key(key.clone());
        }
        params
    }
}
