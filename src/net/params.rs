//! Connection parameters.

use std::time::Duration;

/// Default handshake timeout, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u32 = 5_000;

/// Everything a session needs to reach and authenticate a server.
///
/// Credential fields are names resolved by the session's credential store.
/// Server verification is only ever in effect when a root CA is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    host: String,
    port: u16,
    root_ca: Option<String>,
    device_cert: Option<String>,
    device_key: Option<String>,
    timeout_ms: u32,
    verify_server: bool,
}

impl ConnectParams {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            root_ca: None,
            device_cert: None,
            device_key: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            verify_server: true,
        }
    }

    pub fn with_root_ca(mut self, name: impl Into<String>) -> Self {
        self.root_ca = Some(name.into());
        self
    }

    pub fn with_device_cert(mut self, name: impl Into<String>) -> Self {
        self.device_cert = Some(name.into());
        self
    }

    pub fn with_device_key(mut self, name: impl Into<String>) -> Self {
        self.device_key = Some(name.into());
        self
    }

    /// Certificate and key for mutual authentication.
    pub fn with_device_identity(self, cert: impl Into<String>, key: impl Into<String>) -> Self {
        self.with_device_cert(cert).with_device_key(key)
    }

    /// Handshake read timeout. Zero waits indefinitely.
    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_server_verification(mut self, verify: bool) -> Self {
        self.verify_server = verify;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn root_ca(&self) -> Option<&str> {
        self.root_ca.as_deref()
    }

    pub fn device_cert(&self) -> Option<&str> {
        self.device_cert.as_deref()
    }

    pub fn device_key(&self) -> Option<&str> {
        self.device_key.as_deref()
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// The handshake timeout, or `None` when it is disabled.
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(u64::from(ms))),
        }
    }

    /// Whether the server's chain must verify. Always false without a root CA.
    pub fn verify_server(&self) -> bool {
        self.verify_server && self.root_ca.is_some()
    }

    /// Whether the caller asked for verification, regardless of root CA.
    pub fn verification_requested(&self) -> bool {
        self.verify_server
    }
}
