//! tls-probe: open a TLS session to a device endpoint and exchange a message.
//!
//! ```text
//! config file / flags → ConnectParams → TlsTransport::connect
//!     → write(--send) → read(--read) → disconnect → destroy
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use tls_transport::config::{read_config, validate_config, ConfigError, ProbeConfig};
use tls_transport::observability::init_logging;
use tls_transport::storage::FsCredentialStore;
use tls_transport::{Countdown, TlsTransport, Transport, TransportError};

#[derive(Parser)]
#[command(name = "tls-probe")]
#[command(about = "Connect to a TLS endpoint and exchange a message", long_about = None)]
struct Cli {
    /// TOML configuration file. Flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Root CA file for server verification
    #[arg(long)]
    root_ca: Option<String>,

    /// Device certificate for mutual TLS
    #[arg(long)]
    cert: Option<String>,

    /// Device private key for mutual TLS
    #[arg(long)]
    key: Option<String>,

    /// Require the server certificate to verify (needs --root-ca)
    #[arg(long)]
    verify: Option<bool>,

    /// Handshake timeout in milliseconds, 0 for none
    #[arg(long)]
    timeout_ms: Option<u32>,

    /// Text to send once connected
    #[arg(long)]
    send: Option<String>,

    /// Number of bytes to read back
    #[arg(long)]
    read: Option<usize>,
}

impl Cli {
    fn apply(&self, config: &mut ProbeConfig) {
        if let Some(host) = &self.host {
            config.endpoint.host = host.clone();
        }
        if let Some(port) = self.port {
            config.endpoint.port = port;
        }
        if let Some(root_ca) = &self.root_ca {
            config.credentials.root_ca = Some(root_ca.clone());
        }
        if let Some(cert) = &self.cert {
            config.credentials.device_cert = Some(cert.clone());
        }
        if let Some(key) = &self.key {
            config.credentials.device_key = Some(key.clone());
        }
        if let Some(verify) = self.verify {
            config.security.verify_server = verify;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeouts.handshake_ms = timeout_ms;
        }
    }
}

/// File values (or defaults), then flag overrides, then validation of the
/// merged result.
fn resolve_config(cli: &Cli) -> Result<ProbeConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => ProbeConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn run(config: &ProbeConfig, cli: &Cli) -> Result<(), TransportError> {
    let store = match &config.credentials.credential_dir {
        Some(dir) => FsCredentialStore::with_root(dir),
        None => FsCredentialStore::new(),
    };
    let mut session = TlsTransport::builder(config.connect_params())
        .credential_store(store)
        .build();

    let outcome = exchange(&mut session, config, cli);

    session.disconnect()?;
    session.destroy()?;
    outcome
}

fn exchange(session: &mut TlsTransport, config: &ProbeConfig, cli: &Cli) -> Result<(), TransportError> {
    session.connect(None)?;
    tracing::info!(
        session = %session.id(),
        flags = %session.verify_flags(),
        "Connected"
    );

    if let Some(text) = &cli.send {
        let timer = Countdown::from_millis(config.timeouts.io_ms);
        let written = session.write(text.as_bytes(), &timer)?;
        tracing::info!(bytes = written, "Sent");
    }

    if let Some(len) = cli.read {
        let timer = Countdown::from_millis(config.timeouts.io_ms);
        let mut buf = vec![0u8; len];
        let read = session.read(&mut buf, &timer)?;
        println!("{}", String::from_utf8_lossy(&buf[..read]));
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tls-probe: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("tls-probe: logging unavailable: {e}");
    }

    tracing::info!(
        host = %config.endpoint.host,
        port = config.endpoint.port,
        verify_server = config.security.verify_server,
        "tls-probe starting"
    );

    match run(&config, &cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, phase = ?e.phase(), "Probe failed");
            eprintln!("tls-probe: {e}");
            ExitCode::FAILURE
        }
    }
}
