//! The transport capability and its TLS session implementation.
//!
//! # Connect sequence
//! ```text
//! seed DRBG → load root CA → load client identity → TCP connect
//!     → blocking mode → configure engine → handshake → verify peer
//!     → steady-state read timeout → Ready
//! ```
//! Each step either advances the session state or fails the whole connect
//! with the step's [`SetupError`]. Resources acquired before a failure stay
//! on the session until [`Transport::destroy`] or the next connect, which
//! releases them before its first step.

use std::time::Duration;

use crate::entropy::{ActiveDrbg, Drbg, EntropySource, OsEntropy, PERSONALIZATION};
use crate::error::{SetupError, TransportError, TransportResult};
use crate::net::connection::{SessionId, SessionState, StateTrail};
use crate::net::handshake;
use crate::net::io;
use crate::net::params::ConnectParams;
use crate::net::socket::{Connector, Socket, TcpConnector};
use crate::resilience::{retry, Deadline, Retry};
use crate::storage::{CredentialStore, FsCredentialStore};
use crate::timer::Timer;
use crate::tls::credentials::{self, ClientIdentity, TrustAnchors};
use crate::tls::engine::{EngineError, SessionInfo, TlsEngine};
use crate::tls::rustls_engine::{EngineConfig, RustlsEngine};
use crate::tls::verifier::{AuthMode, VerifyFlags};

/// Socket read timeout once the session is ready; `read` polls its own
/// deadline between these waits.
pub const STEADY_STATE_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Upper bound on close-notify flush attempts during `disconnect`.
const CLOSE_NOTIFY_ATTEMPTS: u32 = 64;

/// Link status reported by [`Transport::is_connected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    PhysicalLayerConnected,
}

/// Operations a messaging client needs from its network layer.
pub trait Transport {
    /// Establish the session. `params` replaces the stored parameters first.
    fn connect(&mut self, params: Option<ConnectParams>) -> TransportResult<()>;

    /// Fill `buf` before `timer` expires.
    fn read(&mut self, buf: &mut [u8], timer: &dyn Timer) -> TransportResult<usize>;

    /// Send all of `buf` before `timer` expires.
    fn write(&mut self, buf: &[u8], timer: &dyn Timer) -> TransportResult<usize>;

    /// Send a close notification. Best effort: always succeeds.
    fn disconnect(&mut self) -> TransportResult<()>;

    fn is_connected(&self) -> TransportResult<ConnectionStatus>;

    /// Release every resource the session holds. Safe to call repeatedly.
    fn destroy(&mut self) -> TransportResult<()>;
}

/// Builder for a [`TlsTransport`] with non-default collaborators.
pub struct TransportBuilder<C = TcpConnector> {
    params: ConnectParams,
    connector: C,
    entropy: Box<dyn EntropySource>,
    store: Box<dyn CredentialStore>,
}

impl TransportBuilder<TcpConnector> {
    pub fn new(params: ConnectParams) -> Self {
        Self {
            params,
            connector: TcpConnector::new(),
            entropy: Box::new(OsEntropy),
            store: Box::new(FsCredentialStore::new()),
        }
    }
}

impl<C: Connector> TransportBuilder<C> {
    /// Strong entropy source mixed into the session seed.
    pub fn entropy(mut self, source: impl EntropySource + 'static) -> Self {
        self.entropy = Box::new(source);
        self
    }

    pub fn credential_store(mut self, store: impl CredentialStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    pub fn connector<D: Connector>(self, connector: D) -> TransportBuilder<D> {
        TransportBuilder {
            params: self.params,
            connector,
            entropy: self.entropy,
            store: self.store,
        }
    }

    pub fn build(self) -> TlsTransport<C> {
        TlsTransport {
            id: SessionId::new(),
            params: self.params,
            connector: self.connector,
            entropy: self.entropy,
            store: self.store,
            drbg: None,
            trust: None,
            identity: None,
            engine: None,
            verify_flags: VerifyFlags::EMPTY,
            states: StateTrail::new(),
        }
    }
}

/// A TLS client session over TCP.
pub struct TlsTransport<C: Connector = TcpConnector> {
    id: SessionId,
    params: ConnectParams,
    connector: C,
    entropy: Box<dyn EntropySource>,
    store: Box<dyn CredentialStore>,
    drbg: Option<Drbg>,
    trust: Option<TrustAnchors>,
    identity: Option<ClientIdentity>,
    engine: Option<RustlsEngine<C::Stream>>,
    verify_flags: VerifyFlags,
    states: StateTrail,
}

impl TlsTransport<TcpConnector> {
    /// Session with OS entropy, filesystem credentials and plain TCP.
    pub fn init(params: ConnectParams) -> Self {
        TransportBuilder::new(params).build()
    }

    pub fn builder(params: ConnectParams) -> TransportBuilder<TcpConnector> {
        TransportBuilder::new(params)
    }
}

impl<C: Connector> TlsTransport<C> {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn params(&self) -> &ConnectParams {
        &self.params
    }

    pub fn state(&self) -> &SessionState {
        self.states.current()
    }

    /// States entered during the last connect, oldest first.
    pub fn state_trail(&self) -> &[SessionState] {
        self.states.visited()
    }

    /// Verification outcome of the last handshake. Empty before any.
    pub fn verify_flags(&self) -> VerifyFlags {
        self.verify_flags
    }

    pub fn session_info(&self) -> Option<SessionInfo> {
        self.engine.as_ref().and_then(|engine| engine.session_info())
    }

    /// Drop every resource a previous connect acquired.
    fn release(&mut self) {
        self.engine = None;
        self.identity = None;
        self.trust = None;
        self.drbg = None;
    }

    fn establish(&mut self) -> Result<(), SetupError> {
        tracing::debug!("Seeding the random number generator");
        let drbg = Drbg::seed(self.entropy.as_mut(), PERSONALIZATION).map_err(|e| {
            tracing::error!(error = %e, "Entropy source failed");
            SetupError::EntropySource(e.to_string())
        })?;
        self.drbg = Some(drbg);

        match self.params.root_ca() {
            Some(path) => {
                self.trust = Some(credentials::load_root_ca(self.store.as_ref(), path)?);
            }
            None if self.params.verification_requested() => {
                tracing::warn!("No root CA given, server verification is disabled");
            }
            None => {}
        }

        if let Some(cert_path) = self.params.device_cert() {
            self.identity = Some(credentials::load_client_identity(
                self.store.as_ref(),
                cert_path,
                self.params.device_key(),
            )?);
        }

        let host = self.params.host().to_string();
        let port = self.params.port();
        tracing::debug!(host = %host, port, "Connecting");
        self.states.advance(SessionState::SocketConnecting);
        let mut socket = self
            .connector
            .connect(&host, port, self.params.timeout())
            .map_err(|e| {
                tracing::error!(host = %host, port, error = %e, "TCP connect failed");
                SetupError::from(e)
            })?;
        self.states.advance(SessionState::SocketConnected);

        socket.set_blocking().map_err(|e| {
            SetupError::SslConnection(format!("could not set blocking mode: {e}"))
        })?;

        let verify = self.params.verify_server();
        let config = EngineConfig {
            server_name: &host,
            auth_mode: if verify {
                AuthMode::Required
            } else {
                AuthMode::Optional
            },
            roots: self.trust.as_ref().map(TrustAnchors::roots),
            identity: self.identity.as_ref(),
            handshake_timeout: self.params.timeout(),
        };
        let engine = {
            let _rng = ActiveDrbg::enter(&mut self.drbg);
            RustlsEngine::configure(socket, &config).inspect_err(|e| {
                tracing::error!(error = %e, "Engine setup failed");
            })?
        };
        let engine = self.engine.insert(engine);
        self.states.advance(SessionState::EngineConfigured);

        self.states.advance(SessionState::Handshaking);
        {
            let _rng = ActiveDrbg::enter(&mut self.drbg);
            let outcome = handshake::perform(engine);
            self.verify_flags = engine.verify_result();
            outcome?;
        }
        if let Some(info) = engine.session_info() {
            tracing::info!(
                protocol = %info.protocol,
                cipher_suite = %info.cipher_suite,
                peer_chain_len = info.peer_chain_len,
                "TLS handshake complete"
            );
        }

        let verified = handshake::check_peer(self.verify_flags, verify)?;
        self.states.advance(verified);

        engine
            .set_read_timeout(Some(STEADY_STATE_READ_TIMEOUT))
            .map_err(|e| SetupError::SslConnection(format!("could not set read timeout: {e}")))?;
        self.states.advance(SessionState::Ready);
        Ok(())
    }
}

impl<C: Connector> Transport for TlsTransport<C> {
    fn connect(&mut self, params: Option<ConnectParams>) -> TransportResult<()> {
        if let Some(params) = params {
            self.params = params;
        }

        let span = tracing::info_span!(
            "tls_session",
            session = %self.id,
            host = %self.params.host(),
            port = self.params.port()
        );
        let _guard = span.enter();

        self.release();
        self.states.reset();
        self.verify_flags = VerifyFlags::EMPTY;

        match self.establish() {
            Ok(()) => {
                tracing::debug!("Session ready");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, state = ?self.states.current(), "Connect failed");
                self.states.fail(e.clone());
                Err(e.into())
            }
        }
    }

    fn read(&mut self, buf: &mut [u8], timer: &dyn Timer) -> TransportResult<usize> {
        let engine = self.engine.as_mut().ok_or(TransportError::NullArgument)?;
        let _rng = ActiveDrbg::enter(&mut self.drbg);
        Ok(io::read_exact(engine, buf, timer)?)
    }

    fn write(&mut self, buf: &[u8], timer: &dyn Timer) -> TransportResult<usize> {
        let engine = self.engine.as_mut().ok_or(TransportError::NullArgument)?;
        let _rng = ActiveDrbg::enter(&mut self.drbg);
        Ok(io::write_all(engine, buf, timer)?)
    }

    fn disconnect(&mut self) -> TransportResult<()> {
        let Some(engine) = self.engine.as_mut() else {
            tracing::debug!(session = %self.id, "No TLS session to close");
            return Ok(());
        };
        let _rng = ActiveDrbg::enter(&mut self.drbg);

        match retry(
            Deadline::Attempts(CLOSE_NOTIFY_ATTEMPTS),
            |e: &EngineError| *e == EngineError::WantWrite,
            || engine.close_notify(),
        ) {
            Retry::Done(()) => tracing::debug!(session = %self.id, "Close notification sent"),
            Retry::Failed(e) => {
                tracing::debug!(session = %self.id, error = %e, "Close notification failed")
            }
            Retry::Expired => {
                tracing::debug!(session = %self.id, "Close notification still pending")
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> TransportResult<ConnectionStatus> {
        Ok(ConnectionStatus::PhysicalLayerConnected)
    }

    fn destroy(&mut self) -> TransportResult<()> {
        self.release();
        self.verify_flags = VerifyFlags::EMPTY;
        self.states.reset();
        tracing::debug!(session = %self.id, "Session destroyed");
        Ok(())
    }
}
