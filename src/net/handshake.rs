//! Handshake and peer-verification steps of the connect sequence.

use crate::error::SetupError;
use crate::net::connection::SessionState;
use crate::resilience::{retry, Deadline, Retry};
use crate::tls::engine::{EngineError, TlsEngine};
use crate::tls::verifier::VerifyFlags;

/// Drive the handshake until it completes or fails.
///
/// "Would block" results are retried with no deadline of its own; the
/// socket's handshake read timeout bounds each step.
pub(crate) fn perform<E: TlsEngine + ?Sized>(engine: &mut E) -> Result<(), SetupError> {
    tracing::debug!("Performing the TLS handshake");

    match retry(Deadline::Unbounded, EngineError::is_would_block, || {
        engine.handshake()
    }) {
        Retry::Done(()) => Ok(()),
        Retry::Failed(EngineError::CertificateVerifyFailed(reason)) => {
            tracing::error!(
                %reason,
                "Unable to verify the server's certificate. Either it is invalid, \
                 or the root CA does not cover it"
            );
            Err(SetupError::SslConnection(format!(
                "certificate verification failed: {reason}"
            )))
        }
        Retry::Failed(e) => {
            tracing::error!(error = %e, "TLS handshake failed");
            Err(SetupError::SslConnection(format!("handshake failed: {e}")))
        }
        Retry::Expired => Err(SetupError::SslConnection(
            "handshake did not complete".into(),
        )),
    }
}

/// Decide the post-handshake state from the recorded verification flags.
pub(crate) fn check_peer(flags: VerifyFlags, verify: bool) -> Result<SessionState, SetupError> {
    if !verify {
        tracing::debug!(%flags, "Server verification skipped");
        return Ok(SessionState::VerificationSkipped);
    }

    tracing::debug!("Verifying peer X.509 certificate");
    if flags.is_empty() {
        tracing::debug!("Peer certificate verified");
        Ok(SessionState::Verified)
    } else {
        tracing::error!(%flags, "Server certificate verification failed");
        Err(SetupError::SslConnection(format!(
            "peer certificate failed verification: {flags}"
        )))
    }
}
