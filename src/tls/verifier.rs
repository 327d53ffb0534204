//! Peer certificate verification.
//!
//! The engine asks [`RecordingVerifier`] about the server's chain. The
//! verifier records the outcome as [`VerifyFlags`] and logs it; it only
//! rejects the chain itself when the auth mode is [`AuthMode::Required`].
//! In optional mode the handshake completes and the caller reads the flags
//! afterwards.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, DigitallySignedStruct, Error, RootCertStore, SignatureScheme};

/// Bitmask of failed trust checks. Zero means the chain verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VerifyFlags(u32);

impl VerifyFlags {
    pub const EMPTY: Self = Self(0);
    /// Certificate is outside its validity period.
    pub const EXPIRED: Self = Self(1 << 0);
    /// Chain does not lead to a trust anchor.
    pub const NOT_TRUSTED: Self = Self(1 << 1);
    /// Certificate is not valid for the requested host name.
    pub const CN_MISMATCH: Self = Self(1 << 2);
    pub const REVOKED: Self = Self(1 << 3);
    /// Key usage or extended key usage forbids server authentication.
    pub const BAD_USAGE: Self = Self(1 << 4);
    pub const OTHER: Self = Self(1 << 5);

    const NAMES: [(Self, &'static str); 6] = [
        (Self::EXPIRED, "expired"),
        (Self::NOT_TRUSTED, "not-trusted"),
        (Self::CN_MISMATCH, "cn-mismatch"),
        (Self::REVOKED, "revoked"),
        (Self::BAD_USAGE, "bad-usage"),
        (Self::OTHER, "other"),
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Translate an engine verification error into flags.
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::InvalidCertificate(cert_error) => match cert_error {
                CertificateError::Expired
                | CertificateError::ExpiredContext { .. }
                | CertificateError::NotValidYet
                | CertificateError::NotValidYetContext { .. } => Self::EXPIRED,
                CertificateError::UnknownIssuer | CertificateError::BadSignature => {
                    Self::NOT_TRUSTED
                }
                CertificateError::NotValidForName
                | CertificateError::NotValidForNameContext { .. } => Self::CN_MISMATCH,
                CertificateError::Revoked => Self::REVOKED,
                CertificateError::InvalidPurpose => Self::BAD_USAGE,
                _ => Self::OTHER,
            },
            _ => Self::OTHER,
        }
    }
}

impl BitOr for VerifyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for VerifyFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for VerifyFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    write!(f, " | ")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Whether a failed verification aborts the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Required,
    Optional,
}

/// Flags slot shared between the verifier and the session that queries it.
#[derive(Debug, Clone, Default)]
pub(crate) struct FlagCell(Arc<AtomicU32>);

impl FlagCell {
    pub(crate) fn get(&self) -> VerifyFlags {
        VerifyFlags::from_bits(self.0.load(Ordering::Acquire))
    }

    fn record(&self, flags: VerifyFlags) {
        self.0.fetch_or(flags.bits(), Ordering::AcqRel);
    }
}

#[derive(Debug)]
pub(crate) struct RecordingVerifier {
    inner: Option<Arc<WebPkiServerVerifier>>,
    mode: AuthMode,
    flags: FlagCell,
    provider: Arc<CryptoProvider>,
}

impl RecordingVerifier {
    /// Build a verifier over `roots`. With no roots every chain is reported
    /// as untrusted.
    pub(crate) fn new(
        roots: Option<Arc<RootCertStore>>,
        mode: AuthMode,
        flags: FlagCell,
        provider: Arc<CryptoProvider>,
    ) -> Result<Self, String> {
        let inner = match roots {
            Some(roots) => Some(
                WebPkiServerVerifier::builder_with_provider(roots, Arc::clone(&provider))
                    .build()
                    .map_err(|e| e.to_string())?,
            ),
            None => None,
        };
        Ok(Self {
            inner,
            mode,
            flags,
            provider,
        })
    }
}

impl ServerCertVerifier for RecordingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, Error> {
        let result = match &self.inner {
            Some(inner) => {
                inner.verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
            }
            None => Err(Error::InvalidCertificate(CertificateError::UnknownIssuer)),
        };

        let flags = match &result {
            Ok(_) => VerifyFlags::EMPTY,
            Err(e) => VerifyFlags::from_error(e),
        };
        self.flags.record(flags);

        tracing::debug!(
            depth = 0,
            chain_len = intermediates.len() + 1,
            cert_bytes = end_entity.len(),
            %flags,
            "Verify requested for peer certificate"
        );
        if flags.is_empty() {
            tracing::debug!("This certificate has no flags");
        }

        match result {
            Ok(verified) => Ok(verified),
            Err(e) if self.mode == AuthMode::Required => Err(e),
            Err(_) => Ok(ServerCertVerified::assertion()),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_from_certificate_errors() {
        let expired = Error::InvalidCertificate(CertificateError::Expired);
        assert_eq!(VerifyFlags::from_error(&expired), VerifyFlags::EXPIRED);

        let untrusted = Error::InvalidCertificate(CertificateError::UnknownIssuer);
        assert_eq!(VerifyFlags::from_error(&untrusted), VerifyFlags::NOT_TRUSTED);

        let name = Error::InvalidCertificate(CertificateError::NotValidForName);
        assert_eq!(VerifyFlags::from_error(&name), VerifyFlags::CN_MISMATCH);

        assert_eq!(
            VerifyFlags::from_error(&Error::DecryptError),
            VerifyFlags::OTHER
        );
    }

    #[test]
    fn flags_display_lists_each_bit() {
        assert_eq!(VerifyFlags::EMPTY.to_string(), "none");
        let flags = VerifyFlags::EXPIRED | VerifyFlags::CN_MISMATCH;
        assert_eq!(flags.to_string(), "expired | cn-mismatch");
        assert!(flags.contains(VerifyFlags::EXPIRED));
        assert!(!flags.contains(VerifyFlags::REVOKED));
    }

    #[test]
    fn flag_cell_accumulates() {
        let cell = FlagCell::default();
        assert!(cell.get().is_empty());
        cell.record(VerifyFlags::EXPIRED);
        cell.record(VerifyFlags::NOT_TRUSTED);
        assert_eq!(cell.get(), VerifyFlags::EXPIRED | VerifyFlags::NOT_TRUSTED);
    }
}
