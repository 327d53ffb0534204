//! Certificate and key loading.
//!
//! Material is fetched from a [`CredentialStore`] and parsed immediately;
//! only the parsed form is kept. PEM input may hold several blocks and a
//! trailing NUL; anything without a PEM header is treated as a single DER
//! object.

use std::fmt;
use std::io::{self, Cursor};
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::RootCertStore;

use crate::error::SetupError;
use crate::storage::{CredentialStore, RawCredential};

const PEM_MARKER: &[u8] = b"-----BEGIN";

/// Which piece of credential material an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    RootCa,
    DeviceCert,
    PrivateKey,
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::RootCa => write!(f, "root CA"),
            Credential::DeviceCert => write!(f, "device certificate"),
            Credential::PrivateKey => write!(f, "device private key"),
        }
    }
}

/// Parsed trust anchors.
#[derive(Debug, Clone)]
pub struct TrustAnchors {
    roots: Arc<RootCertStore>,
    skipped: usize,
}

impl TrustAnchors {
    pub fn roots(&self) -> Arc<RootCertStore> {
        Arc::clone(&self.roots)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Entries that were present but could not be used.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

/// The device's own certificate chain and private key.
#[derive(Debug)]
pub struct ClientIdentity {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl ClientIdentity {
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    pub(crate) fn clone_parts(&self) -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
        (self.chain.clone(), self.key.clone_key())
    }
}

fn fetch(
    store: &dyn CredentialStore,
    credential: Credential,
    path: &str,
) -> Result<RawCredential, SetupError> {
    store.read(path).map_err(|e| {
        tracing::error!(%credential, path, error = %e, "Credential read failed");
        SetupError::CertRead {
            credential,
            path: path.to_string(),
        }
    })
}

fn is_pem(raw: &RawCredential) -> bool {
    raw.as_bytes()
        .windows(PEM_MARKER.len())
        .any(|window| window == PEM_MARKER)
}

fn der_bytes(raw: &RawCredential) -> &[u8] {
    &raw.as_bytes()[..raw.content_len()]
}

/// Returns the certificates that decoded plus the number of blocks that did not.
fn decode_certificates(raw: &RawCredential) -> (Vec<CertificateDer<'static>>, usize) {
    if !is_pem(raw) {
        let der = der_bytes(raw);
        if der.is_empty() {
            return (Vec::new(), 0);
        }
        return (vec![CertificateDer::from(der.to_vec())], 0);
    }

    let mut certs = Vec::new();
    let mut broken = 0;
    let mut reader = Cursor::new(raw.as_bytes());
    for item in rustls_pemfile::certs(&mut reader) {
        match item {
            Ok(cert) => certs.push(cert),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                tracing::debug!(error = %e, "Undecodable PEM block");
                broken += 1;
            }
            Err(e) => {
                tracing::debug!(error = %e, "PEM read stopped");
                broken += 1;
                break;
            }
        }
    }
    (certs, broken)
}

/// Parse trust anchors. Unusable entries are skipped as long as one survives.
pub fn parse_root_ca(raw: &RawCredential) -> Result<TrustAnchors, SetupError> {
    let (certs, broken) = decode_certificates(raw);
    if certs.is_empty() {
        return Err(SetupError::RootCertParse(
            "no certificate found in root CA material".into(),
        ));
    }

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);
    if added == 0 {
        return Err(SetupError::RootCertParse(format!(
            "none of {ignored} root certificates could be parsed"
        )));
    }

    Ok(TrustAnchors {
        roots: Arc::new(roots),
        skipped: ignored + broken,
    })
}

pub fn parse_device_cert(raw: &RawCredential) -> Result<Vec<CertificateDer<'static>>, SetupError> {
    let (certs, broken) = decode_certificates(raw);
    if broken > 0 {
        return Err(SetupError::DeviceCertParse(
            "device certificate holds a malformed PEM block".into(),
        ));
    }
    if certs.is_empty() {
        return Err(SetupError::DeviceCertParse(
            "no certificate found in device certificate material".into(),
        ));
    }
    Ok(certs)
}

/// Parse an unencrypted private key (PKCS#8, PKCS#1 or SEC1).
///
/// Keys are read with an empty password, so encrypted keys are rejected.
pub fn parse_private_key(raw: &RawCredential) -> Result<PrivateKeyDer<'static>, SetupError> {
    if !is_pem(raw) {
        return PrivateKeyDer::try_from(der_bytes(raw))
            .map(|key| key.clone_key())
            .map_err(|e| SetupError::PrivateKeyParse(e.to_string()));
    }

    let mut reader = Cursor::new(raw.as_bytes());
    match rustls_pemfile::private_key(&mut reader) {
        Ok(Some(key)) => Ok(key),
        Ok(None) => Err(SetupError::PrivateKeyParse(
            "no unencrypted private key found".into(),
        )),
        Err(e) => Err(SetupError::PrivateKeyParse(e.to_string())),
    }
}

/// Load the trust anchors stored under `path`.
pub fn load_root_ca(store: &dyn CredentialStore, path: &str) -> Result<TrustAnchors, SetupError> {
    tracing::debug!(path, "Loading the CA root certificate");
    let raw = fetch(store, Credential::RootCa, path)?;
    let anchors = parse_root_ca(&raw).inspect_err(|e| {
        tracing::error!(path, error = %e, "Root CA parse failed");
    })?;

    if anchors.skipped() > 0 {
        tracing::warn!(path, skipped = anchors.skipped(), "Some root CA entries were skipped");
    }
    tracing::debug!(roots = anchors.len(), skipped = anchors.skipped(), "Root CA ok");
    Ok(anchors)
}

/// Load the device certificate and its private key.
///
/// A certificate without a key path cannot form an identity and is reported
/// as a key error.
pub fn load_client_identity(
    store: &dyn CredentialStore,
    cert_path: &str,
    key_path: Option<&str>,
) -> Result<ClientIdentity, SetupError> {
    tracing::debug!(cert_path, "Loading the client cert and key");
    let raw = fetch(store, Credential::DeviceCert, cert_path)?;
    let chain = parse_device_cert(&raw).inspect_err(|e| {
        tracing::error!(cert_path, error = %e, "Device certificate parse failed");
    })?;

    let key_path = key_path.ok_or_else(|| {
        SetupError::PrivateKeyParse("device certificate given without a private key".into())
    })?;
    let raw = fetch(store, Credential::PrivateKey, key_path)?;
    let key = parse_private_key(&raw).inspect_err(|e| {
        tracing::error!(key_path, error = %e, "Private key parse failed");
    })?;

    Ok(ClientIdentity { chain, key })
}
