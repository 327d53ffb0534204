//! Credential storage.
//!
//! The transport asks a [`CredentialStore`] for raw certificate and key bytes
//! by name and hands them straight to the parser; it keeps nothing after the
//! parse returns.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error returned by a credential store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("failed to read {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Bytes of one stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCredential {
    /// File contents, followed by a NUL byte when `null_added` is set.
    pub bytes: Vec<u8>,
    pub null_added: bool,
}

impl RawCredential {
    /// Wrap file contents, appending a NUL terminator for text parsers.
    pub fn terminated(mut bytes: Vec<u8>) -> Self {
        bytes.push(0);
        Self {
            bytes,
            null_added: true,
        }
    }

    /// Length of the original file, without the terminator.
    pub fn content_len(&self) -> usize {
        self.bytes.len() - usize::from(self.null_added)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Read-file-by-name access to credential material.
pub trait CredentialStore: Send {
    fn read(&self, name: &str) -> Result<RawCredential, StorageError>;
}

/// Reads credentials from the filesystem, relative names resolved against `root`.
#[derive(Debug, Clone, Default)]
pub struct FsCredentialStore {
    root: Option<PathBuf>,
}

impl FsCredentialStore {
    /// Store resolving names against the process working directory.
    pub fn new() -> Self {
        Self { root: None }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(name),
            None => PathBuf::from(name),
        }
    }
}

impl CredentialStore for FsCredentialStore {
    fn read(&self, name: &str) -> Result<RawCredential, StorageError> {
        let path = self.resolve(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(RawCredential::terminated(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.display().to_string()))
            }
            Err(source) => Err(StorageError::Io {
                name: path.display().to_string(),
                source,
            }),
        }
    }
}

/// In-memory store, for credentials compiled into the binary or tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(name.into(), bytes.into());
    }

    pub fn with(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn read(&self, name: &str) -> Result<RawCredential, StorageError> {
        self.files
            .get(name)
            .map(|bytes| RawCredential::terminated(bytes.clone()))
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }
}
