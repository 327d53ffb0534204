//! Entropy bridge and session random generator.
//!
//! # Data Flow
//! ```text
//! EntropySource (hardware RNG, strong)  ┐
//!                                       ├─ XOR ─→ Drbg seed ─→ Drbg (per session)
//! OsRng (default source)                ┘
//!
//! TLS engine ─→ SessionRandom ─→ active Drbg of the calling thread
//!                              └→ OsRng when no session is active
//! ```
//!
//! The engine's random source must be `'static`, so the session's generator
//! is lent to the calling thread only for the duration of an engine call
//! (see [`ActiveDrbg`]) and handed back afterwards. Nothing is shared between
//! sessions.

use std::cell::RefCell;
use std::fmt;

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use thiserror::Error;

/// Personalization mixed into every session seed.
pub const PERSONALIZATION: &[u8] = b"tls_transport";

const SEED_LEN: usize = 32;

/// The entropy source could not produce bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct EntropyError(pub String);

/// A strong entropy source, typically a hardware RNG.
///
/// `fill` either fills the whole buffer or fails; partial fills are not part
/// of the contract.
pub trait EntropySource: Send {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), EntropyError>;
}

/// Operating-system entropy, the stand-in for a hardware RNG on hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), EntropyError> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| EntropyError(e.to_string()))
    }
}

/// Adapts any `rand` generator into an [`EntropySource`].
#[derive(Debug)]
pub struct RngEntropy<R>(pub R);

impl<R: RngCore + Send> EntropySource for RngEntropy<R> {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), EntropyError> {
        self.0
            .try_fill_bytes(buf)
            .map_err(|e| EntropyError(e.to_string()))
    }
}

/// Deterministic random bit generator owned by one session.
pub struct Drbg {
    rng: StdRng,
}

impl Drbg {
    /// Seed from `strong` combined with the OS default source.
    ///
    /// Both sources must deliver a full seed.
    pub fn seed(strong: &mut dyn EntropySource, personalization: &[u8]) -> Result<Self, EntropyError> {
        let mut seed = [0u8; SEED_LEN];
        strong.fill(&mut seed)?;

        let mut default = [0u8; SEED_LEN];
        OsEntropy.fill(&mut default)?;

        for (i, byte) in seed.iter_mut().enumerate() {
            *byte ^= default[i];
            if !personalization.is_empty() {
                *byte ^= personalization[i % personalization.len()];
            }
        }
        default.fill(0);

        let rng = StdRng::from_seed(seed);
        seed.fill(0);
        Ok(Self { rng })
    }

    pub fn fill(&mut self, buf: &mut [u8]) {
        self.rng.fill_bytes(buf);
    }
}

impl fmt::Debug for Drbg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Drbg").finish_non_exhaustive()
    }
}

thread_local! {
    static ACTIVE: RefCell<Option<Drbg>> = const { RefCell::new(None) };
}

/// Random source handed to the TLS engine.
#[derive(Debug)]
pub(crate) struct SessionRandom;

pub(crate) static SESSION_RANDOM: SessionRandom = SessionRandom;

impl rustls::crypto::SecureRandom for SessionRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<(), rustls::crypto::GetRandomFailed> {
        ACTIVE.with(|slot| match slot.borrow_mut().as_mut() {
            Some(drbg) => {
                drbg.fill(buf);
                Ok(())
            }
            None => OsRng
                .try_fill_bytes(buf)
                .map_err(|_| rustls::crypto::GetRandomFailed),
        })
    }
}

/// Lends a session's generator to the current thread until dropped.
pub(crate) struct ActiveDrbg<'a> {
    home: &'a mut Option<Drbg>,
    previous: Option<Drbg>,
}

impl<'a> ActiveDrbg<'a> {
    pub(crate) fn enter(home: &'a mut Option<Drbg>) -> Self {
        let previous = ACTIVE.with(|slot| slot.replace(home.take()));
        Self { home, previous }
    }
}

impl Drop for ActiveDrbg<'_> {
    fn drop(&mut self) {
        let lent = ACTIVE.with(|slot| slot.replace(self.previous.take()));
        *self.home = lent;
    }
}
