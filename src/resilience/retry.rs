//! Retry-until-done combinator.
//!
//! # Responsibilities
//! - Repeat an operation while its error is classified as retryable
//! - Stop on success, on a non-retryable error, or when the deadline expires
//!
//! The deadline is checked before every attempt, including the first, and
//! retries happen immediately with no backoff: the operations retried here
//! report "would block" only after the underlying socket has made progress
//! or waited on its own timeout.

use crate::timer::Timer;

/// When the retry loop gives up.
#[derive(Clone, Copy)]
pub enum Deadline<'a> {
    /// Retry for as long as the operation asks to.
    Unbounded,
    /// Stop once the timer expires.
    Timer(&'a dyn Timer),
    /// Stop after this many attempts.
    Attempts(u32),
}

/// Outcome of [`retry`].
#[derive(Debug, PartialEq, Eq)]
pub enum Retry<T, E> {
    Done(T),
    Failed(E),
    /// The deadline ran out before the operation settled.
    Expired,
}

pub fn retry<T, E>(
    deadline: Deadline<'_>,
    mut retryable: impl FnMut(&E) -> bool,
    mut op: impl FnMut() -> Result<T, E>,
) -> Retry<T, E> {
    let mut attempts: u32 = 0;
    loop {
        let expired = match deadline {
            Deadline::Unbounded => false,
            Deadline::Timer(timer) => timer.has_expired(),
            Deadline::Attempts(max) => attempts >= max,
        };
        if expired {
            return Retry::Expired;
        }

        attempts = attempts.saturating_add(1);
        match op() {
            Ok(value) => return Retry::Done(value),
            Err(e) if retryable(&e) => continue,
            Err(e) => return Retry::Failed(e),
        }
    }
}
