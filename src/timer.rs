//! Deadline handles used to bound blocking operations.

use std::time::{Duration, Instant};

/// A deadline the transport polls between retry attempts.
///
/// The transport never arms or resets a timer; it only asks whether it has
/// expired.
pub trait Timer {
    fn has_expired(&self) -> bool;
}

impl<T: Timer + ?Sized> Timer for &T {
    fn has_expired(&self) -> bool {
        (**self).has_expired()
    }
}

/// Monotonic countdown timer.
///
/// A freshly created countdown is already expired until it is started.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    deadline: Option<Instant>,
}

impl Countdown {
    /// Create an unarmed timer.
    pub fn new() -> Self {
        Self { deadline: None }
    }

    /// Create a timer armed for `ms` milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        let mut timer = Self::new();
        timer.start_millis(ms);
        timer
    }

    /// (Re)arm the timer for `ms` milliseconds from now.
    pub fn start_millis(&mut self, ms: u64) {
        self.start(Duration::from_millis(ms));
    }

    pub fn start(&mut self, duration: Duration) {
        self.deadline = Instant::now().checked_add(duration);
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        match self.deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for Countdown {
    fn has_expired(&self) -> bool {
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => true,
        }
    }
}
