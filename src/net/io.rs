//! Timed read and write loops over an established engine.
//!
//! # Responsibilities
//! - Write a whole buffer, retrying each chunk while the engine would block
//! - Fill a whole buffer, tolerating empty polls until the timer expires
//! - Report how many bytes moved, including on failure

use crate::error::IoError;
use crate::resilience::{retry, Deadline, Retry};
use crate::timer::Timer;
use crate::tls::engine::{EngineError, TlsEngine};

/// Write all of `buf` before `timer` expires.
///
/// The timer is checked before every engine call. An engine call that
/// accepts no bytes without asking to be retried is fatal.
pub fn write_all<E, T>(engine: &mut E, buf: &[u8], timer: &T) -> Result<usize, IoError>
where
    E: TlsEngine + ?Sized,
    T: Timer + ?Sized,
{
    let timer: &dyn Timer = &TimerRef(timer);
    let mut written = 0;

    while written < buf.len() {
        let chunk = &buf[written..];
        match retry(Deadline::Timer(timer), EngineError::is_would_block, || {
            engine.write(chunk)
        }) {
            Retry::Done(0) => {
                tracing::error!(written, "Engine accepted no bytes");
                return Err(IoError::SslWrite { written });
            }
            Retry::Done(n) => written += n,
            Retry::Failed(e) => {
                tracing::error!(written, error = %e, "Write failed");
                return Err(IoError::SslWrite { written });
            }
            Retry::Expired => {
                tracing::warn!(written, requested = buf.len(), "Write timed out");
                return Err(IoError::SslWriteTimeout { written });
            }
        }
    }

    Ok(written)
}

/// Read exactly `buf.len()` bytes, polling until `timer` expires.
///
/// Nothing arriving before the deadline is [`IoError::NothingToRead`]; some
/// but not all is [`IoError::SslReadTimeout`].
pub fn read_exact<E, T>(engine: &mut E, buf: &mut [u8], timer: &T) -> Result<usize, IoError>
where
    E: TlsEngine + ?Sized,
    T: Timer + ?Sized,
{
    let mut read = 0;

    while read < buf.len() {
        match engine.read(&mut buf[read..]) {
            Ok(0) => {
                tracing::error!(read, "Peer closed the session");
                return Err(IoError::SslRead { read });
            }
            Ok(n) => read += n,
            Err(e) if e.is_would_block() || e == EngineError::Timeout => {}
            Err(e) => {
                tracing::error!(read, error = %e, "Read failed");
                return Err(IoError::SslRead { read });
            }
        }

        if timer.has_expired() {
            break;
        }
    }

    if read == buf.len() {
        Ok(read)
    } else if read == 0 {
        Err(IoError::NothingToRead)
    } else {
        Err(IoError::SslReadTimeout { read })
    }
}

/// Unsized-to-`dyn` bridge for the retry deadline.
struct TimerRef<'a, T: ?Sized>(&'a T);

impl<T: Timer + ?Sized> Timer for TimerRef<'_, T> {
    fn has_expired(&self) -> bool {
        self.0.has_expired()
    }
}
