// src/shutdown.rs
// Cooperative shutdown between the signal listener and the polling thread.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use nix::sys::signal::{SigSet, Signal};

use crate::error::Result;

/// A stop flag that can also be slept on.
///
/// Clones share the same flag. Once triggered it stays triggered.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps up to `timeout`, returning early once triggered.
    /// Returns whether the flag is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// The signals that end a monitoring session.
pub fn termination_signals() -> SigSet {
    let mut mask = SigSet::empty();
    mask.add(Signal::SIGINT);
    mask.add(Signal::SIGTERM);
    mask
}

/// Blocks SIGINT and SIGTERM on the calling thread.
///
/// Call this before spawning other threads: they inherit the mask, so the
/// signals stay pending until [`wait_for_signal`] picks them up.
pub fn block_termination_signals() -> Result<SigSet> {
    let mask = termination_signals();
    mask.thread_block()?;
    Ok(mask)
}

/// Waits synchronously for one of the signals in `mask`.
pub fn wait_for_signal(mask: &SigSet) -> Result<Signal> {
    let signal = mask.wait()?;
    tracing::debug!("received {}", signal);
    Ok(signal)
}
