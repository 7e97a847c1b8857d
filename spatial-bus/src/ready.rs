//! Readiness backpressure between a producer loop and a sink.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::sink::FrameSink;

/// Wake-up handle a sink fires whenever it may have become ready again.
///
/// Waiters never trust the signal alone; they re-poll
/// [`FrameSink::ready_for_write`] after every wake-up or timeout.
#[derive(Clone, Default)]
pub struct ReadySignal {
    inner: Arc<(Mutex<u64>, Condvar)>,
}

impl ReadySignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        let (lock, cvar) = &*self.inner;
        let mut generation = lock.lock().unwrap_or_else(|e| e.into_inner());
        *generation = generation.wrapping_add(1);
        cvar.notify_all();
    }

    /// Blocks until the next notify or until `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) {
        let (lock, cvar) = &*self.inner;
        let generation = lock.lock().unwrap_or_else(|e| e.into_inner());
        let seen = *generation;
        let _ = cvar
            .wait_timeout_while(generation, timeout, |g| *g == seen)
            .unwrap_or_else(|e| e.into_inner());
    }
}

/// Blocks the calling producer until `sink` reports it can take a write.
///
/// Returns how many times the sink answered "not ready" first.
pub fn wait_until_ready<K: FrameSink + ?Sized>(sink: &K, poll: Duration) -> u64 {
    let signal = sink.ready_signal();
    let mut stalls = 0;
    while !sink.ready_for_write() {
        stalls += 1;
        match &signal {
            Some(signal) => signal.wait_timeout(poll),
            None if poll.is_zero() => std::thread::yield_now(),
            None => std::thread::sleep(poll),
        }
    }
    if stalls > 0 {
        log::trace!("{} became ready after {} polls", sink.path().display(), stalls);
    }
    stalls
}
