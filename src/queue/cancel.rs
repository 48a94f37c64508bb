//! Cancel-target rendezvous between the Manager and the Worker.
//!
//! ```text
//!   Manager                         Worker
//!   request(u)  target = u ──────►  checkpoint():
//!               resolved.reset()      target == current? target = None, interrupted
//!   wait_resolved() ◄─────────────    resolved.set()
//!   finish()    interrupted = target.is_none(); target = None
//! ```
//!
//! The Worker calls [`CancellationSignal::checkpoint`] during a trade and on
//! every idle wake, so a pending request always resolves while the Worker
//! is alive.

use std::io;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::debug;

use crate::wait::Event;

use super::message::UserId;

#[derive(Debug, Default)]
struct CancelState {
    target: Option<UserId>,
    current: Option<(UserId, u64)>,
}

#[derive(Debug, Default)]
pub struct CancellationSignal {
    state: Mutex<CancelState>,
    resolved: Event,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CancelState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// User whose trade the Worker is executing, if any.
    pub fn in_progress(&self) -> Option<UserId> {
        self.lock().current.map(|(user, _)| user)
    }

    /// Sequence number of the in-progress request.
    pub fn in_progress_seq(&self) -> Option<u64> {
        self.lock().current.map(|(_, seq)| seq)
    }

    // Manager side.

    /// Asks the Worker to cancel `user`'s trade if it is the one running.
    pub fn request(&self, user: UserId) {
        let mut state = self.lock();
        state.target = Some(user);
        self.resolved.reset();
    }

    /// Waits for the Worker to answer the pending request.
    pub fn wait_resolved(&self, timeout: Duration) -> io::Result<bool> {
        self.resolved.wait_timeout(timeout)
    }

    /// Clears the request. Returns whether the Worker interrupted a trade
    /// for it.
    pub fn finish(&self) -> bool {
        let mut state = self.lock();
        let interrupted = state.target.is_none();
        state.target = None;
        self.resolved.reset();
        interrupted
    }

    // Worker side.

    pub fn begin(&self, user: UserId, seq: u64) {
        self.lock().current = Some((user, seq));
    }

    pub fn end(&self) {
        self.lock().current = None;
    }

    /// Resolves any pending request. Returns true when it targets the
    /// in-progress trade, which the caller must then abandon.
    pub fn checkpoint(&self) -> io::Result<bool> {
        let mut state = self.lock();
        let Some(target) = state.target else {
            return Ok(false);
        };
        let hit = state.current.map(|(user, _)| user) == Some(target);
        if hit {
            debug!("cancelling in-progress trade for {target}");
            state.target = None;
        }
        self.resolved.set()?;
        Ok(hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{mpsc, Arc};

    #[test]
    fn hit_clears_target_and_reports_interrupted() {
        let signal = CancellationSignal::new();
        signal.begin(UserId(7), 1);
        signal.request(UserId(7));
        assert!(signal.checkpoint().unwrap());
        assert!(signal.wait_resolved(Duration::from_millis(1)).unwrap());
        assert!(signal.finish());
    }

    #[test]
    fn miss_resolves_without_interrupting() {
        let signal = CancellationSignal::new();
        signal.begin(UserId(1), 1);
        signal.request(UserId(2));
        assert!(!signal.checkpoint().unwrap());
        assert!(signal.wait_resolved(Duration::from_millis(1)).unwrap());
        assert!(!signal.finish());
    }

    #[test]
    fn idle_checkpoint_resolves() {
        let signal = CancellationSignal::new();
        signal.request(UserId(3));
        assert!(!signal.checkpoint().unwrap());
        assert!(!signal.finish());
        // no pending request: nothing to resolve
        assert!(!signal.checkpoint().unwrap());
        assert!(!signal.wait_resolved(Duration::from_millis(1)).unwrap());
    }

    #[test]
    fn manager_blocks_until_worker_checkpoint() {
        let signal = Arc::new(CancellationSignal::new());
        signal.begin(UserId(9), 4);
        signal.request(UserId(9));

        let (tx, rx) = mpsc::channel();
        let worker = Arc::clone(&signal);
        let handle = std::thread::spawn(move || {
            rx.recv().unwrap();
            worker.checkpoint().unwrap()
        });

        assert!(!signal.wait_resolved(Duration::from_millis(20)).unwrap());
        tx.send(()).unwrap();
        assert!(signal.wait_resolved(Duration::from_secs(5)).unwrap());
        assert!(handle.join().unwrap());
        assert!(signal.finish());
    }
}
