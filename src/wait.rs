//! Binary rendezvous event on a futex word.
//!
//! One side [`Event::reset`]s and blocks in [`Event::wait`]; the other side
//! [`Event::set`]s. The word is a plain `AtomicU32`, so the same event works
//! when placed in memory shared between processes.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

const CLEAR: u32 = 0;
const SET: u32 = 1;

#[derive(Debug, Default)]
pub struct Event {
    state: AtomicU32,
}

impl Event {
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(CLEAR),
        }
    }

    pub fn set(&self) -> io::Result<()> {
        self.state.store(SET, Ordering::Release);
        futex_wake(&self.state)
    }

    pub fn reset(&self) {
        self.state.store(CLEAR, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.state.load(Ordering::Acquire) == SET
    }

    /// Blocks until the event is set.
    pub fn wait(&self) -> io::Result<()> {
        while !self.is_set() {
            futex_wait(&self.state, CLEAR, None)?;
        }
        Ok(())
    }

    /// Blocks until the event is set or `timeout` elapses. Returns whether the
    /// event was observed set.
    pub fn wait_timeout(&self, timeout: Duration) -> io::Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_set() {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            futex_wait(&self.state, CLEAR, Some(deadline - now))?;
        }
    }
}

#[cfg(target_os = "linux")]
pub fn futex_wait(addr: &AtomicU32, expected: u32, timeout: Option<Duration>) -> io::Result<()> {
    use libc::{syscall, timespec, EAGAIN, EINTR, ETIMEDOUT, FUTEX_WAIT, SYS_futex};

    let mut ts = timespec { tv_sec: 0, tv_nsec: 0 };
    let ts_ptr = if let Some(timeout) = timeout {
        ts.tv_sec = timeout.as_secs() as libc::time_t;
        ts.tv_nsec = timeout.subsec_nanos() as libc::c_long;
        &ts as *const timespec
    } else {
        std::ptr::null()
    };

    let res = unsafe {
        syscall(
            SYS_futex,
            addr as *const AtomicU32 as *const u32,
            FUTEX_WAIT,
            expected,
            ts_ptr,
            std::ptr::null::<u32>(),
            0,
        )
    };
    if res == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(code) if code == EAGAIN || code == EINTR || code == ETIMEDOUT => Ok(()),
        _ => Err(err),
    }
}

#[cfg(target_os = "linux")]
pub fn futex_wake(addr: &AtomicU32) -> io::Result<()> {
    use libc::{syscall, FUTEX_WAKE, SYS_futex};
    let res = unsafe {
        syscall(
            SYS_futex,
            addr as *const AtomicU32 as *const u32,
            FUTEX_WAKE,
            i32::MAX,
            std::ptr::null::<u32>(),
            std::ptr::null::<u32>(),
            0,
        )
    };
    if res < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wait(_addr: &AtomicU32, _expected: u32, timeout: Option<Duration>) -> io::Result<()> {
    let slice = Duration::from_millis(1);
    std::thread::sleep(timeout.map_or(slice, |t| t.min(slice)));
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wake(_addr: &AtomicU32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;

    #[test]
    fn wait_returns_after_set_from_other_thread() {
        let event = Arc::new(Event::new());
        let (started_tx, started_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let waiter = Arc::clone(&event);
        let handle = std::thread::spawn(move || {
            let _ = started_tx.send(());
            waiter.wait().unwrap();
            let _ = done_tx.send(());
        });

        started_rx.recv().unwrap();
        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());

        event.set().unwrap();
        done_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn wait_timeout_reports_unset() {
        let event = Event::new();
        assert!(!event.wait_timeout(Duration::from_millis(5)).unwrap());
        event.set().unwrap();
        assert!(event.wait_timeout(Duration::from_millis(5)).unwrap());
        event.reset();
        assert!(!event.is_set());
    }
}
