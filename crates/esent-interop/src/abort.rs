//! Cooperative abort requests for threads that run status callbacks.
//!
//! Each thread owns one abort token. Another thread can request an abort
//! through an [`AbortHandle`]; the owning thread observes it at
//! [`checkpoint`] calls, or the callback adapter observes it before and after
//! running user logic. Nothing here interrupts a thread preemptively.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

thread_local! {
    static ABORT_TOKEN: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
}

/// Signal raised when a thread observes a pending abort request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Error)]
#[error("thread was aborted")]
pub struct ThreadAbort;

/// Handle used to request an abort of the thread that created it.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    /// Handle targeting the current thread.
    #[must_use]
    pub fn current() -> Self {
        Self {
            flag: ABORT_TOKEN.with(Arc::clone),
        }
    }

    /// Request an abort of the owning thread.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether an abort is pending for the owning thread.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Request an abort of the current thread.
pub fn request_abort() {
    AbortHandle::current().abort();
}

/// Whether an abort is pending for the current thread.
#[must_use]
pub fn is_abort_requested() -> bool {
    ABORT_TOKEN.with(|token| token.load(Ordering::SeqCst))
}

/// Cancel a pending abort on the current thread. Returns whether one was pending.
pub fn reset_abort() -> bool {
    ABORT_TOKEN.with(|token| token.swap(false, Ordering::SeqCst))
}

/// Observe the current thread's abort token.
///
/// # Errors
///
/// Returns [`ThreadAbort`] when an abort is pending. The request stays pending
/// until [`reset_abort`] is called.
pub fn checkpoint() -> Result<(), ThreadAbort> {
    if is_abort_requested() {
        Err(ThreadAbort)
    } else {
        Ok(())
    }
}

/// Request an abort of the current thread and unwind immediately.
///
/// The panic payload is [`ThreadAbort`], which the callback adapter recognises.
pub fn abort_current() -> ! {
    request_abort();
    std::panic::panic_any(ThreadAbort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn request_and_reset_round_trip() {
        assert!(!is_abort_requested());
        request_abort();
        assert!(is_abort_requested());
        assert_eq!(checkpoint(), Err(ThreadAbort));
        assert!(reset_abort());
        assert!(!reset_abort());
        assert_eq!(checkpoint(), Ok(()));
    }

    #[test]
    fn handle_aborts_the_owning_thread_only() {
        let (tx, rx) = std::sync::mpsc::channel();
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let worker = thread::spawn(move || {
            tx.send(AbortHandle::current()).expect("send handle");
            done_rx.recv().expect("controller signal");
            let observed = checkpoint();
            reset_abort();
            observed
        });

        let handle = rx.recv().expect("receive handle");
        handle.abort();
        assert!(handle.is_requested());
        assert!(!is_abort_requested(), "controller thread must stay untouched");
        done_tx.send(()).expect("signal worker");

        let observed = worker.join().expect("worker thread");
        assert_eq!(observed, Err(ThreadAbort));
        assert!(!handle.is_requested());
    }

    #[test]
    fn abort_current_unwinds_with_thread_abort_payload() {
        let result = std::panic::catch_unwind(|| {
            abort_current();
        });
        let payload = result.expect_err("abort_current must unwind");
        assert!(payload.downcast_ref::<ThreadAbort>().is_some());
        assert!(reset_abort());
    }
}
