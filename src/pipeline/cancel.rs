//! Cancellation for blocking buffer operations.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::WaitError;

/// Something a blocked operation can be woken through.
pub(crate) trait Wake: Send + Sync {
    fn wake(&self);
}

/// A signal that ends or interrupts blocking [`CaptureBuffer`] waits.
///
/// Cloning a token shares it. Two kinds of signal exist:
///
/// - [`cancel`](Self::cancel) is sticky: every current and future wait on
///   the token fails with [`WaitError::Cancelled`].
/// - [`interrupt`](Self::interrupt) wakes the waits in progress with
///   [`WaitError::Interrupted`] and nothing more. An interrupt is not a stop
///   request; consumer loops go back to waiting.
///
/// [`CaptureBuffer`]: crate::CaptureBuffer
///
/// # Example
///
/// ```
/// use stream_capture::{CancelToken, CaptureBuffer, WaitError};
/// use std::sync::Arc;
///
/// let buffer = Arc::new(CaptureBuffer::<u32>::new());
/// let token = CancelToken::new();
///
/// let waiter = {
///     let (buffer, token) = (buffer.clone(), token.clone());
///     std::thread::spawn(move || buffer.take(&token))
/// };
///
/// token.cancel();
/// assert_eq!(waiter.join().unwrap(), Err(WaitError::Cancelled));
/// ```
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

#[derive(Default)]
struct TokenInner {
    cancelled: AtomicBool,
    interrupts: AtomicU64,
    next_waiter: AtomicU64,
    waiters: Mutex<Vec<(u64, Arc<dyn Wake>)>>,
}

impl CancelToken {
    /// Creates a token that is neither cancelled nor interrupted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token and wakes every wait blocked on it.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.wake_all();
        }
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Wakes every wait currently blocked on the token without cancelling it.
    pub fn interrupt(&self) {
        self.inner.interrupts.fetch_add(1, Ordering::SeqCst);
        self.wake_all();
    }

    /// Interrupt generation; a wait compares it against the value it saw
    /// when it started.
    pub(crate) fn epoch(&self) -> u64 {
        self.inner.interrupts.load(Ordering::SeqCst)
    }

    /// Returns why a wait that started at `epoch` must give up, if it must.
    pub(crate) fn check(&self, epoch: u64) -> Option<WaitError> {
        if self.is_cancelled() {
            Some(WaitError::Cancelled)
        } else if self.epoch() != epoch {
            Some(WaitError::Interrupted)
        } else {
            None
        }
    }

    /// Registers a waker for the duration of one blocking wait.
    pub(crate) fn register(&self, waker: Arc<dyn Wake>) -> Registration<'_> {
        let id = self.inner.next_waiter.fetch_add(1, Ordering::Relaxed);
        self.inner.waiters.lock().push((id, waker));
        Registration {
            inner: &self.inner,
            id,
        }
    }

    fn wake_all(&self) {
        // Snapshot so the token lock is not held while taking buffer locks.
        let waiters: Vec<Arc<dyn Wake>> = self
            .inner
            .waiters
            .lock()
            .iter()
            .map(|(_, w)| Arc::clone(w))
            .collect();
        for waker in waiters {
            waker.wake();
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("interrupts", &self.epoch())
            .finish()
    }
}

/// Removes a waker from its token when the wait ends.
pub(crate) struct Registration<'a> {
    inner: &'a TokenInner,
    id: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.inner.waiters.lock().retain(|(id, _)| *id != self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_cancel_is_sticky() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.check(token.epoch()), Some(WaitError::Cancelled));
    }

    #[test]
    fn test_interrupt_only_affects_older_epochs() {
        let token = CancelToken::new();
        let before = token.epoch();
        token.interrupt();
        assert_eq!(token.check(before), Some(WaitError::Interrupted));
        assert_eq!(token.check(token.epoch()), None);
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_registered_wakers_are_woken_until_dropped() {
        let token = CancelToken::new();
        let waker = Arc::new(CountingWaker(AtomicUsize::new(0)));

        let registration = token.register(waker.clone());
        token.interrupt();
        assert_eq!(waker.0.load(Ordering::SeqCst), 1);

        drop(registration);
        token.interrupt();
        assert_eq!(waker.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
