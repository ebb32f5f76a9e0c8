//! Bounded FIFO buffer between a capture device and one viewer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use ringbuf::traits::{Consumer, Observer, Producer};
use ringbuf::HeapRb;

use crate::config::{DEFAULT_BUFFER_CAPACITY, DEFAULT_POLL_TIMEOUT};
use crate::pipeline::cancel::Wake;
use crate::{CancelToken, CaptureError, PutError, WaitError};

/// Outcome of a timed put.
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub enum Delivery<T> {
    /// The sample was enqueued.
    Delivered,
    /// The buffer stayed full for the whole window. The sample is handed
    /// back and the attempt counted as a loss.
    Dropped(T),
}

impl<T> Delivery<T> {
    /// Returns `true` if the sample was enqueued.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Snapshot of a buffer's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Puts that enqueued their sample.
    pub accepted: u64,
    /// Puts that timed out or were cancelled.
    pub rejected: u64,
    /// Samples waiting to be taken.
    pub pending: usize,
    /// Maximum number of pending samples.
    pub capacity: usize,
}

impl BufferStats {
    /// Lost samples as a percentage of delivered ones.
    ///
    /// `0.0` while nothing has been delivered.
    pub fn loss_rate(&self) -> f64 {
        if self.accepted == 0 {
            return 0.0;
        }
        self.rejected as f64 / self.accepted as f64 * 100.0
    }
}

/// A fixed-capacity FIFO with blocking, timed and cancellable operations.
///
/// The buffer decouples a real-time producer from a consumer of
/// unpredictable speed. Producers choose per call site between
/// [`put`](Self::put), which waits for space and never loses a sample unless
/// cancelled, and [`put_timeout`](Self::put_timeout), which bounds the wait
/// and counts the sample as lost when the window expires.
///
/// Every put attempt is counted exactly once, as accepted or rejected.
///
/// # Example
///
/// ```
/// use stream_capture::{CaptureBuffer, Delivery};
/// use std::time::Duration;
///
/// let buffer = CaptureBuffer::with_capacity(1).unwrap();
/// assert!(buffer.put_timeout("a", Duration::ZERO).is_delivered());
/// assert_eq!(buffer.put_timeout("b", Duration::ZERO), Delivery::Dropped("b"));
///
/// assert_eq!(buffer.try_take(), Some("a"));
/// assert_eq!(buffer.loss_count(), 1);
/// ```
pub struct CaptureBuffer<T> {
    shared: Arc<Shared<T>>,
    poll_timeout: Duration,
}

struct Shared<T> {
    queue: Mutex<HeapRb<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl<T: Send> Wake for Shared<T> {
    fn wake(&self) {
        // Taking the lock orders the wake after any check-then-wait in progress.
        let _queue = self.queue.lock();
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}

impl<T: Send + 'static> Default for CaptureBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> CaptureBuffer<T> {
    /// Creates a buffer with the default capacity of 100 samples.
    pub fn new() -> Self {
        Self::build(DEFAULT_BUFFER_CAPACITY)
    }

    /// Creates a buffer holding at most `capacity` pending samples.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidArgument`] if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Result<Self, CaptureError> {
        if capacity == 0 {
            return Err(CaptureError::invalid_argument(
                "buffer capacity must be at least 1",
            ));
        }
        Ok(Self::build(capacity))
    }

    fn build(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(HeapRb::new(capacity)),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                capacity,
                accepted: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
            }),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Sets how long [`poll`](Self::poll) waits for a sample.
    #[must_use]
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    fn waker(&self) -> Arc<dyn Wake> {
        self.shared.clone()
    }

    /// Enqueues a sample, waiting as long as it takes for space.
    ///
    /// # Errors
    ///
    /// If `token` is cancelled or interrupted before space frees up, the
    /// attempt is counted as a loss and the sample is returned in the
    /// [`PutError`].
    pub fn put(&self, sample: T, token: &CancelToken) -> Result<(), PutError<T>> {
        let epoch = token.epoch();
        let _registration = token.register(self.waker());
        let mut queue = self.shared.queue.lock();
        let mut sample = sample;

        loop {
            if let Some(kind) = token.check(epoch) {
                drop(queue);
                self.shared.rejected.fetch_add(1, Ordering::SeqCst);
                return Err(PutError { sample, kind });
            }
            match queue.try_push(sample) {
                Ok(()) => {
                    self.shared.accepted.fetch_add(1, Ordering::SeqCst);
                    drop(queue);
                    self.shared.not_empty.notify_all();
                    return Ok(());
                }
                Err(back) => {
                    sample = back;
                    self.shared.not_full.wait(&mut queue);
                }
            }
        }
    }

    /// Enqueues a sample, waiting at most `timeout` for space.
    ///
    /// A zero timeout makes a single non-blocking attempt.
    pub fn put_timeout(&self, sample: T, timeout: Duration) -> Delivery<T> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.shared.queue.lock();
        let mut sample = sample;

        loop {
            match queue.try_push(sample) {
                Ok(()) => {
                    self.shared.accepted.fetch_add(1, Ordering::SeqCst);
                    drop(queue);
                    self.shared.not_empty.notify_all();
                    return Delivery::Delivered;
                }
                Err(back) => sample = back,
            }
            if Instant::now() >= deadline {
                drop(queue);
                self.shared.rejected.fetch_add(1, Ordering::SeqCst);
                return Delivery::Dropped(sample);
            }
            self.shared.not_full.wait_until(&mut queue, deadline);
        }
    }

    /// Removes and returns the oldest sample, waiting until one arrives.
    ///
    /// # Errors
    ///
    /// Returns the [`WaitError`] if `token` is cancelled or interrupted
    /// first. An interrupt is not a stop request; the caller decides whether
    /// to wait again.
    pub fn take(&self, token: &CancelToken) -> Result<T, WaitError> {
        let epoch = token.epoch();
        let _registration = token.register(self.waker());
        let mut queue = self.shared.queue.lock();

        loop {
            if let Some(kind) = token.check(epoch) {
                return Err(kind);
            }
            if let Some(sample) = queue.try_pop() {
                drop(queue);
                self.shared.not_full.notify_all();
                return Ok(sample);
            }
            self.shared.not_empty.wait(&mut queue);
        }
    }

    /// Removes the oldest sample, waiting at most `timeout` for one.
    pub fn poll_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.shared.queue.lock();

        loop {
            if let Some(sample) = queue.try_pop() {
                drop(queue);
                self.shared.not_full.notify_all();
                return Some(sample);
            }
            if Instant::now() >= deadline {
                return None;
            }
            self.shared.not_empty.wait_until(&mut queue, deadline);
        }
    }

    /// Removes the oldest sample, waiting at most the buffer's poll timeout
    /// (200ms unless configured) for one.
    pub fn poll(&self) -> Option<T> {
        self.poll_timeout(self.poll_timeout)
    }

    /// Removes the oldest sample if one is pending, without waiting.
    pub fn try_take(&self) -> Option<T> {
        let sample = self.shared.queue.lock().try_pop();
        if sample.is_some() {
            self.shared.not_full.notify_all();
        }
        sample
    }
}

impl<T> CaptureBuffer<T> {
    /// Returns `true` if nothing is pending at the moment of the call.
    pub fn is_empty(&self) -> bool {
        self.shared.queue.lock().is_empty()
    }

    /// Number of pending samples at the moment of the call.
    pub fn len(&self) -> usize {
        self.shared.queue.lock().occupied_len()
    }

    /// Maximum number of pending samples.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// How long [`poll`](CaptureBuffer::poll) waits.
    pub fn default_poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    /// Number of puts that enqueued their sample.
    pub fn accepted_count(&self) -> u64 {
        self.shared.accepted.load(Ordering::SeqCst)
    }

    /// Number of puts that timed out or were cancelled.
    pub fn loss_count(&self) -> u64 {
        self.shared.rejected.load(Ordering::SeqCst)
    }

    /// Lost samples as a percentage of delivered ones; `0.0` until a
    /// sample has been delivered.
    pub fn loss_rate(&self) -> f64 {
        self.stats().loss_rate()
    }

    /// Returns a snapshot of the buffer's counters.
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            accepted: self.accepted_count(),
            rejected: self.loss_count(),
            pending: self.len(),
            capacity: self.capacity(),
        }
    }
}

impl<T> std::fmt::Debug for CaptureBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureBuffer")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_zero_capacity_rejected() {
        let result = CaptureBuffer::<u8>::with_capacity(0);
        assert!(matches!(result, Err(CaptureError::InvalidArgument { .. })));
    }

    #[test]
    fn test_default_capacity() {
        let buffer = CaptureBuffer::<u8>::new();
        assert_eq!(buffer.capacity(), 100);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_immediate_puts_retain_at_most_capacity() {
        for capacity in [1usize, 3, 10] {
            let buffer = CaptureBuffer::with_capacity(capacity).unwrap();
            let attempts = 25u64;
            for i in 0..attempts {
                let _ = buffer.put_timeout(i, Duration::ZERO);
            }

            let stats = buffer.stats();
            assert_eq!(stats.pending, capacity);
            assert_eq!(stats.accepted + stats.rejected, attempts);
            assert_eq!(stats.rejected, attempts - capacity as u64);
        }
    }

    #[test]
    fn test_fifo_order() {
        let buffer = CaptureBuffer::with_capacity(8).unwrap();
        let token = CancelToken::new();
        for i in 0..8 {
            buffer.put(i, &token).unwrap();
        }
        let taken: Vec<_> = (0..8).map(|_| buffer.take(&token).unwrap()).collect();
        assert_eq!(taken, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_take_returns_same_allocation() {
        let buffer = CaptureBuffer::new();
        let token = CancelToken::new();
        let sample = Arc::new(vec![1u8, 2, 3]);

        buffer.put(Arc::clone(&sample), &token).unwrap();
        let taken = buffer.take(&token).unwrap();
        assert!(Arc::ptr_eq(&sample, &taken));
    }

    #[test]
    fn test_dropped_put_hands_sample_back() {
        let buffer = CaptureBuffer::with_capacity(1).unwrap();
        assert!(buffer.put_timeout(1, Duration::ZERO).is_delivered());
        let outcome = buffer.put_timeout(2, Duration::from_millis(5));
        assert_eq!(outcome, Delivery::Dropped(2));
        assert_eq!(buffer.loss_count(), 1);
    }

    #[test]
    fn test_timed_put_succeeds_when_space_frees() {
        let buffer = Arc::new(CaptureBuffer::with_capacity(1).unwrap());
        assert!(buffer.put_timeout(1, Duration::ZERO).is_delivered());

        let drainer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                buffer.try_take()
            })
        };

        let outcome = buffer.put_timeout(2, Duration::from_secs(5));
        assert!(outcome.is_delivered());
        assert_eq!(drainer.join().unwrap(), Some(1));
        assert_eq!(buffer.loss_count(), 0);
    }

    #[test]
    fn test_cancelled_put_counts_loss() {
        let buffer = Arc::new(CaptureBuffer::with_capacity(1).unwrap());
        let token = CancelToken::new();
        buffer.put(1, &token).unwrap();

        let producer = {
            let (buffer, token) = (buffer.clone(), token.clone());
            thread::spawn(move || buffer.put(2, &token))
        };

        thread::sleep(Duration::from_millis(20));
        token.cancel();

        let err = producer.join().unwrap().unwrap_err();
        assert_eq!(err.kind, WaitError::Cancelled);
        assert_eq!(err.into_sample(), 2);
        assert_eq!(buffer.accepted_count(), 1);
        assert_eq!(buffer.loss_count(), 1);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_take_interrupt_is_not_cancel() {
        let buffer = Arc::new(CaptureBuffer::<u32>::new());
        let token = CancelToken::new();

        let consumer = {
            let (buffer, token) = (buffer.clone(), token.clone());
            thread::spawn(move || buffer.take(&token))
        };

        thread::sleep(Duration::from_millis(20));
        token.interrupt();

        assert_eq!(consumer.join().unwrap(), Err(WaitError::Interrupted));
        assert!(!token.is_cancelled());

        // A fresh wait on the same token is unaffected by the old interrupt.
        assert!(buffer.put_timeout(9, Duration::ZERO).is_delivered());
        assert_eq!(buffer.take(&token), Ok(9));
    }

    #[test]
    fn test_take_wakes_on_put() {
        let buffer = Arc::new(CaptureBuffer::new());
        let token = CancelToken::new();

        let consumer = {
            let (buffer, token) = (buffer.clone(), token.clone());
            thread::spawn(move || buffer.take(&token))
        };

        thread::sleep(Duration::from_millis(10));
        buffer.put("frame", &token).unwrap();
        assert_eq!(consumer.join().unwrap(), Ok("frame"));
    }

    #[test]
    fn test_poll_timeout_empty() {
        let buffer = CaptureBuffer::<u8>::new();
        let start = Instant::now();
        assert_eq!(buffer.poll_timeout(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_poll_returns_pending() {
        let buffer = CaptureBuffer::new();
        assert!(buffer.put_timeout(5, Duration::ZERO).is_delivered());
        assert_eq!(buffer.poll(), Some(5));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_poll_uses_configured_timeout() {
        let buffer = CaptureBuffer::<u8>::new();
        assert_eq!(buffer.default_poll_timeout(), DEFAULT_POLL_TIMEOUT);

        let buffer = buffer.with_poll_timeout(Duration::from_millis(10));
        assert_eq!(buffer.default_poll_timeout(), Duration::from_millis(10));

        let start = Instant::now();
        assert_eq!(buffer.poll(), None);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(10));
        assert!(waited < DEFAULT_POLL_TIMEOUT);
    }

    #[test]
    fn test_loss_rate_zero_before_delivery() {
        let buffer = CaptureBuffer::<u8>::with_capacity(1).unwrap();
        assert!(buffer.loss_rate().abs() < f64::EPSILON);

        let stats = BufferStats {
            accepted: 0,
            rejected: 5,
            pending: 0,
            capacity: 1,
        };
        assert!(stats.loss_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn test_loss_rate_ratio() {
        let buffer = CaptureBuffer::with_capacity(4).unwrap();
        for i in 0..5 {
            let _ = buffer.put_timeout(i, Duration::ZERO);
        }
        // 4 accepted, 1 rejected
        assert!((buffer.loss_rate() - 25.0).abs() < 1e-9);
    }
}
