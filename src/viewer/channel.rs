//! Tokio mpsc channel presenter.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::device::DeviceState;
use crate::viewer::Presenter;
use crate::ViewError;

/// How long a send on a full channel sleeps before trying again.
const RETRY_INTERVAL: Duration = Duration::from_millis(5);

/// A presenter that forwards samples into a tokio mpsc channel.
///
/// This is the way to hand samples to an async UI or processing task. The
/// consumer thread waits on a full channel, which backs up into the viewer
/// buffer where the usual loss accounting applies.
///
/// A send waiting on a full channel gives up when the device stops or is
/// destroyed; the sample is counted in [`discarded`](Self::discarded).
///
/// # Example
///
/// ```
/// use stream_capture::{ChannelPresenter, FaceSample, Viewer};
/// use tokio::sync::mpsc;
///
/// let (tx, _rx) = mpsc::channel::<FaceSample>(100);
/// let viewer = Viewer::new("ui", ChannelPresenter::new(tx));
///
/// // Register the viewer with a device...
/// // Then receive samples:
/// // while let Some(face) = rx.recv().await { ... }
/// ```
pub struct ChannelPresenter<T> {
    sender: mpsc::Sender<T>,
    closed: AtomicBool,
    discarded: AtomicU64,
    // Bumped on every stop; a send started in an older generation gives up.
    generation: Mutex<u64>,
    halted: Condvar,
}

impl<T> ChannelPresenter<T> {
    /// Creates a presenter sending into `sender`.
    pub fn new(sender: mpsc::Sender<T>) -> Self {
        Self {
            sender,
            closed: AtomicBool::new(false),
            discarded: AtomicU64::new(0),
            generation: Mutex::new(0),
            halted: Condvar::new(),
        }
    }

    /// Returns `true` once the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed) || self.sender.is_closed()
    }

    /// Samples abandoned because the device stopped while the channel was full.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    fn halt(&self) {
        *self.generation.lock() += 1;
        self.halted.notify_all();
    }
}

impl<T: Send> Presenter<T> for ChannelPresenter<T> {
    fn on_sample(&self, sample: T) {
        let started = *self.generation.lock();
        let mut sample = sample;

        loop {
            match self.sender.try_send(sample) {
                Ok(()) => return,
                Err(TrySendError::Closed(_)) => {
                    if !self.closed.swap(true, Ordering::Relaxed) {
                        tracing::warn!("presenter channel closed, discarding samples");
                    }
                    return;
                }
                Err(TrySendError::Full(back)) => sample = back,
            }

            let mut generation = self.generation.lock();
            if *generation != started {
                self.discarded.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("presenter stopped with a full channel, sample discarded");
                return;
            }
            self.halted.wait_for(&mut generation, RETRY_INTERVAL);
        }
    }

    fn on_state_changed(&self, state: DeviceState) -> Result<(), ViewError> {
        if matches!(state, DeviceState::Stopped | DeviceState::Uninitialized) {
            self.halt();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_channel_presenter_forwards() {
        let (tx, mut rx) = mpsc::channel::<u32>(4);
        let presenter = ChannelPresenter::new(tx);

        presenter.on_sample(1);
        presenter.on_sample(2);

        assert_eq!(rx.blocking_recv(), Some(1));
        assert_eq!(rx.blocking_recv(), Some(2));
    }

    #[test]
    fn test_channel_presenter_closed() {
        let (tx, rx) = mpsc::channel::<u32>(1);
        let presenter = ChannelPresenter::new(tx);
        drop(rx);

        presenter.on_sample(1);
        presenter.on_sample(2);
        assert!(presenter.is_closed());
    }

    #[test]
    fn test_full_channel_send_gives_up_on_stop() {
        let (tx, mut rx) = mpsc::channel::<u32>(1);
        let presenter = Arc::new(ChannelPresenter::new(tx));
        presenter.on_sample(1);

        let sender = {
            let presenter = presenter.clone();
            thread::spawn(move || presenter.on_sample(2))
        };
        thread::sleep(Duration::from_millis(30));
        assert!(!sender.is_finished());

        presenter.on_state_changed(DeviceState::Stopped).unwrap();
        sender.join().unwrap();
        assert_eq!(presenter.discarded(), 1);

        // Only the first sample made it; later sends work normally.
        assert_eq!(rx.blocking_recv(), Some(1));
        presenter.on_sample(3);
        assert_eq!(rx.blocking_recv(), Some(3));
        assert_eq!(presenter.discarded(), 1);
    }

    #[test]
    fn test_full_channel_send_completes_when_drained() {
        let (tx, mut rx) = mpsc::channel::<u32>(1);
        let presenter = Arc::new(ChannelPresenter::new(tx));
        presenter.on_sample(1);

        let sender = {
            let presenter = presenter.clone();
            thread::spawn(move || presenter.on_sample(2))
        };
        assert_eq!(rx.blocking_recv(), Some(1));
        sender.join().unwrap();

        assert_eq!(rx.blocking_recv(), Some(2));
        assert_eq!(presenter.discarded(), 0);
    }
}
