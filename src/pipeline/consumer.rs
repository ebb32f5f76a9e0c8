//! Consumer loop - drains a viewer buffer on a dedicated thread.
//!
//! The loop blocks in [`CaptureBuffer::take`] and hands each sample to a
//! handler. It never busy-spins: it sleeps in the buffer until a sample
//! arrives or its token is signalled.
//!
//! - A cancelled token ends the loop.
//! - An interrupt that is not a stop request sends the loop back to waiting.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::{CancelToken, CaptureBuffer, WaitError};

/// Starts a consumer thread named `consumer-{name}`.
///
/// # Errors
///
/// Returns the I/O error if the OS refuses to spawn the thread.
///
/// # Example
///
/// ```
/// use stream_capture::{spawn_consumer, CancelToken, CaptureBuffer};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let buffer = Arc::new(CaptureBuffer::new());
/// let handle = spawn_consumer("log", buffer.clone(), CancelToken::new(), |n: u32| {
///     println!("sample {n}");
/// })
/// .unwrap();
///
/// let _ = buffer.put_timeout(1, Duration::ZERO);
/// let presented = handle.stop();
/// assert!(presented <= 1);
/// ```
pub fn spawn_consumer<T, F>(
    name: impl Into<String>,
    buffer: Arc<CaptureBuffer<T>>,
    token: CancelToken,
    mut handler: F,
) -> io::Result<ConsumerHandle>
where
    T: Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    let name = name.into();
    let presented = Arc::new(AtomicU64::new(0));

    let thread = {
        let token = token.clone();
        let presented = presented.clone();
        let name = name.clone();
        thread::Builder::new()
            .name(format!("consumer-{name}"))
            .spawn(move || {
                tracing::debug!(consumer = %name, "consumer loop started");
                loop {
                    match buffer.take(&token) {
                        Ok(sample) => {
                            handler(sample);
                            presented.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(WaitError::Cancelled) => break,
                        Err(WaitError::Interrupted) => {
                            if token.is_cancelled() {
                                break;
                            }
                            tracing::trace!(consumer = %name, "interrupted, waiting again");
                        }
                    }
                }
                tracing::debug!(
                    consumer = %name,
                    presented = presented.load(Ordering::Relaxed),
                    "consumer loop exited"
                );
            })?
    };

    Ok(ConsumerHandle {
        name,
        token,
        presented,
        thread: Some(thread),
    })
}

/// Handle to a running consumer loop.
///
/// Call [`stop()`](Self::stop) for a graceful shutdown. Dropping the handle
/// also stops the loop and waits for the thread.
pub struct ConsumerHandle {
    name: String,
    token: CancelToken,
    presented: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl ConsumerHandle {
    /// Name the loop was spawned with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` while the consumer thread has not exited.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Number of samples handed to the handler so far.
    pub fn presented(&self) -> u64 {
        self.presented.load(Ordering::Relaxed)
    }

    /// Wakes the loop without stopping it.
    pub fn interrupt(&self) {
        self.token.interrupt();
    }

    /// Cancels the loop, waits for the thread to exit and returns the number
    /// of samples presented.
    pub fn stop(mut self) -> u64 {
        self.shutdown();
        self.presented()
    }

    /// Cancels the loop without waiting for the thread.
    ///
    /// A handler that is mid-sample finishes that sample, then the thread
    /// exits on its own. Returns the number of samples presented so far.
    pub fn detach(mut self) -> u64 {
        self.token.cancel();
        drop(self.thread.take());
        self.presented()
    }

    fn shutdown(&mut self) {
        self.token.cancel();
        let Some(thread) = self.thread.take() else {
            return;
        };
        if thread.thread().id() == thread::current().id() {
            // Stopped from inside the handler; the loop exits on its own.
            return;
        }
        if thread.join().is_err() {
            tracing::error!(consumer = %self.name, "consumer handler panicked");
        }
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ConsumerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerHandle")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .field("presented", &self.presented())
            .finish()
    }
}
