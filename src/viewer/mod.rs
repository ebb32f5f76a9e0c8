//! Viewers - the consuming side of a capture device.
//!
//! A [`CaptureView`] is anything a [`Device`](crate::Device) can register:
//! it supplies a buffer for the device to fill and receives lifecycle
//! notifications. The crate provides one implementation:
//!
//! - [`Viewer`]: owns a [`CaptureBuffer`], runs a consumer loop and hands
//!   every sample to a [`Presenter`]
//!
//! Presenters are where samples leave the pipeline: drawing an overlay,
//! feeding a matcher, or forwarding into an async runtime with
//! [`ChannelPresenter`].

mod channel;

pub use channel::ChannelPresenter;

use std::any::Any;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::DeviceState;
use crate::{spawn_consumer, BufferStats, CancelToken, CaptureBuffer, ConsumerHandle, ViewError};

/// Display surface a viewer renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Surface {
    /// The single surface a device renders its live preview into. At most
    /// one registered viewer per device may own it.
    Primary,
    /// Any other consumer: overlays, recorders, analysers.
    #[default]
    Auxiliary,
}

/// Type-erased handle to a viewer's buffer.
///
/// A device recovers the typed buffer with [`downcast`](Self::downcast); a
/// buffer of the wrong sample type is rejected at registration.
#[derive(Clone)]
pub struct BufferHandle {
    buffer: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl BufferHandle {
    /// Wraps a typed buffer.
    pub fn new<T: Send + 'static>(buffer: Arc<CaptureBuffer<T>>) -> Self {
        Self {
            buffer,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Name of the buffer's sample type.
    pub fn sample_type(&self) -> &'static str {
        self.type_name
    }

    /// Returns the typed buffer if it carries `T` samples.
    pub fn downcast<T: Send + 'static>(&self) -> Option<Arc<CaptureBuffer<T>>> {
        Arc::clone(&self.buffer).downcast::<CaptureBuffer<T>>().ok()
    }
}

impl std::fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferHandle")
            .field("sample_type", &self.type_name)
            .finish()
    }
}

/// A consumer that can be registered with a capture device.
///
/// # Implementation Notes
///
/// - `on_state_changed` runs synchronously on the thread performing the
///   transition, while the device holds its transition lock. It must return
///   quickly and must not call lifecycle operations on the same device.
/// - An error or panic from `on_state_changed` is logged and reported as a
///   [`CaptureEvent::ViewerCallbackFailed`](crate::CaptureEvent::ViewerCallbackFailed);
///   other viewers are still notified.
/// - The device keeps only weak references: dropping the last `Arc` to a
///   viewer unregisters it.
pub trait CaptureView: Send + Sync {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// Surface this viewer renders into.
    ///
    /// Default: [`Surface::Auxiliary`].
    fn surface(&self) -> Surface {
        Surface::Auxiliary
    }

    /// The buffer the device delivers samples into.
    fn buffer(&self) -> BufferHandle;

    /// Called after every device state change.
    ///
    /// Default implementation does nothing.
    ///
    /// # Errors
    ///
    /// Errors are isolated by the device; see the trait documentation.
    fn on_state_changed(&self, state: DeviceState) -> Result<(), ViewError> {
        let _ = state;
        Ok(())
    }
}

/// Receives samples drained from a viewer buffer.
///
/// `on_sample` runs on the viewer's consumer thread, one sample at a time,
/// in delivery order. A slow presenter only makes its own viewer lose
/// samples.
pub trait Presenter<T>: Send + Sync {
    /// Handles one sample.
    fn on_sample(&self, sample: T);

    /// Called after every device state change, from
    /// [`CaptureView::on_state_changed`].
    ///
    /// Default implementation does nothing.
    ///
    /// # Errors
    ///
    /// Errors are reported by the device and do not affect other viewers.
    fn on_state_changed(&self, state: DeviceState) -> Result<(), ViewError> {
        let _ = state;
        Ok(())
    }
}

/// A [`Presenter`] backed by a closure. Created by [`presenter_fn`].
pub struct FnPresenter<F>(F);

impl<T, F> Presenter<T> for FnPresenter<F>
where
    F: Fn(T) + Send + Sync,
{
    fn on_sample(&self, sample: T) {
        (self.0)(sample);
    }
}

/// Creates a [`Presenter`] from a closure.
///
/// # Example
///
/// ```
/// use stream_capture::{presenter_fn, FaceSample, Viewer};
///
/// let viewer = Viewer::new("log", presenter_fn(|face: FaceSample| {
///     println!("face {} at {:?}", face.tracking_id, face.bounds);
/// }));
/// ```
pub fn presenter_fn<F>(f: F) -> FnPresenter<F> {
    FnPresenter(f)
}

/// Snapshot of a viewer's delivery statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewerStats {
    /// Samples handed to the presenter by the current consumer loop.
    pub presented: u64,
    /// The viewer buffer's counters.
    pub buffer: BufferStats,
}

/// The stock [`CaptureView`]: a buffer, a consumer loop and a presenter.
///
/// The consumer loop follows the device lifecycle: it is started when the
/// device begins previewing or capturing and cancelled when the device stops
/// or is destroyed. While paused, the loop stays parked on the empty buffer.
///
/// Cancelling on a device transition does not wait for the consumer thread,
/// so a presenter stuck on one sample cannot hold up
/// [`Device::stop`](crate::Device::stop). The thread exits once that sample
/// is handled.
///
/// # Example
///
/// ```
/// use stream_capture::{presenter_fn, AudioFrame, Surface, Viewer};
/// use std::sync::Arc;
///
/// let viewer = Arc::new(
///     Viewer::new("waveform", presenter_fn(|frame: AudioFrame| {
///         let _ = frame.duration();
///     }))
///     .on_surface(Surface::Primary),
/// );
/// assert!(!viewer.is_running());
/// ```
pub struct Viewer<T> {
    name: String,
    surface: Surface,
    buffer: Arc<CaptureBuffer<T>>,
    presenter: Arc<dyn Presenter<T>>,
    consumer: Mutex<Option<ConsumerHandle>>,
}

impl<T: Send + 'static> Viewer<T> {
    /// Creates an auxiliary viewer with a default-sized buffer.
    pub fn new(name: impl Into<String>, presenter: impl Presenter<T> + 'static) -> Self {
        Self::with_buffer(name, Arc::new(CaptureBuffer::new()), presenter)
    }

    /// Creates an auxiliary viewer draining `buffer`.
    pub fn with_buffer(
        name: impl Into<String>,
        buffer: Arc<CaptureBuffer<T>>,
        presenter: impl Presenter<T> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            surface: Surface::Auxiliary,
            buffer,
            presenter: Arc::new(presenter),
            consumer: Mutex::new(None),
        }
    }

    /// Sets the surface the viewer renders into.
    #[must_use]
    pub fn on_surface(mut self, surface: Surface) -> Self {
        self.surface = surface;
        self
    }

    /// Starts the consumer loop. Does nothing if it is already running.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the consumer thread cannot be spawned.
    pub fn start(&self) -> io::Result<()> {
        let mut consumer = self.consumer.lock();
        if consumer.as_ref().is_some_and(ConsumerHandle::is_running) {
            return Ok(());
        }
        let presenter = Arc::clone(&self.presenter);
        let handle = spawn_consumer(
            self.name.clone(),
            Arc::clone(&self.buffer),
            CancelToken::new(),
            move |sample| presenter.on_sample(sample),
        )?;
        *consumer = Some(handle);
        Ok(())
    }

    /// Stops the consumer loop, waits for its thread and returns how many
    /// samples it presented.
    ///
    /// Samples still in the buffer stay there. Blocks until the presenter
    /// returns from the sample it is handling.
    pub fn stop(&self) -> u64 {
        let handle = self.consumer.lock().take();
        handle.map_or(0, ConsumerHandle::stop)
    }

    /// Cancels the consumer loop without waiting for its thread.
    fn halt(&self) -> u64 {
        let handle = self.consumer.lock().take();
        handle.map_or(0, ConsumerHandle::detach)
    }

    /// Wakes the consumer loop without stopping it.
    pub fn interrupt(&self) {
        if let Some(handle) = self.consumer.lock().as_ref() {
            handle.interrupt();
        }
    }

    /// Returns `true` while the consumer loop is running.
    pub fn is_running(&self) -> bool {
        self.consumer
            .lock()
            .as_ref()
            .is_some_and(ConsumerHandle::is_running)
    }

    /// The viewer's buffer.
    pub fn buffer(&self) -> &Arc<CaptureBuffer<T>> {
        &self.buffer
    }

    /// Delivery statistics.
    pub fn stats(&self) -> ViewerStats {
        ViewerStats {
            presented: self
                .consumer
                .lock()
                .as_ref()
                .map_or(0, ConsumerHandle::presented),
            buffer: self.buffer.stats(),
        }
    }
}

impl<T: Send + 'static> CaptureView for Viewer<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn surface(&self) -> Surface {
        self.surface
    }

    fn buffer(&self) -> BufferHandle {
        BufferHandle::new(Arc::clone(&self.buffer))
    }

    fn on_state_changed(&self, state: DeviceState) -> Result<(), ViewError> {
        tracing::debug!(viewer = %self.name, %state, "viewer state changed");
        match state {
            DeviceState::PreviewStarted | DeviceState::CaptureStarted => {
                self.start()
                    .map_err(|e| ViewError::new(format!("cannot start consumer: {e}")))?;
            }
            DeviceState::Stopped | DeviceState::Uninitialized => {
                // Runs under the device lock: signal the loop, never join here.
                let presented = self.halt();
                tracing::debug!(viewer = %self.name, presented, "consumer stopped");
            }
            DeviceState::Initialized | DeviceState::Paused => {}
        }
        self.presenter.on_state_changed(state)
    }
}

impl<T> Drop for Viewer<T> {
    fn drop(&mut self) {
        // The last reference can go away inside a device broadcast.
        if let Some(handle) = self.consumer.get_mut().take() {
            handle.detach();
        }
    }
}

impl<T> std::fmt::Debug for Viewer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("name", &self.name)
            .field("surface", &self.surface)
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{Duration, Instant};

    struct Counting {
        samples: AtomicU64,
        states: parking_lot::Mutex<Vec<DeviceState>>,
    }

    impl Presenter<u32> for Arc<Counting> {
        fn on_sample(&self, _sample: u32) {
            self.samples.fetch_add(1, Ordering::SeqCst);
        }

        fn on_state_changed(&self, state: DeviceState) -> Result<(), ViewError> {
            self.states.lock().push(state);
            Ok(())
        }
    }

    fn counting() -> Arc<Counting> {
        Arc::new(Counting {
            samples: AtomicU64::new(0),
            states: parking_lot::Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn test_buffer_handle_downcast() {
        let buffer = Arc::new(CaptureBuffer::<u32>::new());
        let handle = BufferHandle::new(buffer.clone());
        assert!(handle.sample_type().contains("u32"));

        let typed = handle.downcast::<u32>().unwrap();
        assert!(Arc::ptr_eq(&typed, &buffer));
        assert!(handle.downcast::<String>().is_none());
    }

    #[test]
    fn test_default_surface_is_auxiliary() {
        let viewer = Viewer::new("aux", presenter_fn(|_: u32| {}));
        assert_eq!(CaptureView::surface(&viewer), Surface::Auxiliary);

        let primary = Viewer::new("main", presenter_fn(|_: u32| {})).on_surface(Surface::Primary);
        assert_eq!(CaptureView::surface(&primary), Surface::Primary);
    }

    #[test]
    fn test_viewer_follows_lifecycle() {
        let presenter = counting();
        let viewer = Viewer::new("lifecycle", presenter.clone());

        viewer.on_state_changed(DeviceState::PreviewStarted).unwrap();
        assert!(viewer.is_running());

        assert!(viewer.buffer().put_timeout(1, Duration::ZERO).is_delivered());
        let deadline = Instant::now() + Duration::from_secs(5);
        while presenter.samples.load(Ordering::SeqCst) < 1 {
            assert!(Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(2));
        }

        viewer.on_state_changed(DeviceState::Paused).unwrap();
        assert!(viewer.is_running());

        viewer.on_state_changed(DeviceState::Stopped).unwrap();
        assert!(!viewer.is_running());

        assert_eq!(
            *presenter.states.lock(),
            vec![
                DeviceState::PreviewStarted,
                DeviceState::Paused,
                DeviceState::Stopped
            ]
        );
    }

    #[test]
    fn test_start_is_idempotent() {
        let viewer = Viewer::new("twice", presenter_fn(|_: u32| {}));
        viewer.start().unwrap();
        viewer.start().unwrap();
        assert!(viewer.is_running());
        assert_eq!(viewer.stop(), 0);
        assert_eq!(viewer.stop(), 0);
    }

    #[test]
    fn test_stats_include_buffer() {
        let viewer = Viewer::with_buffer(
            "stats",
            Arc::new(CaptureBuffer::with_capacity(1).unwrap()),
            presenter_fn(|_: u32| {}),
        );
        let _ = viewer.buffer().put_timeout(1, Duration::ZERO);
        let _ = viewer.buffer().put_timeout(2, Duration::ZERO);

        let stats = viewer.stats();
        assert_eq!(stats.presented, 0);
        assert_eq!(stats.buffer.accepted, 1);
        assert_eq!(stats.buffer.rejected, 1);
    }
}
