//! Capture devices: lifecycle state machine, viewer registry and sample fan-out.
//!
//! A [`Device<T>`] produces samples of type `T` and delivers each one into
//! the buffer of every registered viewer. Hardware control sits behind a
//! [`CaptureBackend`]; the device owns the state machine and decides when
//! the backend is called.

mod backend;
mod info;
mod mock;
mod state;
mod variant;
mod viewer_id;

pub use backend::{CaptureBackend, PreviewSurface};
pub use info::{CapturedFile, DeviceInfo, DeviceType, DEFAULT_MEDIA_TYPE};
pub use mock::{MockBackend, MockCall, MockProbe};
pub use state::{DeviceState, Transition};
pub use variant::CaptureDevice;
pub use viewer_id::ViewerId;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::builder::DeviceBuilder;
use crate::sample::Sample;
use crate::viewer::{CaptureView, Surface};
use crate::{
    BackendError, CancelToken, CaptureBuffer, CaptureError, CaptureEvent, Delivery, DeviceConfig,
    EventCallback, PipelineConfig,
};

use state::Lifecycle;

/// How [`Device::push_sample_with`] waits on a full viewer buffer.
#[derive(Debug, Clone, Copy)]
pub enum PutPolicy<'a> {
    /// Wait until space frees up or the token is signalled.
    Block(&'a CancelToken),
    /// Wait at most this long, then count the sample as lost for that viewer.
    Timeout(Duration),
}

/// What happened to one pushed sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[must_use]
pub struct FanOut {
    /// Viewer buffers that accepted the sample.
    pub delivered: usize,
    /// Viewer buffers that stayed full for the whole put window.
    pub dropped: usize,
    /// Viewer buffers whose blocking put was cancelled or interrupted.
    pub cancelled: usize,
    /// The device was not previewing or capturing; the sample was discarded.
    pub inactive: bool,
}

impl FanOut {
    fn discarded() -> Self {
        Self {
            inactive: true,
            ..Self::default()
        }
    }

    /// Number of viewers that did not receive the sample.
    pub fn lost(&self) -> usize {
        self.dropped + self.cancelled
    }

    /// Returns `true` if the device was streaming and every viewer got the sample.
    pub fn is_complete(&self) -> bool {
        !self.inactive && self.lost() == 0
    }
}

struct DeviceCore {
    lifecycle: Lifecycle,
    backend: Box<dyn CaptureBackend>,
}

struct Registration<T> {
    id: ViewerId,
    name: String,
    surface: Surface,
    view: Weak<dyn CaptureView>,
    buffer: Weak<CaptureBuffer<T>>,
}

impl<T> Registration<T> {
    fn is_live(&self) -> bool {
        self.view.strong_count() > 0
    }
}

/// A capture device producing samples of type `T`.
///
/// All methods take `&self`; share the device behind an `Arc` between the
/// producer, the UI and control code.
///
/// # Lifecycle
///
/// Transitions are serialized by a per-device lock. Every state change is
/// delivered to all registered viewers, in registration order, before the
/// triggering call returns. Viewer callbacks run while that lock is held,
/// so they must not call lifecycle operations on the same device.
///
/// # Example
///
/// ```
/// use stream_capture::{
///     presenter_fn, Device, DeviceConfig, DeviceInfo, DeviceState, DeviceType, FaceSample,
///     MockBackend, Surface, Viewer,
/// };
/// use std::sync::Arc;
///
/// let device: Device<FaceSample> = Device::new(
///     DeviceInfo::new("face", "Face Capture Device", DeviceType::Camera),
///     MockBackend::new(),
/// );
///
/// let screen = Arc::new(
///     Viewer::new("screen", presenter_fn(|face: FaceSample| println!("{face:?}")))
///         .on_surface(Surface::Primary),
/// );
/// device.add_viewer(screen.clone()).unwrap();
///
/// assert!(device.initialize(&DeviceConfig::new()));
/// device.start_preview().unwrap();
/// assert_eq!(device.state(), DeviceState::PreviewStarted);
///
/// device.stop();
/// ```
pub struct Device<T> {
    info: DeviceInfo,
    config: PipelineConfig,
    core: Mutex<DeviceCore>,
    state: AtomicU8,
    viewers: RwLock<Vec<Registration<T>>>,
    captured_files: Mutex<Vec<CapturedFile>>,
    next_viewer_id: AtomicU64,
    event_callback: Option<EventCallback>,
}

impl<T: Sample> Device<T> {
    /// Creates a device with the default [`PipelineConfig`] and no event callback.
    pub fn new(info: DeviceInfo, backend: impl CaptureBackend + 'static) -> Self {
        Self::from_parts(info, Box::new(backend), PipelineConfig::default(), None)
    }

    /// Returns a builder for configuring the device.
    pub fn builder(info: DeviceInfo, backend: impl CaptureBackend + 'static) -> DeviceBuilder<T> {
        DeviceBuilder::new(info, Box::new(backend))
    }

    pub(crate) fn from_parts(
        info: DeviceInfo,
        backend: Box<dyn CaptureBackend>,
        config: PipelineConfig,
        event_callback: Option<EventCallback>,
    ) -> Self {
        Self {
            info,
            config,
            core: Mutex::new(DeviceCore {
                lifecycle: Lifecycle::default(),
                backend,
            }),
            state: AtomicU8::new(DeviceState::Uninitialized.as_u8()),
            viewers: RwLock::new(Vec::new()),
            captured_files: Mutex::new(Vec::new()),
            next_viewer_id: AtomicU64::new(0),
            event_callback,
        }
    }

    /// Device identity.
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Device id, shorthand for `info().id`.
    pub fn id(&self) -> &str {
        &self.info.id
    }

    /// Buffer sizing and timing used by this device.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DeviceState {
        DeviceState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Creates a viewer buffer sized by this device's
    /// [`buffer_capacity`](PipelineConfig::buffer_capacity) and polling with
    /// its [`poll_timeout`](PipelineConfig::poll_timeout).
    pub fn new_buffer(&self) -> Arc<CaptureBuffer<T>> {
        let buffer = CaptureBuffer::with_capacity(self.config.buffer_capacity).unwrap_or_default();
        Arc::new(buffer.with_poll_timeout(self.config.poll_timeout))
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    /// Initializes the backend with `config`.
    ///
    /// Returns `false` if the backend fails (no device, resource busy,
    /// rejected option) or the device is currently previewing, capturing or
    /// paused. A failure leaves the state unchanged and is reported as a
    /// [`CaptureEvent::InitializeFailed`].
    pub fn initialize(&self, config: &DeviceConfig) -> bool {
        let mut core = self.core.lock();
        let current = core.lifecycle.state();

        if current.is_active() {
            tracing::warn!(device = %self.info.id, state = %current, "initialize rejected while active");
            self.emit(CaptureEvent::InitializeFailed {
                device_id: self.info.id.clone(),
                reason: format!("device is {current}"),
            });
            return false;
        }

        match core.backend.initialize(config) {
            Ok(()) => {
                let transition = core.lifecycle.set(DeviceState::Initialized);
                self.commit(transition);
                true
            }
            Err(e) => {
                tracing::warn!(device = %self.info.id, error = %e, "initialize failed");
                self.emit(CaptureEvent::InitializeFailed {
                    device_id: self.info.id.clone(),
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    /// Starts streaming preview into the primary surface.
    ///
    /// Valid from `Initialized` and `Paused`; a no-op while already
    /// previewing.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::InvalidStateTransition`] from any other state
    /// - [`CaptureError::NoPreviewSurface`] if no live viewer owns
    ///   [`Surface::Primary`]
    /// - [`CaptureError::Backend`] if the backend fails; the state is unchanged
    pub fn start_preview(&self) -> Result<Transition, CaptureError> {
        let mut core = self.core.lock();
        if !core.lifecycle.plan_preview()? {
            return Ok(Transition::Unchanged);
        }

        let surface = self.primary_surface().ok_or(CaptureError::NoPreviewSurface)?;
        core.backend
            .start_preview(&surface)
            .map_err(|e| self.backend_failure("start_preview", &e))?;

        let transition = core.lifecycle.set(DeviceState::PreviewStarted);
        self.commit(transition);
        Ok(transition)
    }

    /// Starts capturing.
    ///
    /// Valid from `Initialized` and `PreviewStarted`; a no-op while already
    /// capturing. A file persisted by the backend is appended to
    /// [`captured_files`](Self::captured_files).
    ///
    /// # Errors
    ///
    /// - [`CaptureError::InvalidStateTransition`] from any other state
    /// - [`CaptureError::Backend`] if the backend fails; the state is unchanged
    pub fn start_capture(&self) -> Result<Transition, CaptureError> {
        let mut core = self.core.lock();
        if !core.lifecycle.plan_capture()? {
            return Ok(Transition::Unchanged);
        }

        let file = core
            .backend
            .start_capture()
            .map_err(|e| self.backend_failure("start_capture", &e))?;

        let transition = core.lifecycle.set(DeviceState::CaptureStarted);
        if let Some(file) = file {
            self.record_file(file);
        }
        self.commit(transition);
        Ok(transition)
    }

    /// Pauses preview and capture, remembering which one was running.
    ///
    /// A no-op when already paused, uninitialized or initialized.
    ///
    /// # Errors
    ///
    /// [`CaptureError::InvalidStateTransition`] if the device is stopped.
    pub fn pause(&self) -> Result<Transition, CaptureError> {
        let mut core = self.core.lock();
        let Some(prior) = core.lifecycle.plan_pause()? else {
            return Ok(Transition::Unchanged);
        };

        core.backend.pause();
        let transition = core.lifecycle.apply_pause(prior);
        self.commit(transition);
        Ok(transition)
    }

    /// Returns a paused device to the state it was paused from.
    ///
    /// A no-op unless paused.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::InvalidStateTransition`] if the device is stopped
    /// - [`CaptureError::Backend`] if the backend cannot resume; the device
    ///   stays paused
    pub fn resume(&self) -> Result<Transition, CaptureError> {
        let mut core = self.core.lock();
        let Some(target) = core.lifecycle.plan_resume()? else {
            return Ok(Transition::Unchanged);
        };

        core.backend
            .resume(target)
            .map_err(|e| self.backend_failure("resume", &e))?;
        let transition = core.lifecycle.set(target);
        self.commit(transition);
        Ok(transition)
    }

    /// Stops preview and capture. Valid from every state.
    ///
    /// Viewers are only notified if the device was not already stopped.
    pub fn stop(&self) -> Transition {
        let mut core = self.core.lock();
        if core.lifecycle.state() != DeviceState::Stopped {
            core.backend.stop();
        }
        let transition = core.lifecycle.set(DeviceState::Stopped);
        self.commit(transition);
        transition
    }

    /// Stops the device if needed, releases backend resources and returns
    /// to `Uninitialized`.
    ///
    /// The device can be initialized again afterwards.
    pub fn destroy(&self) -> Transition {
        let mut core = self.core.lock();
        if core.lifecycle.state().is_active() {
            core.backend.stop();
        }
        core.backend.destroy();
        let transition = core.lifecycle.set(DeviceState::Uninitialized);
        self.commit(transition);
        transition
    }

    fn commit(&self, transition: Transition) {
        let Transition::Changed { from, to } = transition else {
            return;
        };
        self.state.store(to.as_u8(), Ordering::SeqCst);
        tracing::debug!(device = %self.info.id, %from, %to, "state changed");

        self.broadcast(to);
        self.emit(CaptureEvent::StateChanged {
            device_id: self.info.id.clone(),
            previous: from,
            current: to,
        });
    }

    fn broadcast(&self, state: DeviceState) {
        let live: Vec<(ViewerId, String, Arc<dyn CaptureView>)> = {
            let viewers = self.viewers.read();
            viewers
                .iter()
                .filter_map(|r| r.view.upgrade().map(|v| (r.id, r.name.clone(), v)))
                .collect()
        };

        for (id, name, view) in live {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| view.on_state_changed(state)));
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
            };
            tracing::warn!(device = %self.info.id, viewer = %name, %state, %error, "viewer state callback failed");
            self.emit(CaptureEvent::ViewerCallbackFailed {
                viewer: id,
                name,
                error,
            });
        }

        self.prune();
    }

    fn backend_failure(&self, operation: &str, err: &BackendError) -> CaptureError {
        tracing::warn!(device = %self.info.id, operation, error = %err, "backend failed");
        CaptureError::Backend {
            device: self.info.id.clone(),
            reason: err.to_string(),
        }
    }

    // ---------------------------------------------------------------
    // Captured files
    // ---------------------------------------------------------------

    /// Records a file persisted outside [`start_capture`](Self::start_capture),
    /// such as from an asynchronous picture callback.
    pub fn record_file(&self, file: CapturedFile) {
        tracing::debug!(device = %self.info.id, path = %file.path().display(), "file captured");
        self.emit(CaptureEvent::FileCaptured {
            device_id: self.info.id.clone(),
            path: file.path().to_path_buf(),
            media_type: file.media_type().to_string(),
        });
        self.captured_files.lock().push(file);
    }

    /// Files persisted by this device, oldest first.
    pub fn captured_files(&self) -> Vec<CapturedFile> {
        self.captured_files.lock().clone()
    }

    /// Number of files persisted by this device.
    pub fn captured_file_count(&self) -> usize {
        self.captured_files.lock().len()
    }

    // ---------------------------------------------------------------
    // Viewer registry
    // ---------------------------------------------------------------

    /// Registers a viewer. The device keeps only a weak reference to it.
    ///
    /// A viewer registered while the device is already streaming is not
    /// told the current state; start its consumer directly.
    ///
    /// # Errors
    ///
    /// Nothing is registered when an error is returned.
    ///
    /// - [`CaptureError::InvalidArgument`] if the viewer is already registered
    /// - [`CaptureError::PrimarySurfaceTaken`] if it wants the primary
    ///   surface and another live viewer owns it
    /// - [`CaptureError::TypeMismatch`] if its buffer does not carry `T`
    pub fn add_viewer(&self, view: Arc<dyn CaptureView>) -> Result<ViewerId, CaptureError> {
        let name = view.name().to_string();
        let surface = view.surface();
        let handle = view.buffer();
        let ptr = Arc::as_ptr(&view).cast::<()>();

        let mut viewers = self.viewers.write();

        let duplicate = viewers.iter().any(|r| {
            r.view
                .upgrade()
                .is_some_and(|v| Arc::as_ptr(&v).cast::<()>() == ptr)
        });
        if duplicate {
            return Err(CaptureError::invalid_argument(format!(
                "viewer '{name}' is already registered"
            )));
        }

        if surface == Surface::Primary {
            if let Some(existing) = viewers
                .iter()
                .find(|r| r.surface == Surface::Primary && r.is_live())
            {
                return Err(CaptureError::PrimarySurfaceTaken {
                    existing: existing.name.clone(),
                });
            }
        }

        let buffer = handle
            .downcast::<T>()
            .ok_or_else(|| CaptureError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                actual: handle.sample_type(),
            })?;

        let id = ViewerId::new(self.next_viewer_id.fetch_add(1, Ordering::Relaxed));
        viewers.push(Registration {
            id,
            name: name.clone(),
            surface,
            view: Arc::downgrade(&view),
            buffer: Arc::downgrade(&buffer),
        });
        drop(viewers);

        tracing::debug!(device = %self.info.id, %id, viewer = %name, ?surface, "viewer added");
        self.emit(CaptureEvent::ViewerAdded {
            device_id: self.info.id.clone(),
            viewer: id,
            name,
        });
        self.prune();
        Ok(id)
    }

    /// Unregisters a viewer. Returns `false` if it was not registered.
    pub fn remove_viewer(&self, id: ViewerId) -> bool {
        let removed = {
            let mut viewers = self.viewers.write();
            match viewers.iter().position(|r| r.id == id) {
                Some(index) => {
                    viewers.remove(index);
                    true
                }
                None => false,
            }
        };

        if removed {
            tracing::debug!(device = %self.info.id, %id, "viewer removed");
            self.emit(CaptureEvent::ViewerRemoved {
                device_id: self.info.id.clone(),
                viewer: id,
            });
        }
        removed
    }

    /// Number of registered viewers that are still alive.
    pub fn viewer_count(&self) -> usize {
        self.viewers.read().iter().filter(|r| r.is_live()).count()
    }

    /// Handles of the live registered viewers, in registration order.
    pub fn viewer_ids(&self) -> Vec<ViewerId> {
        self.viewers
            .read()
            .iter()
            .filter(|r| r.is_live())
            .map(|r| r.id)
            .collect()
    }

    fn primary_surface(&self) -> Option<PreviewSurface> {
        self.viewers
            .read()
            .iter()
            .find(|r| r.surface == Surface::Primary && r.is_live())
            .map(|r| PreviewSurface {
                viewer: r.id,
                name: r.name.clone(),
            })
    }

    /// Drops registrations whose viewer no longer exists.
    fn prune(&self) {
        let pruned: Vec<ViewerId> = {
            let viewers = self.viewers.upgradable_read();
            if viewers.iter().all(Registration::is_live) {
                return;
            }
            let mut viewers = parking_lot::RwLockUpgradableReadGuard::upgrade(viewers);
            let pruned = viewers
                .iter()
                .filter(|r| !r.is_live())
                .map(|r| r.id)
                .collect();
            viewers.retain(Registration::is_live);
            pruned
        };

        for id in pruned {
            tracing::debug!(device = %self.info.id, %id, "pruned dropped viewer");
            self.emit(CaptureEvent::ViewerRemoved {
                device_id: self.info.id.clone(),
                viewer: id,
            });
        }
    }

    // ---------------------------------------------------------------
    // Fan-out
    // ---------------------------------------------------------------

    /// Delivers a sample to every viewer, waiting at most the configured
    /// put timeout on each full buffer.
    ///
    /// Samples pushed while the device is neither previewing nor capturing
    /// are discarded.
    pub fn push_sample(&self, sample: T) -> FanOut {
        self.push_sample_with(sample, PutPolicy::Timeout(self.config.put_timeout))
    }

    /// Delivers a sample to every viewer using `policy` for full buffers.
    ///
    /// Viewers are served in registration order. A viewer that loses the
    /// sample is reported as a [`CaptureEvent::SampleDropped`].
    pub fn push_sample_with(&self, sample: T, policy: PutPolicy<'_>) -> FanOut {
        let state = self.state();
        if !state.is_streaming() {
            tracing::trace!(device = %self.info.id, %state, "sample discarded while inactive");
            return FanOut::discarded();
        }

        let targets: Vec<(ViewerId, Arc<CaptureBuffer<T>>)> = self
            .viewers
            .read()
            .iter()
            .filter(|r| r.is_live())
            .filter_map(|r| r.buffer.upgrade().map(|b| (r.id, b)))
            .collect();

        let mut fan_out = FanOut::default();
        let Some(((last_id, last_buffer), rest)) = targets.split_last() else {
            return fan_out;
        };
        for (id, buffer) in rest {
            self.deliver(*id, buffer, sample.clone(), policy, &mut fan_out);
        }
        self.deliver(*last_id, last_buffer, sample, policy, &mut fan_out);
        fan_out
    }

    fn deliver(
        &self,
        id: ViewerId,
        buffer: &CaptureBuffer<T>,
        sample: T,
        policy: PutPolicy<'_>,
        fan_out: &mut FanOut,
    ) {
        let lost = match policy {
            PutPolicy::Timeout(timeout) => match buffer.put_timeout(sample, timeout) {
                Delivery::Delivered => false,
                Delivery::Dropped(_) => {
                    fan_out.dropped += 1;
                    true
                }
            },
            PutPolicy::Block(token) => match buffer.put(sample, token) {
                Ok(()) => false,
                Err(_) => {
                    fan_out.cancelled += 1;
                    true
                }
            },
        };

        if !lost {
            fan_out.delivered += 1;
            return;
        }

        let lost_total = buffer.loss_count();
        tracing::warn!(device = %self.info.id, viewer = %id, lost_total, "viewer buffer full, sample dropped");
        self.emit(CaptureEvent::SampleDropped {
            device_id: self.info.id.clone(),
            viewer: id,
            lost_total,
        });
    }

    fn emit(&self, event: CaptureEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

impl<T> std::fmt::Debug for Device<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("info", &self.info)
            .field(
                "state",
                &DeviceState::from_u8(self.state.load(Ordering::SeqCst)),
            )
            .field("viewers", &self.viewers.read().len())
            .finish_non_exhaustive()
    }
}
