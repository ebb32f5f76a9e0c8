//! Backend trait for device-specific hardware control.
//!
//! The lifecycle state machine lives in [`Device`](crate::Device); a
//! [`CaptureBackend`] only drives the hardware. The device calls it while
//! holding its transition lock, so backend methods never race each other.

use crate::device::{CapturedFile, DeviceState, ViewerId};
use crate::{BackendError, DeviceConfig};

/// The display surface a preview is rendered into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSurface {
    /// Viewer that owns the primary surface.
    pub viewer: ViewerId,
    /// That viewer's name.
    pub name: String,
}

/// Hardware control for one kind of capture device.
///
/// Implementations acquire resources in `initialize`, stream in
/// `start_preview`/`start_capture` and release everything in `destroy`.
/// Samples are not returned from these calls; the producing side of the
/// backend pushes them through [`Device::push_sample`](crate::Device::push_sample).
///
/// # Example
///
/// ```
/// use stream_capture::{BackendError, CaptureBackend, CapturedFile, DeviceConfig, PreviewSurface};
///
/// struct Microphone {
///     sample_rate: u32,
/// }
///
/// impl CaptureBackend for Microphone {
///     fn initialize(&mut self, config: &DeviceConfig) -> Result<(), BackendError> {
///         self.sample_rate = config.get("sample_rate").unwrap_or(16000);
///         Ok(())
///     }
///
///     fn start_preview(&mut self, _surface: &PreviewSurface) -> Result<(), BackendError> {
///         Ok(())
///     }
///
///     fn start_capture(&mut self) -> Result<Option<CapturedFile>, BackendError> {
///         Ok(None)
///     }
///
///     fn destroy(&mut self) {}
/// }
/// ```
pub trait CaptureBackend: Send {
    /// Acquires the hardware and applies `config`.
    ///
    /// # Errors
    ///
    /// Any error leaves the device in its previous state and makes
    /// [`Device::initialize`](crate::Device::initialize) return `false`.
    fn initialize(&mut self, config: &DeviceConfig) -> Result<(), BackendError>;

    /// Starts or resumes streaming preview into `surface`.
    ///
    /// # Errors
    ///
    /// On error the backend releases anything it acquired for the preview;
    /// the device state is left unchanged.
    fn start_preview(&mut self, surface: &PreviewSurface) -> Result<(), BackendError>;

    /// Starts capturing. Returns the file the capture persisted, if any.
    ///
    /// Output persisted later, from a hardware callback, is reported through
    /// [`Device::record_file`](crate::Device::record_file).
    ///
    /// # Errors
    ///
    /// On error the device state is left unchanged.
    fn start_capture(&mut self) -> Result<Option<CapturedFile>, BackendError>;

    /// Halts streaming without releasing resources.
    ///
    /// Default implementation does nothing.
    fn pause(&mut self) {}

    /// Resumes streaming into `state` after a pause.
    ///
    /// Default implementation does nothing.
    ///
    /// # Errors
    ///
    /// On error the device stays paused.
    fn resume(&mut self, state: DeviceState) -> Result<(), BackendError> {
        let _ = state;
        Ok(())
    }

    /// Stops preview and capture.
    ///
    /// Default implementation does nothing.
    fn stop(&mut self) {}

    /// Releases every resource acquired since `initialize`.
    fn destroy(&mut self);
}
