//! Closed set of device kinds.

use std::sync::Arc;

use crate::device::{CapturedFile, Device, DeviceInfo, DeviceState, Transition, ViewerId};
use crate::sample::{AudioFrame, FaceSample, FingerprintScan};
use crate::viewer::CaptureView;
use crate::{CaptureError, DeviceConfig};

/// A capture device of any supported kind.
///
/// Lets control code (settings screens, device pickers, lifecycle hooks)
/// hold devices of different sample types in one collection. Producers and
/// presenters work with the typed [`Device`] via the `as_*` accessors.
///
/// # Example
///
/// ```
/// use stream_capture::{
///     AudioFrame, CaptureDevice, Device, DeviceInfo, DeviceState, DeviceType, FaceSample,
///     MockBackend,
/// };
///
/// let face = DeviceInfo::new("face", "Face", DeviceType::Camera);
/// let mic = DeviceInfo::new("mic", "Mic", DeviceType::Microphone);
/// let devices: Vec<CaptureDevice> = vec![
///     Device::<FaceSample>::new(face, MockBackend::new()).into(),
///     Device::<AudioFrame>::new(mic, MockBackend::new()).into(),
/// ];
///
/// for device in &devices {
///     device.stop();
///     assert_eq!(device.state(), DeviceState::Stopped);
/// }
/// ```
#[derive(Debug)]
pub enum CaptureDevice {
    /// Camera producing face locations.
    Face(Device<FaceSample>),
    /// Microphone producing audio frames.
    Voice(Device<AudioFrame>),
    /// Fingerprint sensor producing scans.
    Fingerprint(Device<FingerprintScan>),
}

macro_rules! dispatch {
    ($self:expr, $device:ident => $body:expr) => {
        match $self {
            CaptureDevice::Face($device) => $body,
            CaptureDevice::Voice($device) => $body,
            CaptureDevice::Fingerprint($device) => $body,
        }
    };
}

impl CaptureDevice {
    /// Device identity.
    pub fn info(&self) -> &DeviceInfo {
        dispatch!(self, d => d.info())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DeviceState {
        dispatch!(self, d => d.state())
    }

    /// Name of the sample type this device produces.
    pub fn sample_type(&self) -> &'static str {
        match self {
            Self::Face(_) => std::any::type_name::<FaceSample>(),
            Self::Voice(_) => std::any::type_name::<AudioFrame>(),
            Self::Fingerprint(_) => std::any::type_name::<FingerprintScan>(),
        }
    }

    /// See [`Device::initialize`].
    pub fn initialize(&self, config: &DeviceConfig) -> bool {
        dispatch!(self, d => d.initialize(config))
    }

    /// See [`Device::start_preview`].
    ///
    /// # Errors
    ///
    /// As [`Device::start_preview`].
    pub fn start_preview(&self) -> Result<Transition, CaptureError> {
        dispatch!(self, d => d.start_preview())
    }

    /// See [`Device::start_capture`].
    ///
    /// # Errors
    ///
    /// As [`Device::start_capture`].
    pub fn start_capture(&self) -> Result<Transition, CaptureError> {
        dispatch!(self, d => d.start_capture())
    }

    /// See [`Device::pause`].
    ///
    /// # Errors
    ///
    /// As [`Device::pause`].
    pub fn pause(&self) -> Result<Transition, CaptureError> {
        dispatch!(self, d => d.pause())
    }

    /// See [`Device::resume`].
    ///
    /// # Errors
    ///
    /// As [`Device::resume`].
    pub fn resume(&self) -> Result<Transition, CaptureError> {
        dispatch!(self, d => d.resume())
    }

    /// See [`Device::stop`].
    pub fn stop(&self) -> Transition {
        dispatch!(self, d => d.stop())
    }

    /// See [`Device::destroy`].
    pub fn destroy(&self) -> Transition {
        dispatch!(self, d => d.destroy())
    }

    /// See [`Device::add_viewer`].
    ///
    /// # Errors
    ///
    /// As [`Device::add_viewer`]; a viewer of another sample type gets
    /// [`CaptureError::TypeMismatch`].
    pub fn add_viewer(&self, view: Arc<dyn CaptureView>) -> Result<ViewerId, CaptureError> {
        dispatch!(self, d => d.add_viewer(view))
    }

    /// See [`Device::remove_viewer`].
    pub fn remove_viewer(&self, id: ViewerId) -> bool {
        dispatch!(self, d => d.remove_viewer(id))
    }

    /// See [`Device::viewer_count`].
    pub fn viewer_count(&self) -> usize {
        dispatch!(self, d => d.viewer_count())
    }

    /// See [`Device::captured_files`].
    pub fn captured_files(&self) -> Vec<CapturedFile> {
        dispatch!(self, d => d.captured_files())
    }

    /// See [`Device::captured_file_count`].
    pub fn captured_file_count(&self) -> usize {
        dispatch!(self, d => d.captured_file_count())
    }

    /// The face device, if this is one.
    pub fn as_face(&self) -> Option<&Device<FaceSample>> {
        match self {
            Self::Face(d) => Some(d),
            _ => None,
        }
    }

    /// The voice device, if this is one.
    pub fn as_voice(&self) -> Option<&Device<AudioFrame>> {
        match self {
            Self::Voice(d) => Some(d),
            _ => None,
        }
    }

    /// The fingerprint device, if this is one.
    pub fn as_fingerprint(&self) -> Option<&Device<FingerprintScan>> {
        match self {
            Self::Fingerprint(d) => Some(d),
            _ => None,
        }
    }
}

impl From<Device<FaceSample>> for CaptureDevice {
    fn from(device: Device<FaceSample>) -> Self {
        Self::Face(device)
    }
}

impl From<Device<AudioFrame>> for CaptureDevice {
    fn from(device: Device<AudioFrame>) -> Self {
        Self::Voice(device)
    }
}

impl From<Device<FingerprintScan>> for CaptureDevice {
    fn from(device: Device<FingerprintScan>) -> Self {
        Self::Fingerprint(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{presenter_fn, DeviceType, MockBackend, Viewer};

    fn voice() -> CaptureDevice {
        Device::<AudioFrame>::new(
            DeviceInfo::new("mic", "Microphone", DeviceType::Microphone),
            MockBackend::new(),
        )
        .into()
    }

    #[test]
    fn test_variant_accessors() {
        let device = voice();
        assert!(device.as_voice().is_some());
        assert!(device.as_face().is_none());
        assert!(device.as_fingerprint().is_none());
        assert!(device.sample_type().ends_with("AudioFrame"));
        assert_eq!(device.info().id, "mic");
    }

    #[test]
    fn test_variant_rejects_foreign_viewer() {
        let device = voice();
        let viewer = Arc::new(Viewer::new("faces", presenter_fn(|_: FaceSample| {})));
        let err = device.add_viewer(viewer).unwrap_err();
        assert_eq!(err.code(), "error.capture.invalid.device.buffer.type");
        assert_eq!(device.viewer_count(), 0);
    }

    #[test]
    fn test_variant_lifecycle_dispatch() {
        let device = voice();
        assert!(device.initialize(&DeviceConfig::new()));
        assert!(device.start_capture().unwrap().is_changed());
        assert!(device.pause().unwrap().is_changed());
        assert!(device.resume().unwrap().is_changed());
        assert_eq!(device.state(), DeviceState::CaptureStarted);
        assert!(device.destroy().is_changed());
        assert_eq!(device.state(), DeviceState::Uninitialized);
    }
}
