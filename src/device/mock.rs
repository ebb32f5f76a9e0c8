//! Mock backend for driving devices without hardware.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::{CaptureBackend, CapturedFile, DeviceState, PreviewSurface};
use crate::{BackendError, DeviceConfig};

/// A backend call recorded by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `initialize` was called.
    Initialize,
    /// `start_preview` was called with the named viewer's surface.
    StartPreview(String),
    /// `start_capture` was called.
    StartCapture,
    /// `pause` was called.
    Pause,
    /// `resume` was called towards the given state.
    Resume(DeviceState),
    /// `stop` was called.
    Stop,
    /// `destroy` was called.
    Destroy,
}

/// Read side of a [`MockBackend`]'s call log.
///
/// Stays valid after the backend has been moved into a device.
#[derive(Debug, Clone, Default)]
pub struct MockProbe {
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockProbe {
    /// Every call so far, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// How many recorded calls equal `call`.
    pub fn count(&self, call: &MockCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    /// The most recent call.
    pub fn last(&self) -> Option<MockCall> {
        self.calls.lock().last().cloned()
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().push(call);
    }
}

/// A scriptable [`CaptureBackend`] for tests and CI environments.
///
/// Configuration options read on `initialize`:
///
/// - `"no_device": true` - fail with [`BackendError::NoDeviceFound`]
/// - `"fail_preview": true` - make `start_preview` fail
/// - `"capture_dir": "<path>"` - persist a file per capture into the directory
/// - `"media_type": "<mime>"` - MIME type recorded for those files
///
/// # Example
///
/// ```
/// use stream_capture::{CaptureBackend, DeviceConfig, MockBackend, MockCall};
///
/// let mut backend = MockBackend::new();
/// let probe = backend.probe();
///
/// backend.initialize(&DeviceConfig::new()).unwrap();
/// assert_eq!(probe.calls(), vec![MockCall::Initialize]);
/// ```
#[derive(Debug, Default)]
pub struct MockBackend {
    probe: MockProbe,
    initialize_error: Option<BackendError>,
    fail_preview: bool,
    capture_dir: Option<PathBuf>,
    media_type: Option<String>,
    captures: u32,
}

impl MockBackend {
    /// Creates a backend that succeeds at everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `initialize` fail with `error`.
    #[must_use]
    pub fn failing_initialize(mut self, error: BackendError) -> Self {
        self.initialize_error = Some(error);
        self
    }

    /// Makes every `start_preview` fail.
    #[must_use]
    pub fn failing_preview(mut self) -> Self {
        self.fail_preview = true;
        self
    }

    /// Persists a file into `dir` on every capture.
    #[must_use]
    pub fn capturing_into(mut self, dir: impl Into<PathBuf>) -> Self {
        self.capture_dir = Some(dir.into());
        self
    }

    /// Returns a handle to the call log.
    pub fn probe(&self) -> MockProbe {
        self.probe.clone()
    }
}

impl CaptureBackend for MockBackend {
    fn initialize(&mut self, config: &DeviceConfig) -> Result<(), BackendError> {
        self.probe.record(MockCall::Initialize);

        if let Some(err) = &self.initialize_error {
            return Err(err.clone());
        }
        if config.get::<bool>("no_device") == Some(true) {
            return Err(BackendError::NoDeviceFound);
        }
        if let Some(value) = config.raw("capture_dir") {
            let dir = config
                .get::<String>("capture_dir")
                .ok_or_else(|| BackendError::UnsupportedOption {
                    key: "capture_dir".to_string(),
                    reason: format!("expected a path string, got {value}"),
                })?;
            self.capture_dir = Some(PathBuf::from(dir));
        }
        if let Some(fail) = config.get::<bool>("fail_preview") {
            self.fail_preview = fail;
        }
        if let Some(media_type) = config.get::<String>("media_type") {
            self.media_type = Some(media_type);
        }
        Ok(())
    }

    fn start_preview(&mut self, surface: &PreviewSurface) -> Result<(), BackendError> {
        self.probe.record(MockCall::StartPreview(surface.name.clone()));
        if self.fail_preview {
            return Err(BackendError::unavailable("preview surface rejected"));
        }
        Ok(())
    }

    fn start_capture(&mut self) -> Result<Option<CapturedFile>, BackendError> {
        self.probe.record(MockCall::StartCapture);

        let Some(dir) = &self.capture_dir else {
            return Ok(None);
        };
        self.captures += 1;
        let path = dir.join(format!("capture-{:04}.bin", self.captures));
        std::fs::write(&path, self.captures.to_le_bytes())
            .map_err(|e| BackendError::failed(format!("write {}: {e}", path.display())))?;

        let mut file = CapturedFile::new(path);
        if let Some(media_type) = &self.media_type {
            file = file.with_media_type(media_type.clone());
        }
        Ok(Some(file))
    }

    fn pause(&mut self) {
        self.probe.record(MockCall::Pause);
    }

    fn resume(&mut self, state: DeviceState) -> Result<(), BackendError> {
        self.probe.record(MockCall::Resume(state));
        Ok(())
    }

    fn stop(&mut self) {
        self.probe.record(MockCall::Stop);
    }

    fn destroy(&mut self) {
        self.probe.record(MockCall::Destroy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ViewerId;

    #[test]
    fn test_mock_records_calls_in_order() {
        let mut backend = MockBackend::new();
        let probe = backend.probe();

        backend.initialize(&DeviceConfig::new()).unwrap();
        backend
            .start_preview(&PreviewSurface {
                viewer: ViewerId::new(0),
                name: "screen".to_string(),
            })
            .unwrap();
        backend.pause();
        backend.resume(DeviceState::PreviewStarted).unwrap();
        backend.stop();
        backend.destroy();

        assert_eq!(
            probe.calls(),
            vec![
                MockCall::Initialize,
                MockCall::StartPreview("screen".to_string()),
                MockCall::Pause,
                MockCall::Resume(DeviceState::PreviewStarted),
                MockCall::Stop,
                MockCall::Destroy,
            ]
        );
        assert_eq!(probe.last(), Some(MockCall::Destroy));
    }

    #[test]
    fn test_mock_no_device_option() {
        let mut backend = MockBackend::new();
        let config = DeviceConfig::new().with("no_device", true);
        assert_eq!(
            backend.initialize(&config),
            Err(BackendError::NoDeviceFound)
        );
    }

    #[test]
    fn test_mock_rejects_bad_capture_dir() {
        let mut backend = MockBackend::new();
        let config = DeviceConfig::new().with("capture_dir", 5);
        let err = backend.initialize(&config).unwrap_err();
        assert!(matches!(err, BackendError::UnsupportedOption { .. }));
    }

    #[test]
    fn test_mock_capture_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = MockBackend::new();
        let config = DeviceConfig::new()
            .with("capture_dir", dir.path().to_string_lossy().to_string())
            .with("media_type", "application/octet-stream");
        backend.initialize(&config).unwrap();

        let file = backend.start_capture().unwrap().unwrap();
        assert!(file.path().exists());
        assert_eq!(file.media_type(), "application/octet-stream");
        assert!(file.path().ends_with("capture-0001.bin"));
    }

    #[test]
    fn test_mock_capture_without_dir() {
        let mut backend = MockBackend::new();
        assert_eq!(backend.start_capture().unwrap(), None);
    }
}
