//! Device identity and captured-file records.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// MIME type recorded when a backend does not say what it wrote.
pub const DEFAULT_MEDIA_TYPE: &str = "*/*";

/// Kind of biometric hardware behind a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    /// Not reported.
    #[default]
    Unknown,
    /// Still or preview camera.
    Camera,
    /// Audio input.
    Microphone,
    /// Fingerprint sensor.
    Fingerprint,
    /// Video recorder.
    Video,
}

/// Identity of a capture device.
///
/// # Example
///
/// ```
/// use stream_capture::{DeviceInfo, DeviceType};
///
/// let info = DeviceInfo::new("face.front", "Face Capture Device", DeviceType::Camera)
///     .with_version("1.0")
///     .with_vendor("OpenBiometrix");
/// assert_eq!(info.id, "face.front");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Unique device identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Device or driver version.
    #[serde(default)]
    pub version: String,
    /// Vendor name.
    #[serde(default)]
    pub vendor: String,
    /// Hardware kind.
    #[serde(default)]
    pub device_type: DeviceType,
}

impl DeviceInfo {
    /// Creates an identity with empty version and vendor.
    pub fn new(id: impl Into<String>, name: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: String::new(),
            vendor: String::new(),
            device_type,
        }
    }

    /// Sets the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the vendor.
    #[must_use]
    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }
}

/// A file persisted by a capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedFile {
    path: PathBuf,
    media_type: String,
}

impl CapturedFile {
    /// Records a file of unknown type (`*/*`).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            media_type: DEFAULT_MEDIA_TYPE.to_string(),
        }
    }

    /// Sets the MIME type.
    #[must_use]
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// MIME type of the file.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captured_file_default_media_type() {
        let file = CapturedFile::new("/tmp/face.jpg");
        assert_eq!(file.media_type(), "*/*");
        assert_eq!(file.path(), Path::new("/tmp/face.jpg"));

        let typed = file.with_media_type("image/jpeg");
        assert_eq!(typed.media_type(), "image/jpeg");
    }

    #[test]
    fn test_device_info_deserializes_with_defaults() {
        let info: DeviceInfo =
            serde_json::from_str(r#"{"id": "mic", "name": "Microphone"}"#).unwrap();
        assert_eq!(info.device_type, DeviceType::Unknown);
        assert!(info.vendor.is_empty());
    }

    #[test]
    fn test_device_type_names() {
        let json = serde_json::to_string(&DeviceType::Fingerprint).unwrap();
        assert_eq!(json, "\"FINGERPRINT\"");
    }
}
