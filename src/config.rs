//! Configuration types for capture pipelines and devices.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::CaptureError;

/// Default number of pending samples a viewer buffer holds.
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// Default time a producer waits for buffer space before dropping a sample.
pub const DEFAULT_PUT_TIMEOUT: Duration = Duration::from_millis(50);

/// Default time a consumer waits in [`CaptureBuffer::poll`](crate::CaptureBuffer::poll).
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// Timing and sizing for the buffers between a device and its viewers.
///
/// Use [`PipelineConfig::default()`] for sensible defaults, or customize as needed.
///
/// # Example
///
/// ```
/// use stream_capture::PipelineConfig;
/// use std::time::Duration;
///
/// let config = PipelineConfig {
///     put_timeout: Duration::from_millis(5),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Capacity of each viewer buffer.
    ///
    /// Must be at least 1. Default: 100
    pub buffer_capacity: usize,

    /// How long [`Device::push_sample`](crate::Device::push_sample) waits for
    /// space in a full viewer buffer before counting the sample as lost.
    ///
    /// Default: 50ms
    pub put_timeout: Duration,

    /// How long [`CaptureBuffer::poll`](crate::CaptureBuffer::poll) waits for a
    /// sample on buffers made by [`Device::new_buffer`](crate::Device::new_buffer).
    ///
    /// Default: 200ms
    pub poll_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            put_timeout: DEFAULT_PUT_TIMEOUT,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// Opaque, device-specific configuration passed to
/// [`Device::initialize`](crate::Device::initialize).
///
/// The pipeline never interprets the payload; backends read the options
/// they recognize (exposure, resolution, sample rate, ...) with
/// [`get`](Self::get).
///
/// # Example
///
/// ```
/// use stream_capture::DeviceConfig;
///
/// let config = DeviceConfig::from_json(r#"{"sample_rate": 16000}"#).unwrap();
/// assert_eq!(config.get::<u32>("sample_rate"), Some(16000));
/// assert_eq!(config.get::<u32>("exposure"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceConfig {
    options: Map<String, Value>,
}

impl DeviceConfig {
    /// An empty configuration: the backend uses its defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON object into a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidArgument`] if the text is not valid
    /// JSON or is not a JSON object.
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| CaptureError::invalid_argument(format!("malformed config: {e}")))?;
        Self::from_value(value)
    }

    /// Wraps an already-parsed JSON value.
    ///
    /// `null` is accepted as an empty configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidArgument`] for any other non-object value.
    pub fn from_value(value: Value) -> Result<Self, CaptureError> {
        match value {
            Value::Object(options) => Ok(Self { options }),
            Value::Null => Ok(Self::default()),
            other => Err(CaptureError::invalid_argument(format!(
                "config must be a JSON object, got {other}"
            ))),
        }
    }

    /// Sets an option, replacing any previous value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Reads an option as `T`.
    ///
    /// Returns `None` if the key is absent or has an incompatible type.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.options
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Returns the raw value of an option.
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Returns `true` if no options are set.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}
