//! Builder pattern for [`Device`].

use std::marker::PhantomData;

use crate::device::{CaptureBackend, Device, DeviceInfo};
use crate::sample::Sample;
use crate::{event_callback, CaptureError, CaptureEvent, EventCallback, PipelineConfig};

/// Builder for configuring a [`Device`].
///
/// # Example
///
/// ```
/// use stream_capture::{Device, DeviceInfo, DeviceType, FingerprintScan, MockBackend, PipelineConfig};
/// use std::time::Duration;
///
/// let device = Device::<FingerprintScan>::builder(
///     DeviceInfo::new("finger", "Fingerprint Reader", DeviceType::Fingerprint),
///     MockBackend::new(),
/// )
/// .with_config(PipelineConfig {
///     buffer_capacity: 8,
///     put_timeout: Duration::from_millis(10),
///     ..Default::default()
/// })
/// .on_event(|event| eprintln!("{event:?}"))
/// .build()
/// .unwrap();
/// ```
pub struct DeviceBuilder<T> {
    info: DeviceInfo,
    backend: Box<dyn CaptureBackend>,
    config: PipelineConfig,
    event_callback: Option<EventCallback>,
    _samples: PhantomData<fn() -> T>,
}

impl<T: Sample> DeviceBuilder<T> {
    pub(crate) fn new(info: DeviceInfo, backend: Box<dyn CaptureBackend>) -> Self {
        Self {
            info,
            backend,
            config: PipelineConfig::default(),
            event_callback: None,
            _samples: PhantomData,
        }
    }

    /// Sets buffer sizing and timing.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the put timeout used by [`Device::push_sample`].
    #[must_use]
    pub fn put_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.put_timeout = timeout;
        self
    }

    /// Registers a callback for runtime events.
    ///
    /// Events are delivered synchronously on the thread that caused them.
    #[must_use]
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(CaptureEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Builds the device.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidArgument`] if the configured buffer
    /// capacity is zero.
    pub fn build(self) -> Result<Device<T>, CaptureError> {
        if self.config.buffer_capacity == 0 {
            return Err(CaptureError::invalid_argument(
                "buffer capacity must be at least 1",
            ));
        }
        tracing::debug!(
            device = %self.info.id,
            sample_type = std::any::type_name::<T>(),
            capacity = self.config.buffer_capacity,
            put_timeout_ms = self.config.put_timeout.as_millis() as u64,
            "device built"
        );
        Ok(Device::from_parts(
            self.info,
            self.backend,
            self.config,
            self.event_callback,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeviceType, MockBackend};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn info() -> DeviceInfo {
        DeviceInfo::new("face", "Face", DeviceType::Camera)
    }

    #[test]
    fn test_builder_rejects_zero_capacity() {
        let result = Device::<u32>::builder(info(), MockBackend::new())
            .with_config(PipelineConfig {
                buffer_capacity: 0,
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(CaptureError::InvalidArgument { .. })));
    }

    #[test]
    fn test_builder_applies_config() {
        let device = Device::<u32>::builder(info(), MockBackend::new())
            .put_timeout(Duration::from_millis(3))
            .build()
            .unwrap();
        assert_eq!(device.config().put_timeout, Duration::from_millis(3));
        assert_eq!(device.config().buffer_capacity, 100);
    }

    #[test]
    fn test_new_buffer_follows_config() {
        let device = Device::<u32>::builder(info(), MockBackend::new())
            .with_config(PipelineConfig {
                buffer_capacity: 8,
                poll_timeout: Duration::from_millis(15),
                ..Default::default()
            })
            .build()
            .unwrap();

        let buffer = device.new_buffer();
        assert_eq!(buffer.capacity(), 8);
        assert_eq!(buffer.default_poll_timeout(), Duration::from_millis(15));
    }

    #[test]
    fn test_builder_event_callback() {
        let events = Arc::new(AtomicUsize::new(0));
        let counter = events.clone();
        let device = Device::<u32>::builder(info(), MockBackend::new())
            .on_event(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        device.stop();
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }
}
