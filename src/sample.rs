//! Captured sample types.
//!
//! A sample is one unit of captured biometric data. Samples are immutable once
//! produced and move from the producer, through a viewer buffer, to the
//! viewer's presenter. A device fans every sample out to all of its viewers,
//! so large payloads sit behind an `Arc` to keep clones cheap.

use std::sync::Arc;
use std::time::Duration;

/// Marker for types that can flow through a capture pipeline.
///
/// Implemented for every `Clone + Send + 'static` type.
pub trait Sample: Clone + Send + 'static {}

impl<T: Clone + Send + 'static> Sample for T {}

/// Axis-aligned bounding box of a detected face, in preview pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FaceBounds {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Box width.
    pub width: f32,
    /// Box height.
    pub height: f32,
}

impl FaceBounds {
    /// Area of the box in square pixels.
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// A face located by the detector in one preview frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceSample {
    /// Detector tracking id; stable while the same face stays in view.
    pub tracking_id: u32,
    /// Where the face is.
    pub bounds: FaceBounds,
    /// Probability the left eye is open, if classified.
    pub left_eye_open: Option<f32>,
    /// Probability the right eye is open, if classified.
    pub right_eye_open: Option<f32>,
    /// Probability the face is smiling, if classified.
    pub smiling: Option<f32>,
    /// Time since the capture session started.
    pub timestamp: Duration,
}

impl FaceSample {
    /// Creates an unclassified face sample.
    pub fn new(tracking_id: u32, bounds: FaceBounds, timestamp: Duration) -> Self {
        Self {
            tracking_id,
            bounds,
            left_eye_open: None,
            right_eye_open: None,
            smiling: None,
            timestamp,
        }
    }

    /// Returns `true` if both eyes are classified as open above `threshold`.
    pub fn eyes_open(&self, threshold: f32) -> bool {
        matches!(
            (self.left_eye_open, self.right_eye_open),
            (Some(l), Some(r)) if l >= threshold && r >= threshold
        )
    }
}

/// A discrete buffer of PCM audio with timing and format metadata.
///
/// Samples are stored in an `Arc<Vec<i16>>` so fanning a frame out to several
/// viewers shares one allocation.
///
/// # Example
///
/// ```
/// use stream_capture::AudioFrame;
/// use std::time::Duration;
///
/// let frame = AudioFrame::new(vec![0i16; 1600], Duration::ZERO, 16000, 1);
/// assert_eq!(frame.duration(), Duration::from_millis(100));
///
/// let shared = frame.clone(); // shares sample data
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// PCM audio samples in 16-bit signed integer format.
    pub samples: Arc<Vec<i16>>,
    /// Time since the capture session started.
    pub timestamp: Duration,
    /// Sample rate in Hz (e.g., 16000, 44100, 48000).
    pub sample_rate: u32,
    /// Number of audio channels (1 = mono, 2 = stereo).
    pub channels: u16,
}

impl AudioFrame {
    /// Creates a new frame from interleaved samples.
    pub fn new(samples: Vec<i16>, timestamp: Duration, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: Arc::new(samples),
            timestamp,
            sample_rate,
            channels,
        }
    }

    /// Returns the duration of this frame.
    ///
    /// Calculated from the number of samples, sample rate, and channel count.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() / self.channels as usize;
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate))
    }

    /// Returns the number of audio frames (one sample per channel).
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Returns `true` if this frame contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A grayscale fingerprint image from a single scan.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintScan {
    /// Row-major 8-bit grayscale pixels.
    pub image: Arc<Vec<u8>>,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Sensor-reported quality, 0 (unusable) to 100.
    pub quality: u8,
    /// Time since the capture session started.
    pub timestamp: Duration,
}

impl FingerprintScan {
    /// Creates a scan; `quality` is clamped to 100.
    pub fn new(image: Vec<u8>, width: u32, height: u32, quality: u8, timestamp: Duration) -> Self {
        Self {
            image: Arc::new(image),
            width,
            height,
            quality: quality.min(100),
            timestamp,
        }
    }

    /// Returns `true` if the pixel buffer matches the declared dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.image.len() as u64 == u64::from(self.width) * u64::from(self.height)
    }
}
