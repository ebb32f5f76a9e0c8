//! # stream-capture
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Bounded, backpressure-aware streaming of biometric capture samples.
//!
//! `stream-capture` moves samples (face locations, audio frames, fingerprint
//! scans) from one producing device to any number of independent viewers.
//! A slow or absent viewer never stalls the producer for longer than the
//! put timeout, and memory stays bounded when viewers fall behind.
//!
//! ## Quick Start
//!
//! ```
//! use stream_capture::synthetic::FaceTrack;
//! use stream_capture::{
//!     presenter_fn, Device, DeviceConfig, DeviceInfo, DeviceType, FaceSample, MockBackend,
//!     Surface, Viewer,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let device = Device::<FaceSample>::builder(
//!     DeviceInfo::new("face", "Face Capture Device", DeviceType::Camera),
//!     MockBackend::new(),
//! )
//! .on_event(|e| eprintln!("capture event: {e:?}"))
//! .build()?;
//!
//! let screen = Arc::new(
//!     Viewer::new("screen", presenter_fn(|face: FaceSample| {
//!         // draw the overlay
//!         let _ = face.bounds;
//!     }))
//!     .on_surface(Surface::Primary),
//! );
//! device.add_viewer(screen.clone())?;
//!
//! assert!(device.initialize(&DeviceConfig::new()));
//! device.start_preview()?;
//!
//! let mut track = FaceTrack::new(1, Duration::from_millis(33));
//! for _ in 0..10 {
//!     let _ = device.push_sample(track.next_sample());
//! }
//!
//! device.stop();
//! # Ok::<(), stream_capture::CaptureError>(())
//! ```
//!
//! ## Architecture
//!
//! - **Producer**: calls [`Device::push_sample`] from the capture thread
//! - **CaptureBuffer**: one bounded FIFO per viewer absorbs jitter
//! - **Consumer loop**: one thread per viewer drains into a [`Presenter`]
//!
//! The [`Device`] owns the lifecycle state machine and broadcasts every
//! state change to its viewers synchronously. Hardware control is injected
//! as a [`CaptureBackend`].

#![warn(missing_docs)]
// Sample generation and stats require intentional numeric casts
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::missing_panics_doc)]

mod builder;
mod config;
mod device;
mod error;
mod event;
mod pipeline;
mod sample;
pub mod synthetic;
mod viewer;

pub use builder::DeviceBuilder;
pub use config::{
    DeviceConfig, PipelineConfig, DEFAULT_BUFFER_CAPACITY, DEFAULT_POLL_TIMEOUT,
    DEFAULT_PUT_TIMEOUT,
};
pub use device::{
    CaptureBackend, CaptureDevice, CapturedFile, Device, DeviceInfo, DeviceState, DeviceType,
    FanOut, MockBackend, MockCall, MockProbe, PreviewSurface, PutPolicy, Transition, ViewerId,
    DEFAULT_MEDIA_TYPE,
};
pub use error::{BackendError, CaptureError, PutError, ViewError, WaitError};
pub use event::{event_callback, CaptureEvent, EventCallback};
pub use pipeline::{
    spawn_consumer, BufferStats, CancelToken, CaptureBuffer, ConsumerHandle, Delivery,
};
pub use sample::{AudioFrame, FaceBounds, FaceSample, FingerprintScan, Sample};
pub use viewer::{
    presenter_fn, BufferHandle, CaptureView, ChannelPresenter, FnPresenter, Presenter, Surface,
    Viewer, ViewerStats,
};
