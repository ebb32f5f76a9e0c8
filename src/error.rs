//! Error types for stream-capture.
//!
//! Errors are split into three categories:
//! - **Structural errors** ([`CaptureError`]): bad arguments, illegal state
//!   transitions and incompatible viewers. Raised synchronously, never retried.
//! - **Wait outcomes** ([`WaitError`], [`PutError`]): a blocking buffer
//!   operation was cancelled or interrupted. Losses are counted, not fatal.
//! - **Collaborator errors** ([`BackendError`], [`ViewError`]): reported by
//!   device backends and viewers, surfaced via [`EventCallback`](crate::EventCallback).

use std::fmt;

use crate::device::DeviceState;

/// Structural errors raised by device and buffer operations.
///
/// These are returned directly to the caller and leave the device, its
/// registry and its buffers untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// An argument was invalid (duplicate viewer, zero capacity, bad config).
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the argument.
        reason: String,
    },

    /// The viewer's buffer carries a different sample type than the device.
    #[error("viewer buffer type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Buffer type the device produces into.
        expected: &'static str,
        /// Buffer type the viewer supplied.
        actual: &'static str,
    },

    /// Another registered viewer already owns the primary display surface.
    #[error("primary surface already bound to viewer '{existing}'")]
    PrimarySurfaceTaken {
        /// Name of the viewer holding the surface.
        existing: String,
    },

    /// The operation is not valid in the device's current state.
    #[error("cannot {operation} while device is {state}")]
    InvalidStateTransition {
        /// The rejected operation (`"pause"`, `"resume"`, ...).
        operation: &'static str,
        /// State the device was in.
        state: DeviceState,
    },

    /// Preview needs a registered viewer that owns the primary surface.
    #[error("no registered viewer owns a primary surface for preview")]
    NoPreviewSurface,

    /// The device backend failed to carry out a lifecycle operation.
    #[error("device '{device}' backend failed: {reason}")]
    Backend {
        /// Id of the device whose backend failed.
        device: String,
        /// Backend failure description.
        reason: String,
    },
}

impl CaptureError {
    /// Creates an invalid-argument error with the given reason.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Stable error code, suitable as a localization key.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "error.invalid.argument",
            Self::TypeMismatch { .. } => "error.capture.invalid.device.buffer.type",
            Self::PrimarySurfaceTaken { .. } => "error.capture.primary.surface.taken",
            Self::InvalidStateTransition {
                state: DeviceState::Stopped,
                ..
            } => "error.device.already.stopped",
            Self::InvalidStateTransition { .. } => "error.device.state",
            Self::NoPreviewSurface => "error.capture.no.preview.surface",
            Self::Backend { .. } => "error.device.backend",
        }
    }
}

/// Why a blocking buffer operation returned without completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    /// The token was cancelled: the caller was asked to stop.
    #[error("wait cancelled")]
    Cancelled,

    /// The wait was interrupted without a stop request. Callers decide
    /// whether to retry.
    #[error("wait interrupted")]
    Interrupted,
}

/// A blocking put that did not enqueue its sample.
///
/// The sample is handed back so the producer decides what to do with it.
/// The attempt has already been counted as a loss.
pub struct PutError<T> {
    /// The sample that was not delivered.
    pub sample: T,
    /// Why the put gave up.
    pub kind: WaitError,
}

impl<T> PutError<T> {
    /// Consumes the error, returning the undelivered sample.
    pub fn into_sample(self) -> T {
        self.sample
    }
}

impl<T> fmt::Debug for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutError")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sample not delivered: {}", self.kind)
    }
}

impl<T> std::error::Error for PutError<T> {}

/// Errors reported by a [`CaptureBackend`](crate::CaptureBackend).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// No capture hardware matching the request was found.
    #[error("no capture device found")]
    NoDeviceFound,

    /// The hardware or backing resource exists but cannot be used right now.
    #[error("resource unavailable: {reason}")]
    Unavailable {
        /// Why the resource is unavailable.
        reason: String,
    },

    /// A configuration option was rejected by the backend.
    #[error("unsupported option '{key}': {reason}")]
    UnsupportedOption {
        /// The offending option key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Any other backend failure.
    #[error("{0}")]
    Failed(String),
}

impl BackendError {
    /// Creates an unavailable-resource error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Creates a generic failure.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Error returned by a viewer's state-change callback.
///
/// The device isolates these: a failing viewer never prevents other viewers
/// from being notified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ViewError(String);

impl ViewError {
    /// Creates a viewer error with the given message.
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_display() {
        let err = CaptureError::TypeMismatch {
            expected: "Face",
            actual: "Audio",
        };
        assert_eq!(
            err.to_string(),
            "viewer buffer type mismatch: expected Face, got Audio"
        );
        assert_eq!(err.code(), "error.capture.invalid.device.buffer.type");
    }

    #[test]
    fn test_state_error_codes() {
        let stopped = CaptureError::InvalidStateTransition {
            operation: "resume",
            state: DeviceState::Stopped,
        };
        assert_eq!(stopped.code(), "error.device.already.stopped");
        assert_eq!(stopped.to_string(), "cannot resume while device is STOPPED");

        let other = CaptureError::InvalidStateTransition {
            operation: "start_capture",
            state: DeviceState::Uninitialized,
        };
        assert_eq!(other.code(), "error.device.state");
    }

    #[test]
    fn test_put_error_keeps_sample() {
        let err = PutError {
            sample: 7u32,
            kind: WaitError::Cancelled,
        };
        assert_eq!(err.to_string(), "sample not delivered: wait cancelled");
        assert!(format!("{err:?}").contains("Cancelled"));
        assert_eq!(err.into_sample(), 7);
    }

    #[test]
    fn test_backend_error_helpers() {
        assert_eq!(
            BackendError::unavailable("camera busy").to_string(),
            "resource unavailable: camera busy"
        );
        assert_eq!(BackendError::failed("boom").to_string(), "boom");
    }
}
