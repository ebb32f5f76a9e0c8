//! Runtime events for monitoring pipeline health.
//!
//! Events are non-fatal notifications about device and viewer behavior. The
//! pipeline keeps running after an event is emitted - they're for logging
//! and metrics, not error handling.

use std::path::PathBuf;
use std::sync::Arc;

use crate::device::{DeviceState, ViewerId};

/// Runtime events emitted by a [`Device`](crate::Device).
///
/// # Example
///
/// ```
/// use stream_capture::CaptureEvent;
///
/// fn handle_event(event: CaptureEvent) {
///     match event {
///         CaptureEvent::StateChanged { device_id, previous, current } => {
///             eprintln!("{device_id}: {previous} -> {current}");
///         }
///         CaptureEvent::SampleDropped { viewer, lost_total, .. } => {
///             eprintln!("{viewer} is falling behind ({lost_total} lost)");
///         }
///         other => eprintln!("{other:?}"),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// The device moved to a new lifecycle state.
    StateChanged {
        /// Device that changed state.
        device_id: String,
        /// State before the transition.
        previous: DeviceState,
        /// State after the transition.
        current: DeviceState,
    },

    /// `initialize` failed; the device stays in its previous state.
    InitializeFailed {
        /// Device that failed to initialize.
        device_id: String,
        /// Why initialization failed.
        reason: String,
    },

    /// A viewer was registered with the device.
    ViewerAdded {
        /// Device the viewer was added to.
        device_id: String,
        /// Handle assigned to the viewer.
        viewer: ViewerId,
        /// Viewer name.
        name: String,
    },

    /// A viewer was removed, or its registration was pruned after the
    /// viewer was dropped.
    ViewerRemoved {
        /// Device the viewer was removed from.
        device_id: String,
        /// Handle of the removed viewer.
        viewer: ViewerId,
    },

    /// A viewer's state callback returned an error or panicked.
    ///
    /// Remaining viewers were still notified.
    ViewerCallbackFailed {
        /// Handle of the failing viewer.
        viewer: ViewerId,
        /// Viewer name.
        name: String,
        /// Description of the failure.
        error: String,
    },

    /// A viewer buffer stayed full for the whole put window and a sample
    /// was dropped.
    ///
    /// Happens when a viewer's consumer loop is slower than the producer
    /// for an extended period. Consider a larger buffer or a faster
    /// presenter.
    SampleDropped {
        /// Device that produced the sample.
        device_id: String,
        /// Viewer whose buffer was full.
        viewer: ViewerId,
        /// Total samples that viewer's buffer has lost so far.
        lost_total: u64,
    },

    /// A capture persisted a file.
    FileCaptured {
        /// Device that produced the file.
        device_id: String,
        /// Path of the file.
        path: PathBuf,
        /// MIME type of the file.
        media_type: String,
    },
}

/// Callback type for receiving runtime events.
///
/// Register one via [`DeviceBuilder::on_event()`](crate::DeviceBuilder::on_event).
/// Callbacks are invoked synchronously on the thread that caused the event,
/// so they should return quickly.
pub type EventCallback = Arc<dyn Fn(CaptureEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use stream_capture::{event_callback, CaptureEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(CaptureEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_event_debug() {
        let event = CaptureEvent::StateChanged {
            device_id: "face".to_string(),
            previous: DeviceState::Initialized,
            current: DeviceState::PreviewStarted,
        };
        let debug = format!("{event:?}");
        assert!(debug.contains("StateChanged"));
        assert!(debug.contains("PreviewStarted"));
    }

    #[test]
    fn test_event_callback_helper() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let callback = event_callback(move |_| {
            called_clone.store(true, Ordering::SeqCst);
        });

        callback(CaptureEvent::InitializeFailed {
            device_id: "mic".to_string(),
            reason: "busy".to_string(),
        });
        assert!(called.load(Ordering::SeqCst));
    }
}
