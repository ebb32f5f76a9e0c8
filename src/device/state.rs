//! Device lifecycle states and transition rules.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CaptureError;

/// Lifecycle state of a capture device.
///
/// ```text
/// Uninitialized ─initialize→ Initialized ─start_preview→ PreviewStarted
///                                 │                           │
///                                 └──────start_capture────────┴→ CaptureStarted
///
/// PreviewStarted | CaptureStarted ─pause→ Paused ─resume→ (state before pause)
/// any ─stop→ Stopped ─initialize→ Initialized
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceState {
    /// Not yet initialized, or destroyed.
    #[default]
    Uninitialized,
    /// Backend initialized; nothing streaming.
    Initialized,
    /// Streaming preview samples to viewers.
    PreviewStarted,
    /// Capturing; samples stream to viewers and output may be persisted.
    CaptureStarted,
    /// Temporarily halted; `resume` returns to the state before the pause.
    Paused,
    /// Stopped; only `initialize` brings the device back.
    Stopped,
}

impl DeviceState {
    /// Returns `true` for states that hold backend streaming resources
    /// (previewing, capturing or paused).
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::PreviewStarted | Self::CaptureStarted | Self::Paused
        )
    }

    /// Returns `true` if samples pushed now are delivered to viewers.
    pub fn is_streaming(self) -> bool {
        matches!(self, Self::PreviewStarted | Self::CaptureStarted)
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Self::Uninitialized => 0,
            Self::Initialized => 1,
            Self::PreviewStarted => 2,
            Self::CaptureStarted => 3,
            Self::Paused => 4,
            Self::Stopped => 5,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Initialized,
            2 => Self::PreviewStarted,
            3 => Self::CaptureStarted,
            4 => Self::Paused,
            5 => Self::Stopped,
            _ => Self::Uninitialized,
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "UNINITIALIZED",
            Self::Initialized => "INITIALIZED",
            Self::PreviewStarted => "PREVIEW_STARTED",
            Self::CaptureStarted => "CAPTURE_STARTED",
            Self::Paused => "PAUSED",
            Self::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// Result of applying a lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The state changed and viewers were notified.
    Changed {
        /// State before.
        from: DeviceState,
        /// State after.
        to: DeviceState,
    },
    /// The operation was a no-op in the current state.
    Unchanged,
}

impl Transition {
    /// Returns `true` if the state changed.
    pub fn is_changed(self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

/// Pure transition rules. Callers serialize access.
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    state: DeviceState,
    /// Only `Some` while paused; never `Some(Paused)`.
    paused_from: Option<DeviceState>,
}

impl Lifecycle {
    pub fn state(&self) -> DeviceState {
        self.state
    }

    #[cfg(test)]
    pub fn paused_from(&self) -> Option<DeviceState> {
        self.paused_from
    }

    /// `Ok(true)` if preview should start, `Ok(false)` if already previewing.
    pub fn plan_preview(&self) -> Result<bool, CaptureError> {
        match self.state {
            DeviceState::Initialized | DeviceState::Paused => Ok(true),
            DeviceState::PreviewStarted => Ok(false),
            state => Err(CaptureError::InvalidStateTransition {
                operation: "start_preview",
                state,
            }),
        }
    }

    /// `Ok(true)` if capture should start, `Ok(false)` if already capturing.
    pub fn plan_capture(&self) -> Result<bool, CaptureError> {
        match self.state {
            DeviceState::Initialized | DeviceState::PreviewStarted => Ok(true),
            DeviceState::CaptureStarted => Ok(false),
            state => Err(CaptureError::InvalidStateTransition {
                operation: "start_capture",
                state,
            }),
        }
    }

    /// `Some(prior)` if the device should pause from `prior`.
    pub fn plan_pause(&self) -> Result<Option<DeviceState>, CaptureError> {
        match self.state {
            DeviceState::Stopped => Err(CaptureError::InvalidStateTransition {
                operation: "pause",
                state: DeviceState::Stopped,
            }),
            prior @ (DeviceState::PreviewStarted | DeviceState::CaptureStarted) => Ok(Some(prior)),
            DeviceState::Paused | DeviceState::Uninitialized | DeviceState::Initialized => Ok(None),
        }
    }

    /// `Some(target)` if the device should resume into `target`.
    pub fn plan_resume(&self) -> Result<Option<DeviceState>, CaptureError> {
        match self.state {
            DeviceState::Stopped => Err(CaptureError::InvalidStateTransition {
                operation: "resume",
                state: DeviceState::Stopped,
            }),
            DeviceState::Paused => Ok(Some(
                self.paused_from.unwrap_or(DeviceState::PreviewStarted),
            )),
            _ => Ok(None),
        }
    }

    pub fn apply_pause(&mut self, prior: DeviceState) -> Transition {
        debug_assert!(prior.is_streaming());
        self.paused_from = Some(prior);
        self.move_to(DeviceState::Paused)
    }

    /// Moves to `to`, forgetting any remembered pre-pause state.
    pub fn set(&mut self, to: DeviceState) -> Transition {
        self.paused_from = None;
        self.move_to(to)
    }

    fn move_to(&mut self, to: DeviceState) -> Transition {
        let from = self.state;
        if from == to {
            return Transition::Unchanged;
        }
        self.state = to;
        Transition::Changed { from, to }
    }
}
