//! Viewer registration handle.

use std::fmt;

/// Handle to a viewer registration, returned by
/// [`Device::add_viewer`](crate::Device::add_viewer).
///
/// Ids are unique per device and never reused. Copying a `ViewerId` does not
/// keep the viewer alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewerId(u64);

impl ViewerId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewer#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_id_display() {
        assert_eq!(ViewerId::new(3).to_string(), "viewer#3");
        assert_eq!(ViewerId::new(3).as_u64(), 3);
    }

    #[test]
    fn test_viewer_id_ordering() {
        assert!(ViewerId::new(1) < ViewerId::new(2));
        assert_eq!(ViewerId::new(7), ViewerId::new(7));
    }
}
