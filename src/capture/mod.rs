//! Screen capture.
//!
//! This module provides:
//! - The capture region type
//! - The `FrameSource` / `CaptureBackend` seams the detection poller pulls frames through
//! - GDI screen capture and window lookup on Windows

#[cfg(windows)]
pub mod screen;
#[cfg(windows)]
pub mod window;

#[cfg(any(windows, test))]
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[cfg(any(windows, test))]
pub use crate::detection::classifier::Frame;

/// A rectangular region of the screen, in screen pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    /// Builds a region from two opposite corners in any order.
    #[cfg(any(windows, test))]
    pub fn from_corners(a: (i32, i32), b: (i32, i32)) -> Self {
        let (x0, x1) = (a.0.min(b.0), a.0.max(b.0));
        let (y0, y1) = (a.1.min(b.1), a.1.max(b.1));
        Self {
            x: x0,
            y: y0,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        }
    }

    #[cfg(any(windows, test))]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for CaptureRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x, self.y, self.width, self.height)
    }
}

/// An open capture handle.
///
/// `capture` returning `None` means no frame is available right now; callers
/// retry later.
#[cfg(any(windows, test))]
pub trait FrameSource: Send {
    fn capture(&mut self, region: &CaptureRegion) -> Option<Frame>;

    /// Releases the underlying capture resources.
    fn close(&mut self) {}
}

/// Opens frame sources. One source is opened per run.
#[cfg(any(windows, test))]
pub trait CaptureBackend: Send + Sync {
    fn open(&self) -> Result<Box<dyn FrameSource>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_from_corners() {
        let region = CaptureRegion::from_corners((50, 40), (10, 100));
        assert_eq!(
            region,
            CaptureRegion {
                x: 10,
                y: 40,
                width: 40,
                height: 60
            }
        );
        assert!(!region.is_empty());
        assert!(CaptureRegion::from_corners((5, 5), (5, 9)).is_empty());
    }

    #[test]
    fn test_region_display() {
        let region = CaptureRegion {
            x: 1,
            y: 2,
            width: 3,
            height: 4,
        };
        assert_eq!(region.to_string(), "(1, 2, 3, 4)");
    }
}
