//! Display-time point filtering.

use crate::trace::{Frame, Point3D};

/// Hides points that have fallen below a height floor.
///
/// Applied when a frame is handed to the renderer; frames themselves are
/// never modified.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayFilter {
    min_z: f64,
}

impl DisplayFilter {
    pub const DEFAULT_MIN_Z: f64 = -1.0;

    pub fn new(min_z: f64) -> Self {
        Self { min_z }
    }

    pub fn min_z(&self) -> f64 {
        self.min_z
    }

    /// A point is hidden only when `z < min_z`; the floor itself and NaN
    /// heights stay visible.
    #[inline]
    pub fn is_visible(&self, point: &Point3D) -> bool {
        !(point.z < self.min_z)
    }

    /// Iterate the visible points of `frame` in recorded order.
    pub fn visible<'a>(&self, frame: &'a Frame) -> impl Iterator<Item = &'a Point3D> + 'a {
        let filter = *self;
        frame.iter().filter(move |p| filter.is_visible(p))
    }

    /// Replace the contents of `out` with the visible points of `frame`.
    pub fn collect_into(&self, frame: &Frame, out: &mut Vec<Point3D>) {
        out.clear();
        out.extend(self.visible(frame).copied());
    }
}

impl Default for DisplayFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_Z)
    }
}
