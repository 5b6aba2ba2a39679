//! Bounding box tracking for captured coordinates

use serde::Serialize;

use super::{BlockPos, Dimensions};

/// Minimal axis-aligned box containing every recorded coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub min: BlockPos,
    pub max: BlockPos,
}

impl BoundingBox {
    /// Expand the box to include a position
    fn expand(&mut self, pos: BlockPos) {
        self.min.x = self.min.x.min(pos.x);
        self.min.y = self.min.y.min(pos.y);
        self.min.z = self.min.z.min(pos.z);
        self.max.x = self.max.x.max(pos.x);
        self.max.y = self.max.y.max(pos.y);
        self.max.z = self.max.z.max(pos.z);
    }

    /// Extent per axis, inclusive of both faces
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.max.x - self.min.x + 1,
            height: self.max.y - self.min.y + 1,
            depth: self.max.z - self.min.z + 1,
        }
    }
}

/// Folds every coordinate touched by a placement into a running box.
///
/// A tracker models one capture session: the box only ever grows. Starting a
/// new capture means starting from a fresh instance.
#[derive(Debug, Default)]
pub struct BoundsTracker {
    bounds: Option<BoundingBox>,
}

impl BoundsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a position into the tracked box. The first recorded position
    /// initializes the box to a single block.
    pub fn record(&mut self, pos: BlockPos) {
        match &mut self.bounds {
            Some(bounds) => bounds.expand(pos),
            None => self.bounds = Some(BoundingBox { min: pos, max: pos }),
        }
    }

    /// None until at least one position has been recorded
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bounds
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.bounds.map(|b| b.dimensions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tracker_has_no_bounds() {
        let tracker = BoundsTracker::new();
        assert!(tracker.bounding_box().is_none());
        assert!(tracker.dimensions().is_none());
    }

    #[test]
    fn first_point_initializes_min_and_max() {
        let mut tracker = BoundsTracker::new();
        tracker.record(BlockPos::new(3, -2, 7));

        let bounds = tracker.bounding_box().unwrap();
        assert_eq!(bounds.min, BlockPos::new(3, -2, 7));
        assert_eq!(bounds.max, BlockPos::new(3, -2, 7));
        assert_eq!(
            tracker.dimensions(),
            Some(Dimensions {
                width: 1,
                height: 1,
                depth: 1
            })
        );
    }

    #[test]
    fn expands_per_axis() {
        let mut tracker = BoundsTracker::new();
        tracker.record(BlockPos::new(0, 0, 0));
        tracker.record(BlockPos::new(5, 10, -3));

        let bounds = tracker.bounding_box().unwrap();
        assert_eq!(bounds.min, BlockPos::new(0, 0, -3));
        assert_eq!(bounds.max, BlockPos::new(5, 10, 0));
    }

    #[test]
    fn fold_is_order_independent() {
        let points = [
            BlockPos::new(4, 1, -2),
            BlockPos::new(-1, 8, 3),
            BlockPos::new(0, 0, 0),
            BlockPos::new(9, -5, 9),
        ];

        let mut forward = BoundsTracker::new();
        for p in points {
            forward.record(p);
        }
        let mut reverse = BoundsTracker::new();
        for p in points.iter().rev() {
            reverse.record(*p);
        }

        assert_eq!(forward.bounding_box(), reverse.bounding_box());
        let bounds = forward.bounding_box().unwrap();
        assert_eq!(bounds.min, BlockPos::new(-1, -5, -2));
        assert_eq!(bounds.max, BlockPos::new(9, 8, 9));
    }

    #[test]
    fn dimensions_count_both_faces() {
        let mut tracker = BoundsTracker::new();
        tracker.record(BlockPos::new(0, 0, 0));
        tracker.record(BlockPos::new(5, 3, 5));

        assert_eq!(
            tracker.dimensions(),
            Some(Dimensions {
                width: 6,
                height: 4,
                depth: 6
            })
        );
    }
}
