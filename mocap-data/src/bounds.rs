//! Axis-aligned world bounds shared by every voxel grid of a comparison.

use crate::motion::Motion;
use crate::pose::ResolvedPose;
use glam::Vec3;
use tracing::debug;

/// Fraction of each axis extent added on both sides by [`WorldBounds::from_motions`].
pub const DEFAULT_MARGIN: f32 = 0.05;

/// An axis-aligned box, one min/max pair per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl WorldBounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Tight bounds of a point set, `None` when empty.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        let mut count = 0usize;

        for p in points {
            min = min.min(p);
            max = max.max(p);
            count += 1;
        }

        (count > 0).then_some(Self { min, max })
    }

    /// Bounds swept over every frame of every motion, expanded by `margin`
    /// (a fraction of each axis extent).
    ///
    /// Returns `None` when all motions are empty.
    pub fn from_motions(motions: &[&Motion], margin: f32) -> Option<Self> {
        let mut bounds: Option<WorldBounds> = None;
        for motion in motions {
            let skeleton = motion.skeleton();
            let mut pose = ResolvedPose::new(skeleton);
            for posture in motion.postures() {
                pose.update(skeleton, posture);
                if let Some(frame) = Self::from_points(pose.points(skeleton)) {
                    bounds = Some(match bounds {
                        Some(b) => b.union(&frame),
                        None => frame,
                    });
                }
            }
        }

        let bounds = bounds?.expanded(margin);
        debug!("World bounds: min {:?}, max {:?}", bounds.min, bounds.max);
        Some(bounds)
    }

    pub fn union(&self, other: &WorldBounds) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Grow each axis by `fraction` of its extent on both sides.
    ///
    /// A flat axis borrows the margin of the largest axis so the box never has
    /// zero volume; a single point grows to a unit box.
    pub fn expanded(&self, fraction: f32) -> Self {
        let extent = self.extent();
        let largest = extent.max_element();
        let fallback = if largest > f32::EPSILON {
            largest * fraction.max(f32::EPSILON)
        } else {
            0.5
        };
        let margin = Vec3::select(
            extent.cmpgt(Vec3::splat(f32::EPSILON)),
            extent * fraction,
            Vec3::splat(fallback),
        );
        Self {
            min: self.min - margin,
            max: self.max + margin,
        }
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// The six scalars in `[min.x, min.y, min.z, max.x, max.y, max.z]` order.
    pub fn to_array(&self) -> [f32; 6] {
        [
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z,
        ]
    }

    pub fn from_array(values: [f32; 6]) -> Self {
        Self {
            min: Vec3::new(values[0], values[1], values[2]),
            max: Vec3::new(values[3], values[4], values[5]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::Posture;
    use crate::skeleton::SkeletonBuilder;
    use std::sync::Arc;

    #[test]
    fn test_from_points() {
        let bounds = WorldBounds::from_points([
            Vec3::new(1.0, -2.0, 0.0),
            Vec3::new(-1.0, 4.0, 3.0),
        ])
        .unwrap();
        assert_eq!(bounds.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(1.0, 4.0, 3.0));
        assert!(WorldBounds::from_points(std::iter::empty::<Vec3>()).is_none());
    }

    #[test]
    fn test_expanded_adds_margin_per_axis() {
        let bounds = WorldBounds::new(Vec3::ZERO, Vec3::new(10.0, 20.0, 40.0)).expanded(0.05);
        assert!((bounds.min - Vec3::new(-0.5, -1.0, -2.0)).length() < 1e-5);
        assert!((bounds.max - Vec3::new(10.5, 21.0, 42.0)).length() < 1e-5);
    }

    #[test]
    fn test_expanded_flat_axis_gets_volume() {
        let bounds = WorldBounds::new(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)).expanded(0.05);
        assert!(bounds.extent().min_element() > 0.0);

        let point = WorldBounds::new(Vec3::ONE, Vec3::ONE).expanded(0.05);
        assert_eq!(point.extent(), Vec3::ONE);
    }

    #[test]
    fn test_from_motions_unions_both() {
        let mut b = SkeletonBuilder::new("Hips");
        b.attach(0, "j", "Spine", Vec3::Y).unwrap();
        let skeleton = Arc::new(b.build());

        let mut left = Posture::identity(&skeleton);
        left.root_position = Vec3::new(-2.0, 0.0, -1.0);
        let mut right = Posture::identity(&skeleton);
        right.root_position = Vec3::new(2.0, 0.0, 1.0);

        let a = Motion::new("a", skeleton.clone(), 0.1, vec![left]).unwrap();
        let b = Motion::new("b", skeleton, 0.1, vec![right]).unwrap();
        let bounds = WorldBounds::from_motions(&[&a, &b], 0.0).unwrap();
        assert!((bounds.min - Vec3::new(-2.0, 0.0, -1.0)).length() < 1e-5);
        assert!((bounds.max - Vec3::new(2.0, 1.0, 1.0)).length() < 1e-5);
    }
}
