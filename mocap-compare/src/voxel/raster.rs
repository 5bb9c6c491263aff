//! Capsule rasterization of bones into voxel grids.

use super::grid::GridLayout;
use glam::Vec3;

/// A line segment with a radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capsule {
    pub start: Vec3,
    pub end: Vec3,
    pub radius: f32,
}

impl Capsule {
    pub fn new(start: Vec3, end: Vec3, radius: f32) -> Self {
        Self { start, end, radius }
    }

    /// Parameter in `[0, 1]` of the point on the axis closest to `point`.
    pub fn closest_t(&self, point: Vec3) -> f32 {
        let axis = self.end - self.start;
        let length_sq = axis.length_squared();
        if length_sq <= f32::EPSILON {
            return 0.0;
        }
        ((point - self.start).dot(axis) / length_sq).clamp(0.0, 1.0)
    }

    pub fn distance_to(&self, point: Vec3) -> f32 {
        let t = self.closest_t(point);
        point.distance(self.start.lerp(self.end, t))
    }

    pub fn aabb(&self) -> (Vec3, Vec3) {
        let r = Vec3::splat(self.radius);
        (self.start.min(self.end) - r, self.start.max(self.end) + r)
    }
}

/// Call `visit(cell_index, t)` for every cell whose center lies within the
/// capsule, `t` being the closest axis parameter.
pub fn rasterize(layout: &GridLayout, capsule: &Capsule, mut visit: impl FnMut(usize, f32)) {
    let (min, max) = capsule.aabb();
    let Some((lo, hi)) = layout.index_range(min, max) else {
        return;
    };
    for z in lo[2]..=hi[2] {
        for y in lo[1]..=hi[1] {
            for x in lo[0]..=hi[0] {
                let voxel = [x, y, z];
                let center = layout.cell_center(voxel);
                let t = capsule.closest_t(center);
                if center.distance(capsule.start.lerp(capsule.end, t)) <= capsule.radius {
                    visit(layout.index(voxel), t);
                }
            }
        }
    }
}
