//! Planar cross-sections of voxel grids.

use crate::error::CompareError;
use crate::voxel::VoxelGrid;
use glam::{Mat3, Quat, Vec3};
use image::{Rgb, RgbImage};
use std::path::Path;
use tracing::debug;

/// Square lattice of nearest-voxel samples.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceImage {
    pub resolution: usize,
    pub extent: f32,
    /// Row-major, row index along `v`, column index along `u`.
    pub values: Vec<f32>,
}

impl SliceImage {
    pub fn get(&self, column: usize, row: usize) -> f32 {
        self.values[row * self.resolution + column]
    }

    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(0.0, f32::max)
    }

    pub fn mean(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f32>() / self.values.len() as f32
    }

    pub fn nonzero(&self) -> usize {
        self.values.iter().filter(|&&v| v != 0.0).count()
    }

    /// Blue-to-red heatmap of `value / scale`, `+v` pointing up.
    pub fn to_heatmap(&self, scale: f32) -> RgbImage {
        let size = self.resolution as u32;
        let scale = if scale > 0.0 { scale } else { 1.0 };
        RgbImage::from_fn(size, size, |x, y| {
            let row = self.resolution - 1 - y as usize;
            let t = (self.get(x as usize, row) / scale).clamp(0.0, 1.0);
            let channel = |v: f32| (v * 255.0).round() as u8;
            Rgb([
                channel(t),
                channel(1.0 - (2.0 * t - 1.0).abs()),
                channel(1.0 - t),
            ])
        })
    }

    pub fn save_heatmap(&self, path: impl AsRef<Path>, scale: f32) -> Result<(), CompareError> {
        self.to_heatmap(scale).save(path.as_ref())?;
        debug!("Wrote slice heatmap {}", path.as_ref().display());
        Ok(())
    }
}

/// Sample `grid` on the plane `origin + u * basis_u + v * basis_v` over
/// `[-extent, extent]^2`, at the centers of a `resolution^2` lattice.
pub fn sample(
    grid: &VoxelGrid,
    origin: Vec3,
    basis_u: Vec3,
    basis_v: Vec3,
    extent: f32,
    resolution: usize,
) -> SliceImage {
    let step = 2.0 * extent / resolution.max(1) as f32;
    let coord = |i: usize| -extent + (i as f32 + 0.5) * step;
    let mut values = Vec::with_capacity(resolution * resolution);
    for row in 0..resolution {
        let v = coord(row);
        for column in 0..resolution {
            let u = coord(column);
            values.push(grid.sample_world(origin + u * basis_u + v * basis_v));
        }
    }
    SliceImage {
        resolution,
        extent,
        values,
    }
}

/// A movable cutting plane: origin plus an orthonormal frame whose first two
/// columns span the plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlicePlane {
    origin: Vec3,
    rotation: Mat3,
    pivot: Vec3,
}

impl SlicePlane {
    /// Plane through `origin` spanned by world X and Y, pivoting about `origin`.
    pub fn new(origin: Vec3) -> Self {
        Self {
            origin,
            rotation: Mat3::IDENTITY,
            pivot: origin,
        }
    }

    pub fn with_rotation(mut self, rotation: Mat3) -> Self {
        self.rotation = orthonormalize(rotation);
        self
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn rotation(&self) -> Mat3 {
        self.rotation
    }

    pub fn pivot(&self) -> Vec3 {
        self.pivot
    }

    pub fn set_pivot(&mut self, pivot: Vec3) {
        self.pivot = pivot;
    }

    pub fn basis_u(&self) -> Vec3 {
        self.rotation.x_axis
    }

    pub fn basis_v(&self) -> Vec3 {
        self.rotation.y_axis
    }

    pub fn normal(&self) -> Vec3 {
        self.rotation.z_axis
    }

    /// Move the plane and its pivot in world space.
    pub fn translate(&mut self, delta: Vec3) {
        self.origin += delta;
        self.pivot += delta;
    }

    /// Rotate the plane about the fixed pivot; the origin orbits it.
    pub fn rotate_about_pivot(&mut self, rotation: Quat) {
        self.origin = self.pivot + rotation * (self.origin - self.pivot);
        self.rotation = orthonormalize(Mat3::from_quat(rotation) * self.rotation);
    }

    /// Rotate the plane in place about its own origin.
    pub fn rotate_about_center(&mut self, rotation: Quat) {
        self.rotation = orthonormalize(Mat3::from_quat(rotation) * self.rotation);
    }

    pub fn sample(&self, grid: &VoxelGrid, extent: f32, resolution: usize) -> SliceImage {
        sample(grid, self.origin, self.basis_u(), self.basis_v(), extent, resolution)
    }
}

/// Gram-Schmidt on the first two columns; the third is their cross product.
fn orthonormalize(m: Mat3) -> Mat3 {
    let x = m.x_axis.normalize_or(Vec3::X);
    let y = (m.y_axis - x * x.dot(m.y_axis)).normalize_or(x.any_orthonormal_vector());
    Mat3::from_cols(x, y, x.cross(y))
}
