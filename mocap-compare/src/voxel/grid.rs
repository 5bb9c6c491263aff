//! Fixed-resolution scalar grids over the shared world bounds.

use glam::{Mat3, Vec3};
use mocap_data::WorldBounds;

/// Voxel-to-world mapping: `resolution` cells per axis spread over `bounds`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub resolution: usize,
    pub bounds: WorldBounds,
}

impl GridLayout {
    pub fn new(resolution: usize, bounds: WorldBounds) -> Self {
        Self { resolution, bounds }
    }

    pub fn cell_count(&self) -> usize {
        self.resolution * self.resolution * self.resolution
    }

    /// World-space edge lengths of one voxel.
    pub fn voxel_size(&self) -> Vec3 {
        self.bounds.extent() / self.resolution as f32
    }

    /// Flat index, x fastest.
    pub fn index(&self, [x, y, z]: [usize; 3]) -> usize {
        (z * self.resolution + y) * self.resolution + x
    }

    pub fn cell_center(&self, [x, y, z]: [usize; 3]) -> Vec3 {
        let cell = Vec3::new(x as f32, y as f32, z as f32) + 0.5;
        self.bounds.min + cell * self.voxel_size()
    }

    /// Voxel containing `point`, `None` outside the bounds.
    pub fn voxel_of(&self, point: Vec3) -> Option<[usize; 3]> {
        let cell = ((point - self.bounds.min) / self.voxel_size()).floor();
        let limit = self.resolution as f32;
        let inside = |v: f32| v >= 0.0 && v < limit;
        (inside(cell.x) && inside(cell.y) && inside(cell.z))
            .then(|| [cell.x as usize, cell.y as usize, cell.z as usize])
    }

    /// Inclusive voxel index range overlapping the box `[min, max]`, clamped
    /// to the grid. `None` when the box misses the grid entirely.
    pub fn index_range(&self, min: Vec3, max: Vec3) -> Option<([usize; 3], [usize; 3])> {
        let size = self.voxel_size();
        let lo = ((min - self.bounds.min) / size).floor();
        let hi = ((max - self.bounds.min) / size).floor();
        let limit = self.resolution as f32 - 1.0;
        if lo.cmpgt(Vec3::splat(limit)).any() || hi.cmplt(Vec3::ZERO).any() || lo.is_nan() || hi.is_nan() {
            return None;
        }
        let lo = lo.clamp(Vec3::ZERO, Vec3::splat(limit));
        let hi = hi.clamp(Vec3::ZERO, Vec3::splat(limit));
        Some((
            [lo.x as usize, lo.y as usize, lo.z as usize],
            [hi.x as usize, hi.y as usize, hi.z as usize],
        ))
    }
}

/// Root position and orientation a grid is anchored to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferencePose {
    pub root_position: Vec3,
    pub root_orientation: Mat3,
}

impl ReferencePose {
    /// `[position.xyz, orientation columns]` as stored in cache files.
    pub fn to_array(&self) -> [f32; 12] {
        let mut values = [0.0; 12];
        values[..3].copy_from_slice(&self.root_position.to_array());
        values[3..].copy_from_slice(&self.root_orientation.to_cols_array());
        values
    }

    pub fn from_array(values: &[f32; 12]) -> Self {
        Self {
            root_position: Vec3::new(values[0], values[1], values[2]),
            root_orientation: Mat3::from_cols_slice(&values[3..]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    layout: GridLayout,
    cells: Vec<f32>,
    reference: Option<ReferencePose>,
}

impl VoxelGrid {
    pub fn new(layout: GridLayout) -> Self {
        Self {
            layout,
            cells: vec![0.0; layout.cell_count()],
            reference: None,
        }
    }

    /// Grid from stored cells; `None` when the cell count does not match the layout.
    pub fn from_cells(
        layout: GridLayout,
        cells: Vec<f32>,
        reference: Option<ReferencePose>,
    ) -> Option<Self> {
        (cells.len() == layout.cell_count()).then_some(Self {
            layout,
            cells,
            reference,
        })
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn resolution(&self) -> usize {
        self.layout.resolution
    }

    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [f32] {
        &mut self.cells
    }

    pub fn reference(&self) -> Option<&ReferencePose> {
        self.reference.as_ref()
    }

    pub fn set_reference(&mut self, reference: Option<ReferencePose>) {
        self.reference = reference;
    }

    pub fn get(&self, voxel: [usize; 3]) -> f32 {
        self.cells[self.layout.index(voxel)]
    }

    /// Nearest-voxel lookup; 0 outside the grid.
    pub fn sample_world(&self, point: Vec3) -> f32 {
        self.layout
            .voxel_of(point)
            .map_or(0.0, |voxel| self.get(voxel))
    }

    pub fn clear(&mut self) {
        self.cells.fill(0.0);
        self.reference = None;
    }

    pub fn max(&self) -> f32 {
        self.cells.iter().copied().fold(0.0, f32::max)
    }

    pub fn sum(&self) -> f32 {
        self.cells.iter().sum()
    }

    /// Overwrite with `|a - b|` per cell and return the largest difference.
    pub fn set_abs_diff(&mut self, a: &VoxelGrid, b: &VoxelGrid) -> f32 {
        let mut max = 0.0f32;
        for ((out, &va), &vb) in self.cells.iter_mut().zip(&a.cells).zip(&b.cells) {
            *out = (va - vb).abs();
            max = max.max(*out);
        }
        max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> GridLayout {
        GridLayout::new(4, WorldBounds::new(Vec3::ZERO, Vec3::splat(4.0)))
    }

    #[test]
    fn test_voxel_mapping() {
        let layout = layout();
        assert_eq!(layout.voxel_of(Vec3::new(0.5, 1.5, 3.9)), Some([0, 1, 3]));
        assert_eq!(layout.voxel_of(Vec3::new(-0.1, 1.0, 1.0)), None);
        assert_eq!(layout.voxel_of(Vec3::new(4.0, 1.0, 1.0)), None);
        assert_eq!(layout.cell_center([1, 2, 3]), Vec3::new(1.5, 2.5, 3.5));
        assert_eq!(layout.index([1, 2, 3]), 1 + 2 * 4 + 3 * 16);
    }

    #[test]
    fn test_index_range_clamps() {
        let layout = layout();
        assert_eq!(
            layout.index_range(Vec3::splat(-3.0), Vec3::new(1.5, 2.5, 9.0)),
            Some(([0, 0, 0], [1, 2, 3]))
        );
        assert_eq!(layout.index_range(Vec3::splat(5.0), Vec3::splat(6.0)), None);
    }

    #[test]
    fn test_sample_world_and_diff() {
        let layout = layout();
        let mut a = VoxelGrid::new(layout);
        let b = VoxelGrid::new(layout);
        a.cells_mut()[layout.index([2, 2, 2])] = -3.0;
        assert_eq!(a.sample_world(Vec3::splat(2.5)), -3.0);
        assert_eq!(a.sample_world(Vec3::splat(10.0)), 0.0);

        let mut diff = VoxelGrid::new(layout);
        assert_eq!(diff.set_abs_diff(&a, &b), 3.0);
        assert_eq!(diff.get([2, 2, 2]), 3.0);
        assert!(VoxelGrid::from_cells(layout, vec![0.0; 3], None).is_none());
    }

    #[test]
    fn test_reference_pose_array() {
        let reference = ReferencePose {
            root_position: Vec3::new(1.0, 2.0, 3.0),
            root_orientation: Mat3::from_rotation_y(0.7),
        };
        assert_eq!(ReferencePose::from_array(&reference.to_array()), reference);
    }
}
