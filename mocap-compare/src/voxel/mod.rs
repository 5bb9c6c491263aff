//! Spatial comparison of two motions on a shared voxel grid.

mod accumulator;
mod grid;
mod raster;
mod selection;

pub use accumulator::{
    Feature, GridSource, MIN_NORMALIZER, MotionVoxels, NormMode, SegmentVoxelData, SpatialAccumulator,
    VoxelState,
};
pub use grid::{GridLayout, ReferencePose, VoxelGrid};
pub use raster::{Capsule, rasterize};
pub use selection::{Selection, VoxelView};
