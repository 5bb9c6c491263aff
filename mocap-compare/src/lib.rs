//! Comparison of two motions of the same skeleton.
//!
//! [`align`] warps the motions onto each other in time and ranks the body parts
//! by how much they differ. [`voxel`] rasterizes both motions into shared voxel
//! grids and diffs them, [`cache`] persists the accumulated grids, and
//! [`slice`] cuts planar sections out of any grid.

pub mod align;
pub mod cache;
pub mod config;
pub mod error;
pub mod slice;
pub mod voxel;

#[cfg(test)]
mod fixtures;

pub use align::{Alignment, AlignmentPath, FeatureKind, PlaybackMode, PoseDistance, TemporalAligner};
pub use cache::{CacheError, CacheOutcome, VoxelCache};
pub use config::{AlignConfig, CompareConfig, VoxelConfig};
pub use error::CompareError;
pub use slice::{SliceImage, SlicePlane};
pub use voxel::{Feature, GridSource, NormMode, Selection, SpatialAccumulator, VoxelGrid, VoxelView};
