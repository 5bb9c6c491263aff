//! On-disk cache of accumulated voxel grids.

mod format;
mod store;

pub use format::{FORMAT_VERSION, GridRecord, MAGIC, decode_grid, decode_segments, encode_grid, encode_segments};
pub use store::{CacheMetadata, CacheOutcome, VoxelCache};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not a voxel cache file")]
    BadMagic,

    #[error("Unsupported cache format version {0}")]
    UnsupportedVersion(u32),

    #[error("Cache file truncated")]
    Truncated,

    #[error("Malformed cache file: {0}")]
    Malformed(String),

    #[error("Cache does not match request: {0}")]
    MetadataMismatch(String),
}
