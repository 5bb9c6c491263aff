//! Error types for motion comparison.

use mocap_data::Motion;
use thiserror::Error;

/// Errors raised before or while comparing two motions.
#[derive(Debug, Error)]
pub enum CompareError {
    #[error("Motion {0} has no frames")]
    EmptyMotion(String),

    #[error("Motions {a} and {b} use different skeleton topologies")]
    TopologyMismatch { a: String, b: String },

    #[error("Invalid voxel resolution: {0}")]
    InvalidResolution(usize),

    #[error("Segment index {index} out of range for {count} segments")]
    InvalidSegment { index: usize, count: usize },

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Reject empty motions and motions built on different skeleton topologies.
pub fn ensure_comparable(a: &Motion, b: &Motion) -> Result<(), CompareError> {
    for motion in [a, b] {
        if motion.is_empty() {
            return Err(CompareError::EmptyMotion(motion.name().to_string()));
        }
    }
    if !a.comparable_with(b) {
        return Err(CompareError::TopologyMismatch {
            a: a.name().to_string(),
            b: b.name().to_string(),
        });
    }
    Ok(())
}
