use mocap_compare::CompareError;
use mocap_data::LoadError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to load motion: {0}")]
    Load(#[from] LoadError),

    #[error(transparent)]
    Compare(#[from] CompareError),

    #[error("Unknown segment: {0}")]
    UnknownSegment(String),

    #[error("Expected a point as x,y,z, got {0} values")]
    InvalidPoint(usize),
}
