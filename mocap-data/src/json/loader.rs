//! Motion document loading and saving

use crate::json::MotionDocument;
use crate::motion::Motion;
use crate::skeleton::SkeletonError;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while reading a motion document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Skeleton error: {0}")]
    Skeleton(#[from] SkeletonError),

    #[error("Segment {segment} references unknown parent {parent}")]
    UnknownParent { segment: String, parent: String },

    #[error("Invalid rotation in frame {frame}")]
    InvalidRotation { frame: usize },

    #[error("Motion {0} does not match the shared skeleton")]
    SkeletonMismatch(String),
}

/// Read a [`MotionDocument`] without building the motion.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_motion_document(path: impl AsRef<Path>) -> Result<MotionDocument, LoadError> {
    debug!("Loading motion document");
    let file = File::open(path.as_ref())?;
    let document: MotionDocument =
        serde_json::from_reader(BufReader::new(file)).inspect_err(|e| {
            warn!("Failed to parse motion document: {}", e);
        })?;

    info!(
        "Motion document parsed: {} ({} segments, {} frames)",
        document.name,
        document.skeleton.segments.len() + 1,
        document.frames.len()
    );
    Ok(document)
}

/// Read a motion document and build its skeleton and motion.
pub fn load_motion(path: impl AsRef<Path>) -> Result<Motion, LoadError> {
    load_motion_document(path)?.into_motion()
}

pub fn save_motion_document(
    document: &MotionDocument,
    path: impl AsRef<Path>,
) -> Result<(), LoadError> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(&mut writer, document)?;
    writer.flush()?;
    debug!("Saved motion document {} to {}", document.name, path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::Posture;
    use crate::skeleton::SkeletonBuilder;
    use glam::{Quat, Vec3};
    use std::sync::Arc;

    #[test]
    fn test_save_then_load() {
        let mut builder = SkeletonBuilder::new("Hips");
        builder.attach(0, "Spine", "Spine", Vec3::Y).unwrap();
        let skeleton = Arc::new(builder.build());
        let mut posture = Posture::identity(&skeleton);
        posture.joint_rotations[0] = Quat::from_rotation_z(0.5);
        let motion = Motion::new("bend", skeleton, 0.1, vec![posture]).unwrap();

        let path = std::env::temp_dir().join(format!("mocap-data-{}.json", std::process::id()));
        save_motion_document(&MotionDocument::from_motion(&motion), &path).unwrap();
        let loaded = load_motion(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.name(), "bend");
        assert_eq!(loaded.num_frames(), 1);
        assert!(loaded.comparable_with(&motion));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_motion("/nonexistent/motion.json");
        assert!(matches!(result, Err(LoadError::Io(_))));
    }
}
