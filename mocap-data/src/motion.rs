//! Postures and motions.

use crate::skeleton::{Skeleton, SkeletonError};
use glam::{Quat, Vec3};
use std::sync::Arc;

/// One full-body pose at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Posture {
    /// Root segment position in world space.
    pub root_position: Vec3,
    /// Root segment orientation in world space.
    pub root_orientation: Quat,
    /// Per-joint rotation of the child segment relative to the parent frame.
    pub joint_rotations: Vec<Quat>,
}

impl Posture {
    pub fn new(root_position: Vec3, root_orientation: Quat, joint_rotations: Vec<Quat>) -> Self {
        Self {
            root_position,
            root_orientation,
            joint_rotations,
        }
    }

    /// Rest pose: root at the origin, every rotation identity.
    pub fn identity(skeleton: &Skeleton) -> Self {
        Self {
            root_position: Vec3::ZERO,
            root_orientation: Quat::IDENTITY,
            joint_rotations: vec![Quat::IDENTITY; skeleton.num_joints()],
        }
    }

    /// Rotation of `segment` relative to its parent frame (world frame for the root).
    pub fn local_rotation(&self, skeleton: &Skeleton, segment: usize) -> Quat {
        match skeleton.segment(segment).parent_joint() {
            Some(joint) => self.joint_rotations[joint],
            None => self.root_orientation,
        }
    }
}

/// A named, uniformly sampled sequence of postures of one skeleton.
#[derive(Debug, Clone)]
pub struct Motion {
    name: String,
    skeleton: Arc<Skeleton>,
    frame_interval: f32,
    postures: Vec<Posture>,
}

impl Motion {
    /// Create a motion, checking every posture against the skeleton's joint count.
    pub fn new(
        name: impl Into<String>,
        skeleton: Arc<Skeleton>,
        frame_interval: f32,
        postures: Vec<Posture>,
    ) -> Result<Self, SkeletonError> {
        let expected = skeleton.num_joints();
        if let Some((frame, posture)) = postures
            .iter()
            .enumerate()
            .find(|(_, p)| p.joint_rotations.len() != expected)
        {
            return Err(SkeletonError::JointCountMismatch {
                frame,
                expected,
                found: posture.joint_rotations.len(),
            });
        }

        Ok(Self {
            name: name.into(),
            skeleton,
            frame_interval,
            postures,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    /// Seconds between consecutive frames.
    pub fn frame_interval(&self) -> f32 {
        self.frame_interval
    }

    pub fn num_frames(&self) -> usize {
        self.postures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postures.is_empty()
    }

    pub fn postures(&self) -> &[Posture] {
        &self.postures
    }

    pub fn posture(&self, frame: usize) -> &Posture {
        &self.postures[frame]
    }

    pub fn duration(&self) -> f32 {
        self.frame_interval * self.postures.len().saturating_sub(1) as f32
    }

    /// Clamp a frame index into `[0, num_frames - 1]`.
    pub fn clamp_frame(&self, frame: usize) -> usize {
        frame.min(self.postures.len().saturating_sub(1))
    }

    /// Frame index nearest to `time` seconds, clamped to the motion.
    pub fn frame_at_time(&self, time: f32) -> usize {
        if self.frame_interval <= 0.0 || time <= 0.0 {
            return 0;
        }
        let frame = (time / self.frame_interval).round() as usize;
        self.clamp_frame(frame)
    }

    /// Whether postures of the two motions can be compared.
    pub fn comparable_with(&self, other: &Motion) -> bool {
        Arc::ptr_eq(&self.skeleton, &other.skeleton) || self.skeleton.same_topology(&other.skeleton)
    }
}
