//! Serde document types mirroring the skeleton/motion data model

use crate::body::BodyRegion;
use crate::json::LoadError;
use crate::motion::{Motion, Posture};
use crate::skeleton::{Skeleton, SkeletonBuilder};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One non-root segment and the joint connecting it to its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDocument {
    pub name: String,
    /// Name of the parent segment; must appear earlier in the list.
    pub parent: String,
    /// Joint name, defaults to the segment name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joint: Option<String>,
    /// Joint offset in the parent segment's frame.
    pub offset: [f32; 3],
    /// Joint offset in this segment's frame.
    #[serde(default)]
    pub child_offset: [f32; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_site: Option<[f32; 3]>,
    /// Overrides the name-based body region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<BodyRegion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletonDocument {
    pub root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_end_site: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_region: Option<BodyRegion>,
    #[serde(default)]
    pub segments: Vec<SegmentDocument>,
}

/// One posture. Quaternions are `[x, y, z, w]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDocument {
    pub root_position: [f32; 3],
    pub root_rotation: [f32; 4],
    pub joint_rotations: Vec<[f32; 4]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionDocument {
    pub name: String,
    /// Seconds between frames.
    pub frame_interval: f32,
    pub skeleton: SkeletonDocument,
    pub frames: Vec<FrameDocument>,
}

fn quat(frame: usize, q: [f32; 4]) -> Result<Quat, LoadError> {
    let q = Quat::from_array(q);
    if q.length_squared() <= f32::EPSILON || !q.is_finite() {
        return Err(LoadError::InvalidRotation { frame });
    }
    Ok(q.normalize())
}

impl SkeletonDocument {
    pub fn build(&self) -> Result<Skeleton, LoadError> {
        let mut builder = SkeletonBuilder::new(self.root.clone());
        if let Some(end) = self.root_end_site {
            builder.set_end_site(0, Vec3::from_array(end))?;
        }
        if let Some(region) = self.root_region {
            builder.set_region(0, region)?;
        }

        for segment in &self.segments {
            let parent = builder
                .find_segment(&segment.parent)
                .ok_or_else(|| LoadError::UnknownParent {
                    segment: segment.name.clone(),
                    parent: segment.parent.clone(),
                })?;
            let joint = segment.joint.clone().unwrap_or_else(|| segment.name.clone());
            let index = builder.attach_with_child_offset(
                parent,
                joint,
                segment.name.clone(),
                Vec3::from_array(segment.offset),
                Vec3::from_array(segment.child_offset),
            )?;
            if let Some(end) = segment.end_site {
                builder.set_end_site(index, Vec3::from_array(end))?;
            }
            if let Some(region) = segment.region {
                builder.set_region(index, region)?;
            }
        }

        Ok(builder.build())
    }

    pub fn from_skeleton(skeleton: &Skeleton) -> Self {
        let root = skeleton.segment(0);
        let segments = skeleton
            .joints()
            .iter()
            .enumerate()
            .map(|(joint_index, joint)| {
                let parent = skeleton.segment(joint.parent_segment());
                let child = skeleton.segment(joint.child_segment());
                let offset = parent
                    .child_joints()
                    .find(|(j, _)| *j == joint_index)
                    .map(|(_, offset)| offset)
                    .unwrap_or_default();
                SegmentDocument {
                    name: child.name.clone(),
                    parent: parent.name.clone(),
                    joint: (joint.name != child.name).then(|| joint.name.clone()),
                    offset: offset.to_array(),
                    child_offset: child.origin_offset().to_array(),
                    end_site: child.end_site().map(|e| e.to_array()),
                    region: (child.region != BodyRegion::classify(&child.name))
                        .then_some(child.region),
                }
            })
            .collect();

        Self {
            root: root.name.clone(),
            root_end_site: root.end_site().map(|e| e.to_array()),
            root_region: (root.region != BodyRegion::classify(&root.name)).then_some(root.region),
            segments,
        }
    }
}

impl MotionDocument {
    /// Build the skeleton and motion described by this document.
    pub fn into_motion(self) -> Result<Motion, LoadError> {
        let skeleton = Arc::new(self.skeleton.build()?);
        self.into_motion_on(skeleton)
    }

    /// Build the motion against an existing skeleton, which must match the
    /// document's own skeleton description.
    pub fn into_motion_with(self, skeleton: Arc<Skeleton>) -> Result<Motion, LoadError> {
        if !self.skeleton.build()?.same_topology(&skeleton) {
            return Err(LoadError::SkeletonMismatch(self.name));
        }
        self.into_motion_on(skeleton)
    }

    fn into_motion_on(self, skeleton: Arc<Skeleton>) -> Result<Motion, LoadError> {
        let postures = self
            .frames
            .iter()
            .enumerate()
            .map(|(frame, doc)| {
                let joint_rotations = doc
                    .joint_rotations
                    .iter()
                    .map(|&q| quat(frame, q))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Posture::new(
                    Vec3::from_array(doc.root_position),
                    quat(frame, doc.root_rotation)?,
                    joint_rotations,
                ))
            })
            .collect::<Result<Vec<_>, LoadError>>()?;

        Ok(Motion::new(self.name, skeleton, self.frame_interval, postures)?)
    }

    pub fn from_motion(motion: &Motion) -> Self {
        let frames = motion
            .postures()
            .iter()
            .map(|p| FrameDocument {
                root_position: p.root_position.to_array(),
                root_rotation: p.root_orientation.to_array(),
                joint_rotations: p.joint_rotations.iter().map(|q| q.to_array()).collect(),
            })
            .collect();

        Self {
            name: motion.name().to_string(),
            frame_interval: motion.frame_interval(),
            skeleton: SkeletonDocument::from_skeleton(motion.skeleton()),
            frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> MotionDocument {
        serde_json::from_str(
            r#"{
                "name": "wave",
                "frame_interval": 0.0333,
                "skeleton": {
                    "root": "Hips",
                    "segments": [
                        { "name": "Spine", "parent": "Hips", "offset": [0, 1, 0] },
                        { "name": "RightArm", "parent": "Spine", "joint": "RightShoulder",
                          "offset": [1, 0.5, 0], "end_site": [1, 0, 0] },
                        { "name": "Prop", "parent": "RightArm", "offset": [1, 0, 0],
                          "region": "right_arm" }
                    ]
                },
                "frames": [
                    { "root_position": [0, 0, 0], "root_rotation": [0, 0, 0, 1],
                      "joint_rotations": [[0, 0, 0, 1], [0, 0, 0, 2], [0, 0, 0, 1]] }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_document_builds_motion() {
        let motion = document().into_motion().unwrap();
        let skeleton = motion.skeleton();
        assert_eq!(skeleton.num_segments(), 4);
        assert_eq!(skeleton.find_joint("RightShoulder"), Some(1));
        assert_eq!(skeleton.segment(3).region, BodyRegion::RightArm);
        assert_eq!(skeleton.segment(2).end_site(), Some(Vec3::X));
        // Rotations are normalized on load.
        assert!((motion.posture(0).joint_rotations[1].length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_parent_is_rejected() {
        let mut doc = document();
        doc.skeleton.segments[0].parent = "Pelvis".into();
        assert!(matches!(
            doc.into_motion(),
            Err(LoadError::UnknownParent { .. })
        ));
    }

    #[test]
    fn test_zero_rotation_is_rejected() {
        let mut doc = document();
        doc.frames[0].joint_rotations[0] = [0.0; 4];
        assert!(matches!(
            doc.into_motion(),
            Err(LoadError::InvalidRotation { frame: 0 })
        ));
    }

    #[test]
    fn test_document_survives_motion_conversion() {
        let motion = document().into_motion().unwrap();
        let again = MotionDocument::from_motion(&motion).into_motion().unwrap();
        assert!(motion.skeleton().same_topology(again.skeleton()));
        for (a, b) in motion.postures().iter().zip(again.postures()) {
            assert_eq!(a.root_position, b.root_position);
            for (qa, qb) in a.joint_rotations.iter().zip(&b.joint_rotations) {
                assert!(qa.abs_diff_eq(*qb, 1e-6));
            }
        }
    }
}
