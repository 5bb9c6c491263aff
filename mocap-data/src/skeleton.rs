//! Skeleton topology stored as an index-addressed arena.
//!
//! Segments and joints reference each other by index only. The builder appends
//! segments parent-first, so joint `j` always connects an already existing
//! segment to segment `j + 1`, and iterating joints in index order walks the
//! tree from the root outward.

use crate::body::BodyRegion;
use glam::Vec3;
use thiserror::Error;

/// Errors raised while building or validating skeleton-bound data.
#[derive(Debug, Error, PartialEq)]
pub enum SkeletonError {
    #[error("Unknown segment index: {0}")]
    UnknownSegment(usize),

    #[error("Unknown segment name: {0}")]
    UnknownSegmentName(String),

    #[error("Duplicate segment name: {0}")]
    DuplicateSegment(String),

    #[error("Duplicate joint name: {0}")]
    DuplicateJoint(String),

    #[error("Frame {frame} has {found} joint rotations, skeleton has {expected} joints")]
    JointCountMismatch {
        frame: usize,
        expected: usize,
        found: usize,
    },
}

/// A joint connecting two segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    /// Adjacent segments: `[toward root, toward extremities]`.
    pub segments: [usize; 2],
}

impl Joint {
    pub fn parent_segment(&self) -> usize {
        self.segments[0]
    }

    pub fn child_segment(&self) -> usize {
        self.segments[1]
    }
}

/// A rigid body part. Offsets are expressed in the segment's own local frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub name: String,
    pub region: BodyRegion,
    parent_joint: Option<usize>,
    /// Attached joints, root-side joint first.
    joints: Vec<usize>,
    /// Offset of each entry of `joints` in this segment's frame.
    joint_offsets: Vec<Vec3>,
    end_site: Option<Vec3>,
}

impl Segment {
    fn new(name: String, parent: Option<(usize, Vec3)>) -> Self {
        let region = BodyRegion::classify(&name);
        let (joints, joint_offsets) = match parent {
            Some((joint, offset)) => (vec![joint], vec![offset]),
            None => (Vec::new(), Vec::new()),
        };
        Self {
            name,
            region,
            parent_joint: parent.map(|(joint, _)| joint),
            joints,
            joint_offsets,
            end_site: None,
        }
    }

    /// The joint leading back toward the root, `None` for the root segment.
    pub fn parent_joint(&self) -> Option<usize> {
        self.parent_joint
    }

    pub fn joints(&self) -> &[usize] {
        &self.joints
    }

    pub fn joint_offsets(&self) -> &[Vec3] {
        &self.joint_offsets
    }

    pub fn end_site(&self) -> Option<Vec3> {
        self.end_site
    }

    /// Offset of the root-side attachment point, zero for the root segment.
    pub fn origin_offset(&self) -> Vec3 {
        match self.parent_joint {
            Some(_) => self.joint_offsets[0],
            None => Vec3::ZERO,
        }
    }

    /// Joints leading away from the root, paired with their local offsets.
    pub fn child_joints(&self) -> impl Iterator<Item = (usize, Vec3)> + '_ {
        let skip = usize::from(self.parent_joint.is_some());
        self.joints
            .iter()
            .copied()
            .zip(self.joint_offsets.iter().copied())
            .skip(skip)
    }

    /// Direction of the bone in the segment's local frame: from the root-side
    /// attachment toward the first child joint, or the end site for leaves.
    pub fn bone_vector(&self) -> Option<Vec3> {
        let tip = self
            .child_joints()
            .next()
            .map(|(_, offset)| offset)
            .or(self.end_site)?;
        Some(tip - self.origin_offset())
    }

    pub fn is_leaf(&self) -> bool {
        self.child_joints().next().is_none()
    }
}

/// Immutable segment/joint tree rooted at segment 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    segments: Vec<Segment>,
    joints: Vec<Joint>,
}

impl Skeleton {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    pub fn segment(&self, index: usize) -> &Segment {
        &self.segments[index]
    }

    pub fn joint(&self, index: usize) -> &Joint {
        &self.joints[index]
    }

    pub fn find_segment(&self, name: &str) -> Option<usize> {
        self.segments.iter().position(|s| s.name == name)
    }

    pub fn find_joint(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.name == name)
    }

    /// Parent segment of `segment`, `None` for the root.
    pub fn parent_segment(&self, segment: usize) -> Option<usize> {
        self.segments[segment]
            .parent_joint
            .map(|joint| self.joints[joint].parent_segment())
    }

    /// Whether postures of `other` can be compared with postures of `self`:
    /// same segment count, naming, ordering and joint topology.
    pub fn same_topology(&self, other: &Skeleton) -> bool {
        self.segments.len() == other.segments.len()
            && self.joints.len() == other.joints.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a.name == b.name && a.joints == b.joints)
            && self
                .joints
                .iter()
                .zip(&other.joints)
                .all(|(a, b)| a.segments == b.segments)
    }
}

/// Validating builder for [`Skeleton`].
#[derive(Debug, Clone)]
pub struct SkeletonBuilder {
    segments: Vec<Segment>,
    joints: Vec<Joint>,
}

impl SkeletonBuilder {
    /// Start a skeleton with its root segment.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::new(root_name.into(), None)],
            joints: Vec::new(),
        }
    }

    /// Attach a new segment whose frame origin sits on the connecting joint.
    ///
    /// Returns the index of the new segment.
    pub fn attach(
        &mut self,
        parent: usize,
        joint_name: impl Into<String>,
        segment_name: impl Into<String>,
        offset: Vec3,
    ) -> Result<usize, SkeletonError> {
        self.attach_with_child_offset(parent, joint_name, segment_name, offset, Vec3::ZERO)
    }

    /// Attach a new segment, giving the joint offset in both adjacent frames.
    pub fn attach_with_child_offset(
        &mut self,
        parent: usize,
        joint_name: impl Into<String>,
        segment_name: impl Into<String>,
        offset_in_parent: Vec3,
        offset_in_child: Vec3,
    ) -> Result<usize, SkeletonError> {
        if parent >= self.segments.len() {
            return Err(SkeletonError::UnknownSegment(parent));
        }
        let joint_name = joint_name.into();
        let segment_name = segment_name.into();
        if self.segments.iter().any(|s| s.name == segment_name) {
            return Err(SkeletonError::DuplicateSegment(segment_name));
        }
        if self.joints.iter().any(|j| j.name == joint_name) {
            return Err(SkeletonError::DuplicateJoint(joint_name));
        }

        let joint = self.joints.len();
        let child = self.segments.len();
        self.joints.push(Joint {
            name: joint_name,
            segments: [parent, child],
        });
        self.segments[parent].joints.push(joint);
        self.segments[parent].joint_offsets.push(offset_in_parent);
        self.segments
            .push(Segment::new(segment_name, Some((joint, offset_in_child))));
        Ok(child)
    }

    pub fn set_end_site(&mut self, segment: usize, offset: Vec3) -> Result<(), SkeletonError> {
        let segment = self
            .segments
            .get_mut(segment)
            .ok_or(SkeletonError::UnknownSegment(segment))?;
        segment.end_site = Some(offset);
        Ok(())
    }

    /// Override the name-derived body region of a segment.
    pub fn set_region(&mut self, segment: usize, region: BodyRegion) -> Result<(), SkeletonError> {
        let segment = self
            .segments
            .get_mut(segment)
            .ok_or(SkeletonError::UnknownSegment(segment))?;
        segment.region = region;
        Ok(())
    }

    pub fn find_segment(&self, name: &str) -> Option<usize> {
        self.segments.iter().position(|s| s.name == name)
    }

    pub fn build(self) -> Skeleton {
        Skeleton {
            segments: self.segments,
            joints: self.joints,
        }
    }
}
