//! Forward kinematics: world-space transforms of one posture.
//!
//! [`resolve_into`] is the allocation-free core used by every consumer.
//! [`ResolvedPose`] owns its buffers and can be re-resolved in place, and
//! [`FrameData`] pairs two consecutive resolved frames so bone speeds can be
//! derived for rendering and voxel accumulation.

use crate::motion::{Motion, Posture};
use crate::skeleton::Skeleton;
use glam::{Affine3A, Vec3};

/// Resolve `posture` into caller-provided buffers.
///
/// `segment_transforms` must hold `skeleton.num_segments()` entries and
/// `joint_positions` `skeleton.num_joints()` entries.
pub fn resolve_into(
    skeleton: &Skeleton,
    posture: &Posture,
    segment_transforms: &mut [Affine3A],
    joint_positions: &mut [Vec3],
) {
    debug_assert_eq!(segment_transforms.len(), skeleton.num_segments());
    debug_assert_eq!(joint_positions.len(), skeleton.num_joints());
    debug_assert_eq!(posture.joint_rotations.len(), skeleton.num_joints());

    segment_transforms[0] =
        Affine3A::from_rotation_translation(posture.root_orientation, posture.root_position);

    // Joints are stored parent-first, so each parent transform is ready before use.
    for (index, joint) in skeleton.joints().iter().enumerate() {
        let parent = skeleton.segment(joint.parent_segment());
        let child = skeleton.segment(joint.child_segment());
        let offset = parent.joint_offsets()[parent
            .joints()
            .iter()
            .position(|&j| j == index)
            .unwrap_or(0)];

        let parent_transform = segment_transforms[joint.parent_segment()];
        joint_positions[index] = parent_transform.transform_point3(offset);
        segment_transforms[joint.child_segment()] = parent_transform
            * Affine3A::from_translation(offset)
            * Affine3A::from_quat(posture.joint_rotations[index])
            * Affine3A::from_translation(-child.origin_offset());
    }
}

/// World-space transforms and joint positions for one posture.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPose {
    pub segment_transforms: Vec<Affine3A>,
    pub joint_positions: Vec<Vec3>,
}

impl ResolvedPose {
    /// Buffers sized for `skeleton`, filled with identity transforms.
    pub fn new(skeleton: &Skeleton) -> Self {
        Self {
            segment_transforms: vec![Affine3A::IDENTITY; skeleton.num_segments()],
            joint_positions: vec![Vec3::ZERO; skeleton.num_joints()],
        }
    }

    pub fn resolve(skeleton: &Skeleton, posture: &Posture) -> Self {
        let mut pose = Self::new(skeleton);
        pose.update(skeleton, posture);
        pose
    }

    /// Re-resolve in place, reusing the buffers.
    pub fn update(&mut self, skeleton: &Skeleton, posture: &Posture) {
        resolve_into(
            skeleton,
            posture,
            &mut self.segment_transforms,
            &mut self.joint_positions,
        );
    }

    /// Origin of the segment's local frame in world space.
    pub fn segment_origin(&self, segment: usize) -> Vec3 {
        self.segment_transforms[segment].translation.into()
    }

    pub fn end_site_position(&self, skeleton: &Skeleton, segment: usize) -> Option<Vec3> {
        skeleton
            .segment(segment)
            .end_site()
            .map(|offset| self.segment_transforms[segment].transform_point3(offset))
    }

    /// Every world point of the pose: segment origins, joints and end sites.
    pub fn points<'a>(&'a self, skeleton: &'a Skeleton) -> impl Iterator<Item = Vec3> + 'a {
        let origins = (0..skeleton.num_segments()).map(move |s| self.segment_origin(s));
        let end_sites = (0..skeleton.num_segments())
            .filter_map(move |s| self.end_site_position(skeleton, s));
        origins
            .chain(self.joint_positions.iter().copied())
            .chain(end_sites)
    }

    /// Bone endpoints `(segment, start, end)` in a stable order.
    ///
    /// Each segment yields one bone from its root-side attachment to every child
    /// joint, plus one to its end site when present.
    pub fn bone_endpoints(&self, skeleton: &Skeleton) -> Vec<(usize, Vec3, Vec3)> {
        let mut bones = Vec::with_capacity(skeleton.num_joints() + 1);
        for (index, segment) in skeleton.segments().iter().enumerate() {
            let transform = self.segment_transforms[index];
            let start = transform.transform_point3(segment.origin_offset());
            for (joint, _) in segment.child_joints() {
                bones.push((index, start, self.joint_positions[joint]));
            }
            if let Some(end) = self.end_site_position(skeleton, index) {
                bones.push((index, start, end));
            }
        }
        bones
    }
}

/// One renderable bone with its endpoint speeds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneData {
    pub start: Vec3,
    pub end: Vec3,
    /// World units per second.
    pub start_speed: f32,
    pub end_speed: f32,
    /// Owning segment index.
    pub segment: usize,
}

impl BoneData {
    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }

    /// Speed at parameter `t` in `[0, 1]` along the bone.
    pub fn speed_at(&self, t: f32) -> f32 {
        self.start_speed + (self.end_speed - self.start_speed) * t
    }
}

/// Resolved current and preceding frame of one motion.
#[derive(Debug, Clone)]
pub struct FrameData {
    pub current: ResolvedPose,
    /// Frame the speeds are measured against; the following frame for the
    /// first frame of a motion.
    pub previous: ResolvedPose,
    pub frame_interval: f32,
}

impl FrameData {
    /// Resolve frame `frame` of `motion` together with its predecessor.
    ///
    /// The first frame is paired with the second (a forward difference), so a
    /// motion that is already moving starts at its actual speed. A single-frame
    /// motion has zero speed.
    pub fn at_frame(motion: &Motion, frame: usize) -> Self {
        let skeleton = motion.skeleton();
        let frame = motion.clamp_frame(frame);
        let current = ResolvedPose::resolve(skeleton, motion.posture(frame));
        let neighbour = match frame {
            0 => motion.clamp_frame(1),
            _ => frame - 1,
        };
        let previous = if neighbour == frame {
            current.clone()
        } else {
            ResolvedPose::resolve(skeleton, motion.posture(neighbour))
        };
        Self {
            current,
            previous,
            frame_interval: motion.frame_interval(),
        }
    }

    /// Bones of the current frame with endpoint speeds from the preceding frame.
    pub fn bones(&self, skeleton: &Skeleton) -> Vec<BoneData> {
        let inv_dt = if self.frame_interval > 0.0 {
            1.0 / self.frame_interval
        } else {
            0.0
        };
        let current = self.current.bone_endpoints(skeleton);
        let previous = self.previous.bone_endpoints(skeleton);
        current
            .into_iter()
            .zip(previous)
            .map(|((segment, start, end), (_, prev_start, prev_end))| BoneData {
                start,
                end,
                start_speed: start.distance(prev_start) * inv_dt,
                end_speed: end.distance(prev_end) * inv_dt,
                segment,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::SkeletonBuilder;
    use glam::Quat;
    use std::f32::consts::FRAC_PI_2;
    use std::sync::Arc;

    /// Hips -> Spine -> Head, plus Hips -> RightUpLeg -> RightLeg.
    fn skeleton() -> Skeleton {
        let mut b = SkeletonBuilder::new("Hips");
        let spine = b.attach(0, "j_spine", "Spine", Vec3::new(0.0, 1.0, 0.0)).unwrap();
        let head = b.attach(spine, "j_neck", "Head", Vec3::new(0.0, 2.0, 0.0)).unwrap();
        b.set_end_site(head, Vec3::new(0.0, 0.5, 0.0)).unwrap();
        let thigh = b.attach(0, "j_hip", "RightUpLeg", Vec3::new(-0.5, 0.0, 0.0)).unwrap();
        let shin = b.attach(thigh, "j_knee", "RightLeg", Vec3::new(0.0, -2.0, 0.0)).unwrap();
        b.set_end_site(shin, Vec3::new(0.0, -2.0, 0.0)).unwrap();
        b.build()
    }

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_identity_posture_sums_offsets() {
        let skeleton = skeleton();
        let pose = ResolvedPose::resolve(&skeleton, &Posture::identity(&skeleton));

        assert!(approx(pose.joint_positions[0], Vec3::new(0.0, 1.0, 0.0)));
        assert!(approx(pose.joint_positions[1], Vec3::new(0.0, 3.0, 0.0)));
        assert!(approx(pose.joint_positions[2], Vec3::new(-0.5, 0.0, 0.0)));
        assert!(approx(pose.joint_positions[3], Vec3::new(-0.5, -2.0, 0.0)));
        assert!(approx(
            pose.end_site_position(&skeleton, 4).unwrap(),
            Vec3::new(-0.5, -4.0, 0.0)
        ));
    }

    #[test]
    fn test_rotation_composes_down_the_chain() {
        let skeleton = skeleton();
        let mut posture = Posture::identity(&skeleton);
        posture.root_position = Vec3::new(10.0, 0.0, 0.0);
        // Bend the spine 90 degrees about Z: the head chain now points along -X.
        posture.joint_rotations[0] = Quat::from_rotation_z(FRAC_PI_2);

        let pose = ResolvedPose::resolve(&skeleton, &posture);
        assert!(approx(pose.joint_positions[0], Vec3::new(10.0, 1.0, 0.0)));
        assert!(approx(pose.joint_positions[1], Vec3::new(8.0, 1.0, 0.0)));
        assert!(approx(
            pose.end_site_position(&skeleton, 2).unwrap(),
            Vec3::new(7.5, 1.0, 0.0)
        ));
        // The leg chain is unaffected.
        assert!(approx(pose.joint_positions[3], Vec3::new(9.5, -2.0, 0.0)));
    }

    #[test]
    fn test_root_orientation_rotates_everything() {
        let skeleton = skeleton();
        let mut posture = Posture::identity(&skeleton);
        posture.root_orientation = Quat::from_rotation_x(FRAC_PI_2);

        let pose = ResolvedPose::resolve(&skeleton, &posture);
        assert!(approx(pose.joint_positions[0], Vec3::new(0.0, 0.0, 1.0)));
        assert!(approx(pose.joint_positions[1], Vec3::new(0.0, 0.0, 3.0)));
    }

    #[test]
    fn test_child_offset_shifts_segment_origin() {
        let mut b = SkeletonBuilder::new("Hips");
        b.attach_with_child_offset(0, "j", "Spine", Vec3::Y, Vec3::new(0.0, -0.5, 0.0))
            .unwrap();
        let skeleton = b.build();
        let pose = ResolvedPose::resolve(&skeleton, &Posture::identity(&skeleton));
        assert!(approx(pose.joint_positions[0], Vec3::Y));
        assert!(approx(pose.segment_origin(1), Vec3::new(0.0, 1.5, 0.0)));
    }

    #[test]
    fn test_bone_speeds_from_neighbouring_frame() {
        let skeleton = Arc::new(skeleton());
        let first = Posture::identity(&skeleton);
        let mut second = first.clone();
        second.root_position = Vec3::new(0.0, 0.0, 2.0);
        let motion = Motion::new("slide", skeleton.clone(), 0.5, vec![first, second]).unwrap();

        let first = FrameData::at_frame(&motion, 0).bones(&skeleton);
        let moving = FrameData::at_frame(&motion, 1).bones(&skeleton);
        assert_eq!(moving.len(), first.len());
        for bone in first.iter().chain(&moving) {
            assert!((bone.start_speed - 4.0).abs() < 1e-4);
            assert!((bone.end_speed - 4.0).abs() < 1e-4);
        }

        let single = Motion::new("pose", skeleton.clone(), 0.5, vec![Posture::identity(&skeleton)]).unwrap();
        let still = FrameData::at_frame(&single, 0).bones(&skeleton);
        assert!(still.iter().all(|b| b.start_speed == 0.0 && b.end_speed == 0.0));
    }

    #[test]
    fn test_bone_endpoints_cover_every_link() {
        let skeleton = skeleton();
        let pose = ResolvedPose::resolve(&skeleton, &Posture::identity(&skeleton));
        let bones = pose.bone_endpoints(&skeleton);
        // Four joints plus two end sites.
        assert_eq!(bones.len(), 6);
        assert_eq!(bones[0].0, 0);
        assert_eq!(pose.points(&skeleton).count(), 5 + 4 + 2);
    }
}
