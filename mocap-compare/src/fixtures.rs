//! Small humanoid skeleton and synthetic motions shared by the unit tests.

use glam::{Quat, Vec3};
use mocap_data::{Motion, Posture, Skeleton, SkeletonBuilder};
use std::sync::Arc;

pub const FRAME_INTERVAL: f32 = 1.0 / 30.0;

/// Hips, spine, head, two arms ending in an index finger, two two-part legs.
pub fn humanoid() -> Arc<Skeleton> {
    let mut b = SkeletonBuilder::new("Hips");
    let spine = b.attach(0, "spine", "Spine", Vec3::Y * 0.2).unwrap();
    let head = b.attach(spine, "neck", "Head", Vec3::Y * 0.3).unwrap();
    b.set_end_site(head, Vec3::Y * 0.2).unwrap();

    for (side, sign) in [("Right", 1.0), ("Left", -1.0)] {
        let lower = side.to_ascii_lowercase();
        let arm = b
            .attach(spine, format!("{lower}_shoulder"), format!("{side}Arm"), Vec3::new(0.2 * sign, 0.25, 0.0))
            .unwrap();
        let fore = b
            .attach(arm, format!("{lower}_elbow"), format!("{side}ForeArm"), Vec3::X * 0.3 * sign)
            .unwrap();
        let finger = b
            .attach(fore, format!("{lower}_wrist"), format!("{side}HandIndex1"), Vec3::X * 0.25 * sign)
            .unwrap();
        b.set_end_site(finger, Vec3::X * 0.05 * sign).unwrap();
    }

    for (side, sign) in [("Right", 1.0), ("Left", -1.0)] {
        let lower = side.to_ascii_lowercase();
        let thigh = b
            .attach(0, format!("{lower}_hip"), format!("{side}UpLeg"), Vec3::X * 0.1 * sign)
            .unwrap();
        let shin = b
            .attach(thigh, format!("{lower}_knee"), format!("{side}Leg"), Vec3::NEG_Y * 0.4)
            .unwrap();
        b.set_end_site(shin, Vec3::NEG_Y * 0.4).unwrap();
    }

    Arc::new(b.build())
}

/// Walking gait: the root moves forward while arms and legs swing.
pub fn walk(name: &str, skeleton: &Arc<Skeleton>, frames: usize) -> Motion {
    let swing = |name: &str, phase: f32, amplitude: f32| -> (usize, Quat) {
        let joint = skeleton.find_joint(name).unwrap();
        (joint, Quat::from_rotation_x(amplitude * phase.sin()))
    };

    let postures = (0..frames)
        .map(|frame| {
            let phase = frame as f32 * 0.3;
            let mut posture = Posture::identity(skeleton);
            posture.root_position = Vec3::new(0.0, 0.9, frame as f32 * 0.05);
            for (joint, rotation) in [
                swing("right_hip", phase, 0.5),
                swing("left_hip", phase + std::f32::consts::PI, 0.5),
                swing("right_knee", phase, 0.3),
                swing("left_knee", phase + std::f32::consts::PI, 0.3),
                swing("right_shoulder", phase + std::f32::consts::PI, 0.4),
                swing("left_shoulder", phase, 0.4),
            ] {
                posture.joint_rotations[joint] = rotation;
            }
            posture
        })
        .collect();

    Motion::new(name, skeleton.clone(), FRAME_INTERVAL, postures).unwrap()
}

/// The same rest posture held for every frame.
pub fn still(name: &str, skeleton: &Arc<Skeleton>, frames: usize, root: Vec3) -> Motion {
    let mut posture = Posture::identity(skeleton);
    posture.root_position = root;
    Motion::new(name, skeleton.clone(), FRAME_INTERVAL, vec![posture; frames]).unwrap()
}

/// `motion` with its first frame held for `idle` extra frames at the start.
pub fn with_idle_start(name: &str, motion: &Motion, idle: usize) -> Motion {
    let first = motion.posture(0).clone();
    let postures = std::iter::repeat_n(first, idle)
        .chain(motion.postures().iter().cloned())
        .collect();
    Motion::new(name, motion.skeleton().clone(), motion.frame_interval(), postures).unwrap()
}
