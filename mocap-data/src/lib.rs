//! Mocap Data Crate
//!
//! Skeleton, posture and motion data model for motion comparison, together with
//! forward kinematics and world bounds. This crate has no knowledge of how
//! motions are compared; it only turns joint rotations into world-space geometry.

pub mod body;
pub mod bounds;
pub mod json;
pub mod motion;
pub mod pose;
pub mod skeleton;

pub use body::{BodyRegion, RegionGroup};
pub use bounds::WorldBounds;
pub use json::{LoadError, MotionDocument, load_motion};
pub use motion::{Motion, Posture};
pub use pose::{BoneData, FrameData, ResolvedPose, resolve_into};
pub use skeleton::{Joint, Segment, Skeleton, SkeletonBuilder, SkeletonError};
