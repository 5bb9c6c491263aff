//! Per-frame pose dissimilarity strategies.
//!
//! The aligner only sees [`PoseDistance`]; positional and angular comparison
//! are two implementations, and any closure with the same shape works too.

use glam::Vec3;
use mocap_data::{Posture, ResolvedPose, Skeleton};
use serde::{Deserialize, Serialize};

/// One frame of one motion, in both local and resolved form, with the
/// skeleton of the motion it came from.
#[derive(Debug, Clone, Copy)]
pub struct PoseSample<'a> {
    pub skeleton: &'a Skeleton,
    pub posture: &'a Posture,
    pub pose: &'a ResolvedPose,
}

impl PoseSample<'_> {
    /// Unit bone direction of `segment` in its parent frame, `None` for bones
    /// without length.
    pub fn bone_direction(&self, segment: usize) -> Option<Vec3> {
        let bone = self.skeleton.segment(segment).bone_vector()?.try_normalize()?;
        Some(self.posture.local_rotation(self.skeleton, segment) * bone)
    }
}

/// Dissimilarity of one segment between two poses of skeletons with the same
/// topology. `skeleton` describes the shared hierarchy; offsets and bone
/// vectors are read from each sample's own skeleton.
pub trait PoseDistance {
    fn segment_distance(
        &self,
        skeleton: &Skeleton,
        segment: usize,
        a: PoseSample<'_>,
        b: PoseSample<'_>,
    ) -> f32;
}

impl<F> PoseDistance for F
where
    F: Fn(&Skeleton, usize, PoseSample<'_>, PoseSample<'_>) -> f32,
{
    fn segment_distance(
        &self,
        skeleton: &Skeleton,
        segment: usize,
        a: PoseSample<'_>,
        b: PoseSample<'_>,
    ) -> f32 {
        self(skeleton, segment, a, b)
    }
}

/// Euclidean distance between the segments' world reference points.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalDistance;

impl PoseDistance for PositionalDistance {
    fn segment_distance(
        &self,
        _skeleton: &Skeleton,
        segment: usize,
        a: PoseSample<'_>,
        b: PoseSample<'_>,
    ) -> f32 {
        a.pose
            .segment_origin(segment)
            .distance(b.pose.segment_origin(segment))
    }
}

/// Angle between the segments' bone directions in their parent frames,
/// mapped to `[0, 1]`: 0 when aligned, 1 when opposite.
#[derive(Debug, Clone, Copy, Default)]
pub struct AngularDistance;

impl PoseDistance for AngularDistance {
    fn segment_distance(
        &self,
        _skeleton: &Skeleton,
        segment: usize,
        a: PoseSample<'_>,
        b: PoseSample<'_>,
    ) -> f32 {
        let (Some(dir_a), Some(dir_b)) = (a.bone_direction(segment), b.bone_direction(segment)) else {
            return 0.0;
        };
        let cos = dir_a.dot(dir_b).clamp(-1.0, 1.0);
        (1.0 - cos) * 0.5
    }
}

/// Built-in comparison features.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    #[default]
    Positional,
    Angular,
}

impl PoseDistance for FeatureKind {
    fn segment_distance(
        &self,
        skeleton: &Skeleton,
        segment: usize,
        a: PoseSample<'_>,
        b: PoseSample<'_>,
    ) -> f32 {
        match self {
            FeatureKind::Positional => PositionalDistance.segment_distance(skeleton, segment, a, b),
            FeatureKind::Angular => AngularDistance.segment_distance(skeleton, segment, a, b),
        }
    }
}

/// Aggregate cost of one frame pair; per-segment costs are written to
/// `segment_costs` (excluded segments get 0).
pub fn frame_cost<D: PoseDistance + ?Sized>(
    distance: &D,
    skeleton: &Skeleton,
    a: PoseSample<'_>,
    b: PoseSample<'_>,
    segment_costs: &mut [f32],
) -> f32 {
    let mut total = 0.0;
    for (index, segment) in skeleton.segments().iter().enumerate() {
        let cost = if segment.region.is_excluded() {
            0.0
        } else {
            distance.segment_distance(skeleton, index, a, b)
        };
        segment_costs[index] = cost;
        total += cost;
    }
    total
}
