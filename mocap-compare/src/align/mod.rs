//! Temporal alignment of two motions.

mod distance;
mod dtw;
mod matrix;
pub mod playback;
mod ranking;

pub use distance::{
    AngularDistance, FeatureKind, PoseDistance, PoseSample, PositionalDistance, frame_cost,
};
pub use dtw::{Alignment, AlignmentPath, TemporalAligner};
pub use matrix::CostMatrix;
pub use playback::{PlaybackMode, playback_frames, playback_len};
pub use ranking::{RegionRank, SegmentRank, rank_regions, rank_segments, region_totals};
