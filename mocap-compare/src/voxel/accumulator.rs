//! Occupancy, speed and jerk fields of two motions and their difference.
//!
//! Every bone of every frame is rasterized as a capsule into the whole-body
//! grids and into the grids of its owning segment. Occupancy sums across
//! frames; speed and jerk keep the per-cell maximum. The accumulated state is
//! built once over whole motions, the instantaneous state is rebuilt on every
//! update from a single posture pair.

use super::grid::{GridLayout, ReferencePose, VoxelGrid};
use super::raster::{Capsule, rasterize};
use super::selection::{Selection, SelectionCache, SelectionKey, VoxelView};
use crate::config::VoxelConfig;
use crate::error::{CompareError, ensure_comparable};
use glam::Mat3;
use mocap_data::{BoneData, FrameData, Motion, WorldBounds};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Maxima at or below this are reported as 1.0.
pub const MIN_NORMALIZER: f32 = 1e-5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    #[default]
    Occupancy,
    Speed,
    Jerk,
}

impl Feature {
    pub const ALL: [Feature; 3] = [Feature::Occupancy, Feature::Speed, Feature::Jerk];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Feature::Occupancy => "occupancy",
            Feature::Speed => "speed",
            Feature::Jerk => "jerk",
        }
    }

    /// Occupancy sums, speed and jerk keep the peak.
    pub fn combine(self, cell: &mut f32, value: f32) {
        match self {
            Feature::Occupancy => *cell += value,
            Feature::Speed | Feature::Jerk => *cell = cell.max(value),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridSource {
    #[default]
    A,
    B,
    Diff,
}

impl GridSource {
    pub const ALL: [GridSource; 3] = [GridSource::A, GridSource::B, GridSource::Diff];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            GridSource::A => "a",
            GridSource::B => "b",
            GridSource::Diff => "diff",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormMode {
    /// Rebuilt from the current posture pair on every update.
    Instantaneous,
    /// Built once over the whole motions.
    #[default]
    Accumulated,
}

impl NormMode {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// One grid per skeleton segment for a single feature.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentVoxelData {
    grids: Vec<VoxelGrid>,
}

impl SegmentVoxelData {
    pub fn new(layout: GridLayout, num_segments: usize) -> Self {
        Self {
            grids: vec![VoxelGrid::new(layout); num_segments],
        }
    }

    pub fn from_grids(grids: Vec<VoxelGrid>) -> Self {
        Self { grids }
    }

    pub fn grids(&self) -> &[VoxelGrid] {
        &self.grids
    }

    pub fn get(&self, segment: usize) -> Option<&VoxelGrid> {
        self.grids.get(segment)
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    fn clear(&mut self) {
        self.grids.iter_mut().for_each(VoxelGrid::clear);
    }
}

/// Whole-body and per-segment grids of one motion, indexed by [`Feature::index`].
#[derive(Debug, Clone, PartialEq)]
pub struct MotionVoxels {
    pub body: [VoxelGrid; 3],
    pub segments: [SegmentVoxelData; 3],
}

impl MotionVoxels {
    pub fn new(layout: GridLayout, num_segments: usize) -> Self {
        Self {
            body: Feature::ALL.map(|_| VoxelGrid::new(layout)),
            segments: Feature::ALL.map(|_| SegmentVoxelData::new(layout, num_segments)),
        }
    }

    fn clear(&mut self) {
        self.body.iter_mut().for_each(VoxelGrid::clear);
        self.segments.iter_mut().for_each(SegmentVoxelData::clear);
    }

    fn set_reference(&mut self, reference: Option<ReferencePose>) {
        for grid in &mut self.body {
            grid.set_reference(reference);
        }
    }

    /// Rasterize the bones of one frame.
    fn rasterize(&mut self, layout: &GridLayout, radius: f32, bones: &[BoneSample]) {
        for sample in bones {
            let bone = &sample.bone;
            let capsule = Capsule::new(bone.start, bone.end, radius);
            let [occupancy, speed, jerk] = &mut self.body;
            let [seg_occupancy, seg_speed, seg_jerk] = &mut self.segments;
            let (Some(seg_occupancy), Some(seg_speed), Some(seg_jerk)) = (
                seg_occupancy.grids.get_mut(bone.segment),
                seg_speed.grids.get_mut(bone.segment),
                seg_jerk.grids.get_mut(bone.segment),
            ) else {
                continue;
            };
            rasterize(layout, &capsule, |index, t| {
                let s = bone.speed_at(t);
                let j = sample.jerk_at(t);
                Feature::Occupancy.combine(&mut occupancy.cells_mut()[index], 1.0);
                Feature::Occupancy.combine(&mut seg_occupancy.cells_mut()[index], 1.0);
                Feature::Speed.combine(&mut speed.cells_mut()[index], s);
                Feature::Speed.combine(&mut seg_speed.cells_mut()[index], s);
                Feature::Jerk.combine(&mut jerk.cells_mut()[index], j);
                Feature::Jerk.combine(&mut seg_jerk.cells_mut()[index], j);
            });
        }
    }
}

/// All grids of one normalization mode.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelState {
    pub a: MotionVoxels,
    pub b: MotionVoxels,
    pub diff: [VoxelGrid; 3],
    /// Raw largest difference per feature.
    pub max_diff: [f32; 3],
}

impl VoxelState {
    pub fn new(layout: GridLayout, num_segments: usize) -> Self {
        Self {
            a: MotionVoxels::new(layout, num_segments),
            b: MotionVoxels::new(layout, num_segments),
            diff: Feature::ALL.map(|_| VoxelGrid::new(layout)),
            max_diff: [0.0; 3],
        }
    }

    pub fn motion(&self, source: GridSource) -> Option<&MotionVoxels> {
        match source {
            GridSource::A => Some(&self.a),
            GridSource::B => Some(&self.b),
            GridSource::Diff => None,
        }
    }

    pub fn body(&self, feature: Feature, source: GridSource) -> &VoxelGrid {
        match source {
            GridSource::A => &self.a.body[feature.index()],
            GridSource::B => &self.b.body[feature.index()],
            GridSource::Diff => &self.diff[feature.index()],
        }
    }

    /// Per-segment grid of one motion; `None` for [`GridSource::Diff`] or an
    /// unknown segment.
    pub fn segment(&self, feature: Feature, source: GridSource, segment: usize) -> Option<&VoxelGrid> {
        self.motion(source)?.segments[feature.index()].get(segment)
    }

    fn clear(&mut self) {
        self.a.clear();
        self.b.clear();
        self.diff.iter_mut().for_each(VoxelGrid::clear);
    }

    /// Recompute the difference grids; returns the per-feature maxima.
    fn compute_diff(&mut self) -> [f32; 3] {
        Feature::ALL.map(|feature| {
            let i = feature.index();
            self.diff[i].set_abs_diff(&self.a.body[i], &self.b.body[i])
        })
    }
}

/// A bone with its per-endpoint rate of change of speed.
#[derive(Debug, Clone, Copy)]
struct BoneSample {
    bone: BoneData,
    start_jerk: f32,
    end_jerk: f32,
}

impl BoneSample {
    fn jerk_at(&self, t: f32) -> f32 {
        self.start_jerk + (self.end_jerk - self.start_jerk) * t
    }
}

fn bone_samples(current: &[BoneData], previous: &[BoneData], frame_interval: f32) -> Vec<BoneSample> {
    let inv_dt = if frame_interval > 0.0 {
        1.0 / frame_interval
    } else {
        0.0
    };
    current
        .iter()
        .zip(previous)
        .map(|(bone, prev)| BoneSample {
            bone: *bone,
            start_jerk: (bone.start_speed - prev.start_speed).abs() * inv_dt,
            end_jerk: (bone.end_speed - prev.end_speed).abs() * inv_dt,
        })
        .collect()
}

fn frame_bones(motion: &Motion, frame: usize) -> Vec<BoneData> {
    FrameData::at_frame(motion, frame).bones(motion.skeleton())
}

fn reference_of(motion: &Motion, frame: usize) -> ReferencePose {
    let posture = motion.posture(motion.clamp_frame(frame));
    ReferencePose {
        root_position: posture.root_position,
        root_orientation: Mat3::from_quat(posture.root_orientation),
    }
}

/// Builds and serves the voxel fields of a motion pair.
#[derive(Debug, Clone)]
pub struct SpatialAccumulator {
    config: VoxelConfig,
    layout: GridLayout,
    num_segments: usize,
    states: [VoxelState; 2],
    generations: [u64; 2],
    selection: Option<SelectionCache>,
}

impl SpatialAccumulator {
    pub fn new(config: VoxelConfig, bounds: WorldBounds, num_segments: usize) -> Result<Self, CompareError> {
        config.validate()?;
        let layout = GridLayout::new(config.resolution, bounds);
        Ok(Self {
            states: [
                VoxelState::new(layout, num_segments),
                VoxelState::new(layout, num_segments),
            ],
            config,
            layout,
            num_segments,
            generations: [0; 2],
            selection: None,
        })
    }

    /// Accumulator whose bounds enclose every frame of both motions.
    pub fn for_motions(config: VoxelConfig, a: &Motion, b: &Motion) -> Result<Self, CompareError> {
        ensure_comparable(a, b)?;
        let bounds = WorldBounds::from_motions(&[a, b], config.bounds_margin)
            .ok_or_else(|| CompareError::EmptyMotion(a.name().to_string()))?;
        Self::new(config, bounds, a.skeleton().num_segments())
    }

    pub fn config(&self) -> &VoxelConfig {
        &self.config
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn bounds(&self) -> &WorldBounds {
        &self.layout.bounds
    }

    pub fn resolution(&self) -> usize {
        self.layout.resolution
    }

    pub fn num_segments(&self) -> usize {
        self.num_segments
    }

    pub fn state(&self, mode: NormMode) -> &VoxelState {
        &self.states[mode.index()]
    }

    /// Bumped whenever the grids of `mode` are rebuilt.
    pub fn generation(&self, mode: NormMode) -> u64 {
        self.generations[mode.index()]
    }

    /// Capsule radius in world units.
    pub fn capsule_radius(&self) -> f32 {
        self.config.capsule_radius_scale * self.layout.voxel_size().max_element()
    }

    fn check_motions(&self, a: &Motion, b: &Motion) -> Result<(), CompareError> {
        ensure_comparable(a, b)?;
        if a.skeleton().num_segments() != self.num_segments {
            return Err(CompareError::TopologyMismatch {
                a: a.name().to_string(),
                b: format!("{} segment grids", self.num_segments),
            });
        }
        Ok(())
    }

    /// Build the accumulated grids over every frame of both motions.
    #[tracing::instrument(skip_all, fields(a = %a.name(), b = %b.name()))]
    pub fn accumulate(&mut self, a: &Motion, b: &Motion) -> Result<(), CompareError> {
        self.check_motions(a, b)?;
        debug!(
            "Accumulating {} + {} frames into {}^3 grids",
            a.num_frames(),
            b.num_frames(),
            self.layout.resolution
        );
        let radius = self.capsule_radius();
        let layout = self.layout;
        let state = &mut self.states[NormMode::Accumulated.index()];
        state.clear();

        for (motion, target) in [(a, &mut state.a), (b, &mut state.b)] {
            let mut previous = frame_bones(motion, 0);
            for frame in 0..motion.num_frames() {
                let current = frame_bones(motion, frame);
                let samples = bone_samples(&current, &previous, motion.frame_interval());
                target.rasterize(&layout, radius, &samples);
                previous = current;
            }
            target.set_reference(Some(reference_of(motion, 0)));
        }

        state.max_diff = state.compute_diff();
        self.bump(NormMode::Accumulated);
        info!(
            "Accumulation finished: max diff occupancy {:.3}, speed {:.3}, jerk {:.3}",
            state_max(&self.states[NormMode::Accumulated.index()], Feature::Occupancy),
            state_max(&self.states[NormMode::Accumulated.index()], Feature::Speed),
            state_max(&self.states[NormMode::Accumulated.index()], Feature::Jerk),
        );
        Ok(())
    }

    /// Rebuild the instantaneous grids for the posture pair nearest to `time`.
    pub fn update(&mut self, a: &Motion, b: &Motion, time: f32) -> Result<(), CompareError> {
        self.update_frames(a, b, a.frame_at_time(time), b.frame_at_time(time))
    }

    /// Rebuild the instantaneous grids for explicit frames, clamped to each motion.
    pub fn update_frames(
        &mut self,
        a: &Motion,
        b: &Motion,
        frame_a: usize,
        frame_b: usize,
    ) -> Result<(), CompareError> {
        self.check_motions(a, b)?;
        let radius = self.capsule_radius();
        let layout = self.layout;
        let state = &mut self.states[NormMode::Instantaneous.index()];
        state.clear();

        for (motion, frame, target) in [(a, frame_a, &mut state.a), (b, frame_b, &mut state.b)] {
            let frame = motion.clamp_frame(frame);
            let current = frame_bones(motion, frame);
            let previous = frame_bones(motion, frame.saturating_sub(1));
            let samples = bone_samples(&current, &previous, motion.frame_interval());
            target.rasterize(&layout, radius, &samples);
            target.set_reference(Some(reference_of(motion, frame)));
        }

        // Running maximum across updates until reset.
        let maxima = state.compute_diff();
        for (running, value) in state.max_diff.iter_mut().zip(maxima) {
            *running = running.max(value);
        }
        self.bump(NormMode::Instantaneous);
        Ok(())
    }

    /// Forget the running instantaneous maxima.
    pub fn reset_instantaneous_max(&mut self) {
        self.states[NormMode::Instantaneous.index()].max_diff = [0.0; 3];
    }

    /// Largest whole-body difference of `feature`, floored to 1.0 when
    /// negligible so it can be divided by.
    pub fn max_diff(&self, mode: NormMode, feature: Feature) -> f32 {
        state_max(self.state(mode), feature)
    }

    /// Grid described by `view`. Segment selections are combined from the
    /// per-segment grids and cached until the selection or the grids change.
    pub fn grid(&mut self, view: &VoxelView) -> Result<&VoxelGrid, CompareError> {
        match &view.selection {
            Selection::WholeBody => Ok(self.state(view.mode).body(view.feature, view.source)),
            Selection::Segments(segments) => {
                let cache = self.selection_for(view.mode, segments)?;
                Ok(cache.grid(view.feature, view.source))
            }
        }
    }

    /// Divisor for displaying the grid of `view`, floored like [`Self::max_diff`].
    pub fn normalizer(&mut self, view: &VoxelView) -> Result<f32, CompareError> {
        let raw = match (&view.selection, view.source) {
            (Selection::WholeBody, GridSource::Diff) => self.state(view.mode).max_diff[view.feature.index()],
            (Selection::Segments(segments), GridSource::Diff) => {
                self.selection_for(view.mode, segments)?.max_diff(view.feature)
            }
            _ => self.grid(view)?.max(),
        };
        Ok(floor_normalizer(raw))
    }

    fn selection_for(&mut self, mode: NormMode, segments: &[usize]) -> Result<&SelectionCache, CompareError> {
        if let Some(&index) = segments.iter().find(|&&s| s >= self.num_segments) {
            return Err(CompareError::InvalidSegment {
                index,
                count: self.num_segments,
            });
        }
        let mut segments = segments.to_vec();
        segments.sort_unstable();
        segments.dedup();
        let key = SelectionKey {
            mode,
            segments,
            generation: self.generation(mode),
        };

        let cache = match self.selection.take() {
            Some(cache) if cache.key == key => cache,
            _ => {
                debug!("Building selection grids for segments {:?}", key.segments);
                SelectionCache::build(&self.states[mode.index()], key)
            }
        };
        Ok(self.selection.insert(cache))
    }

    /// Replace the accumulated grids and bounds with restored ones.
    pub(crate) fn restore(&mut self, bounds: WorldBounds, state: VoxelState) {
        self.layout.bounds = bounds;
        self.states = [VoxelState::new(self.layout, self.num_segments), state];
        self.bump(NormMode::Instantaneous);
        self.bump(NormMode::Accumulated);
    }

    fn bump(&mut self, mode: NormMode) {
        self.generations[mode.index()] += 1;
        self.selection = None;
    }
}

fn floor_normalizer(value: f32) -> f32 {
    if value <= MIN_NORMALIZER { 1.0 } else { value }
}

fn state_max(state: &VoxelState, feature: Feature) -> f32 {
    floor_normalizer(state.max_diff[feature.index()])
}
