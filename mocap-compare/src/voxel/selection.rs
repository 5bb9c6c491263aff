//! Grids restricted to a subset of segments, built on demand.

use super::accumulator::{Feature, GridSource, NormMode, VoxelState};
use super::grid::VoxelGrid;

/// Which segments a query covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Selection {
    #[default]
    WholeBody,
    /// Segment indices; order and duplicates do not matter.
    Segments(Vec<usize>),
}

impl Selection {
    pub fn segments(segments: impl IntoIterator<Item = usize>) -> Self {
        let mut segments: Vec<usize> = segments.into_iter().collect();
        segments.sort_unstable();
        segments.dedup();
        Selection::Segments(segments)
    }
}

/// Explicit query for one grid of the accumulator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VoxelView {
    pub feature: Feature,
    pub source: GridSource,
    pub mode: NormMode,
    pub selection: Selection,
}

impl VoxelView {
    pub fn new(feature: Feature, source: GridSource, mode: NormMode) -> Self {
        Self {
            feature,
            source,
            mode,
            selection: Selection::WholeBody,
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectionKey {
    pub mode: NormMode,
    pub segments: Vec<usize>,
    pub generation: u64,
}

/// Every feature and source for one segment subset.
#[derive(Debug, Clone)]
pub(crate) struct SelectionCache {
    pub key: SelectionKey,
    /// `[feature][source]`.
    grids: [[VoxelGrid; 3]; 3],
    max_diff: [f32; 3],
}

impl SelectionCache {
    pub fn build(state: &VoxelState, key: SelectionKey) -> Self {
        let layout = *state.body(Feature::Occupancy, GridSource::A).layout();
        let grids = Feature::ALL.map(|feature| {
            let mut a = VoxelGrid::new(layout);
            let mut b = VoxelGrid::new(layout);
            for &segment in &key.segments {
                combine_into(feature, &mut a, state.segment(feature, GridSource::A, segment));
                combine_into(feature, &mut b, state.segment(feature, GridSource::B, segment));
            }
            let mut diff = VoxelGrid::new(layout);
            diff.set_abs_diff(&a, &b);
            [a, b, diff]
        });
        let max_diff = Feature::ALL.map(|feature| grids[feature.index()][GridSource::Diff.index()].max());
        Self {
            key,
            grids,
            max_diff,
        }
    }

    pub fn grid(&self, feature: Feature, source: GridSource) -> &VoxelGrid {
        &self.grids[feature.index()][source.index()]
    }

    pub fn max_diff(&self, feature: Feature) -> f32 {
        self.max_diff[feature.index()]
    }
}

fn combine_into(feature: Feature, target: &mut VoxelGrid, source: Option<&VoxelGrid>) {
    let Some(source) = source else {
        return;
    };
    for (cell, &value) in target.cells_mut().iter_mut().zip(source.cells()) {
        feature.combine(cell, value);
    }
}
