//! Dynamic time warping between two motions of the same skeleton.

use super::distance::{PoseDistance, PoseSample, frame_cost};
use super::matrix::CostMatrix;
use super::ranking::{RegionRank, SegmentRank, rank_regions, rank_segments, region_totals};
use crate::config::AlignConfig;
use crate::error::{CompareError, ensure_comparable};
use mocap_data::{Motion, RegionGroup, ResolvedPose};
use tracing::{debug, info};

/// Monotone frame correspondence, `a[k]` paired with `b[k]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignmentPath {
    pub a: Vec<usize>,
    pub b: Vec<usize>,
}

impl AlignmentPath {
    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }

    pub fn get(&self, step: usize) -> Option<(usize, usize)> {
        Some((*self.a.get(step)?, *self.b.get(step)?))
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.a.iter().copied().zip(self.b.iter().copied())
    }

    fn push(&mut self, (i, j): (usize, usize)) {
        self.a.push(i);
        self.b.push(j);
    }

    fn reverse(&mut self) {
        self.a.reverse();
        self.b.reverse();
    }
}

/// Result of aligning motion A against motion B.
#[derive(Debug, Clone)]
pub struct Alignment {
    frames_a: usize,
    frames_b: usize,
    num_segments: usize,
    cost: CostMatrix,
    cumulative: CostMatrix,
    path: AlignmentPath,
    matrix_segment_totals: Vec<f32>,
    matrix_region_totals: Vec<f32>,
    path_segment_totals: Vec<f32>,
    path_region_totals: Vec<f32>,
    /// Per-step segment costs along the path, `num_segments` per step.
    path_segment_costs: Vec<f32>,
    ranked_segments: Vec<SegmentRank>,
    ranked_regions: Vec<RegionRank>,
}

impl Alignment {
    pub fn frames_a(&self) -> usize {
        self.frames_a
    }

    pub fn frames_b(&self) -> usize {
        self.frames_b
    }

    /// Pairwise frame costs, `(frames_a + 1) x (frames_b + 1)` with a padding
    /// row and column.
    pub fn cost(&self) -> &CostMatrix {
        &self.cost
    }

    pub fn cumulative(&self) -> &CostMatrix {
        &self.cumulative
    }

    pub fn path(&self) -> &AlignmentPath {
        &self.path
    }

    /// Cumulative cost at the last frame pair.
    pub fn total_cost(&self) -> f32 {
        self.cumulative[(self.frames_a - 1, self.frames_b - 1)]
    }

    /// Sum of pairwise costs along the path.
    pub fn path_cost(&self) -> f32 {
        self.path.iter().map(|cell| self.cost[cell]).sum()
    }

    /// Cost of pairing frames index by index without warping; the shorter
    /// motion holds its last frame.
    pub fn naive_cost(&self) -> f32 {
        let last_a = self.frames_a - 1;
        let last_b = self.frames_b - 1;
        (0..self.frames_a.max(self.frames_b))
            .map(|k| self.cost[(k.min(last_a), k.min(last_b))])
            .sum()
    }

    /// Segment totals summed over every cell of the matrix.
    pub fn matrix_segment_totals(&self) -> &[f32] {
        &self.matrix_segment_totals
    }

    /// Region totals over the whole matrix, indexed by [`RegionGroup::index`].
    pub fn matrix_region_totals(&self) -> &[f32] {
        &self.matrix_region_totals
    }

    pub fn path_segment_totals(&self) -> &[f32] {
        &self.path_segment_totals
    }

    pub fn path_region_totals(&self) -> &[f32] {
        &self.path_region_totals
    }

    pub fn path_region_total(&self, group: RegionGroup) -> f32 {
        self.path_region_totals[group.index()]
    }

    /// Segment costs at one step of the path.
    pub fn segment_costs_at(&self, step: usize) -> Option<&[f32]> {
        let start = step.checked_mul(self.num_segments)?;
        self.path_segment_costs.get(start..start + self.num_segments)
    }

    pub fn ranked_segments(&self) -> &[SegmentRank] {
        &self.ranked_segments
    }

    pub fn ranked_regions(&self) -> &[RegionRank] {
        &self.ranked_regions
    }
}

/// Aligns motions frame by frame with dynamic time warping.
#[derive(Debug, Clone, Default)]
pub struct TemporalAligner {
    config: AlignConfig,
}

impl TemporalAligner {
    pub fn new(config: AlignConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    /// Align with the configured built-in feature.
    pub fn align(&self, a: &Motion, b: &Motion) -> Result<Alignment, CompareError> {
        self.align_with(&self.config.feature, a, b)
    }

    /// Align using a custom per-segment distance.
    #[tracing::instrument(skip_all, fields(a = %a.name(), b = %b.name()))]
    pub fn align_with<D: PoseDistance + ?Sized>(
        &self,
        distance: &D,
        a: &Motion,
        b: &Motion,
    ) -> Result<Alignment, CompareError> {
        ensure_comparable(a, b)?;
        let (skeleton, skeleton_b) = (a.skeleton(), b.skeleton());
        let (na, nb) = (a.num_frames(), b.num_frames());
        let num_segments = skeleton.num_segments();
        debug!(
            "Aligning {} x {} frames over {} segments",
            na, nb, num_segments
        );

        let poses_a: Vec<ResolvedPose> = a
            .postures()
            .iter()
            .map(|p| ResolvedPose::resolve(skeleton, p))
            .collect();
        let poses_b: Vec<ResolvedPose> = b
            .postures()
            .iter()
            .map(|p| ResolvedPose::resolve(skeleton_b, p))
            .collect();
        let sample_a = |i: usize| PoseSample {
            skeleton,
            posture: a.posture(i),
            pose: &poses_a[i],
        };
        let sample_b = |j: usize| PoseSample {
            skeleton: skeleton_b,
            posture: b.posture(j),
            pose: &poses_b[j],
        };

        let mut cost = CostMatrix::filled(na + 1, nb + 1, self.config.padding_cost);
        let mut matrix_segment_totals = vec![0.0; num_segments];
        let mut segment_costs = vec![0.0; num_segments];
        for i in 0..na {
            for j in 0..nb {
                cost[(i, j)] =
                    frame_cost(distance, skeleton, sample_a(i), sample_b(j), &mut segment_costs);
                for (total, c) in matrix_segment_totals.iter_mut().zip(&segment_costs) {
                    *total += c;
                }
            }
        }

        let cumulative = accumulate(&cost);
        let path = backtrack(&cumulative, na, nb);

        let mut path_segment_totals = vec![0.0; num_segments];
        let mut path_segment_costs = Vec::with_capacity(path.len() * num_segments);
        for (i, j) in path.iter() {
            frame_cost(distance, skeleton, sample_a(i), sample_b(j), &mut segment_costs);
            for (total, c) in path_segment_totals.iter_mut().zip(&segment_costs) {
                *total += c;
            }
            path_segment_costs.extend_from_slice(&segment_costs);
        }

        let matrix_region_totals = region_totals(skeleton, &matrix_segment_totals);
        let path_region_totals = region_totals(skeleton, &path_segment_totals);
        let ranked_segments = rank_segments(skeleton, &path_segment_totals);
        let ranked_regions = rank_regions(&path_region_totals);

        let alignment = Alignment {
            frames_a: na,
            frames_b: nb,
            num_segments,
            cost,
            cumulative,
            path,
            matrix_segment_totals,
            matrix_region_totals,
            path_segment_totals,
            path_region_totals,
            path_segment_costs,
            ranked_segments,
            ranked_regions,
        };
        info!(
            "Alignment finished: {} steps, total cost {:.4}",
            alignment.path.len(),
            alignment.total_cost()
        );
        Ok(alignment)
    }
}

/// Cumulative DTW costs over the full matrix, padding included.
fn accumulate(cost: &CostMatrix) -> CostMatrix {
    let (rows, cols) = (cost.rows(), cost.cols());
    let mut d = CostMatrix::filled(rows, cols, 0.0);
    for i in 0..rows {
        for j in 0..cols {
            let best = match (i, j) {
                (0, 0) => 0.0,
                (0, _) => d[(0, j - 1)],
                (_, 0) => d[(i - 1, 0)],
                _ => d[(i - 1, j - 1)].min(d[(i - 1, j)]).min(d[(i, j - 1)]),
            };
            d[(i, j)] = cost[(i, j)] + best;
        }
    }
    d
}

/// Walk back from the last frame pair to `(0, 0)`.
///
/// The diagonal is taken unless an axis-aligned predecessor is strictly
/// cheaper. When both are, the cheaper wins and ties step along A.
fn backtrack(d: &CostMatrix, na: usize, nb: usize) -> AlignmentPath {
    let (mut i, mut j) = (na - 1, nb - 1);
    let mut path = AlignmentPath::default();
    path.push((i, j));
    while i > 0 || j > 0 {
        if i == 0 {
            j -= 1;
        } else if j == 0 {
            i -= 1;
        } else {
            let diagonal = d[(i - 1, j - 1)];
            let up = d[(i - 1, j)];
            let left = d[(i, j - 1)];
            match (up < diagonal, left < diagonal) {
                (true, true) if left < up => j -= 1,
                (true, _) => i -= 1,
                (false, true) => j -= 1,
                (false, false) => {
                    i -= 1;
                    j -= 1;
                }
            }
        }
        path.push((i, j));
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::FeatureKind;
    use crate::fixtures;
    use glam::Vec3;

    fn aligner() -> TemporalAligner {
        TemporalAligner::default()
    }

    fn assert_valid_path(path: &AlignmentPath, na: usize, nb: usize) {
        assert_eq!(path.get(0), Some((0, 0)));
        assert_eq!(path.get(path.len() - 1), Some((na - 1, nb - 1)));
        let steps: Vec<_> = path.iter().collect();
        for pair in steps.windows(2) {
            let (di, dj) = (pair[1].0 - pair[0].0, pair[1].1 - pair[0].1);
            assert!(
                matches!((di, dj), (1, 1) | (1, 0) | (0, 1)),
                "invalid step {:?} -> {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_cost_matrix_padding() {
        let skeleton = fixtures::humanoid();
        let a = fixtures::walk("a", &skeleton, 4);
        let b = fixtures::walk("b", &skeleton, 6);
        let alignment = aligner().align(&a, &b).unwrap();

        let cost = alignment.cost();
        assert_eq!((cost.rows(), cost.cols()), (5, 7));
        assert!(cost.row(4).iter().all(|&c| c == 100.0));
        assert!((0..5).all(|i| cost[(i, 6)] == 100.0));
    }

    #[test]
    fn test_cumulative_recurrence() {
        let mut cost = CostMatrix::filled(3, 3, 0.0);
        let values = [[1.0, 2.0, 3.0], [4.0, 1.0, 5.0], [2.0, 2.0, 1.0]];
        for (i, row) in values.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                cost[(i, j)] = v;
            }
        }
        let d = accumulate(&cost);
        assert_eq!(d.row(0), &[1.0, 3.0, 6.0]);
        assert_eq!(d.row(1), &[5.0, 2.0, 7.0]);
        assert_eq!(d.row(2), &[7.0, 4.0, 3.0]);

        let path = backtrack(&d, 3, 3);
        assert_eq!(path.iter().collect::<Vec<_>>(), vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn test_backtrack_prefers_diagonal_on_ties() {
        let d = CostMatrix::filled(3, 4, 0.0);
        let path = backtrack(&d, 3, 4);
        assert_eq!(
            path.iter().collect::<Vec<_>>(),
            vec![(0, 0), (0, 1), (1, 2), (2, 3)]
        );
    }

    fn cumulative(values: [[f32; 2]; 2]) -> CostMatrix {
        let mut d = CostMatrix::filled(2, 2, 0.0);
        for (i, row) in values.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                d[(i, j)] = v;
            }
        }
        d
    }

    #[test]
    fn test_backtrack_predecessor_choice() {
        let step_a = vec![(0, 0), (0, 1), (1, 1)];
        let step_b = vec![(0, 0), (1, 0), (1, 1)];
        let diagonal = vec![(0, 0), (1, 1)];
        let cases = [
            // Only the predecessor along A is cheaper.
            ([[5.0, 1.0], [9.0, 0.0]], &step_a),
            // Only the predecessor along B is cheaper.
            ([[5.0, 9.0], [1.0, 0.0]], &step_b),
            // Both cheaper, B wins.
            ([[5.0, 2.0], [1.0, 0.0]], &step_b),
            // Both cheaper, A wins.
            ([[5.0, 1.0], [2.0, 0.0]], &step_a),
            // Both cheaper and equal.
            ([[5.0, 1.0], [1.0, 0.0]], &step_a),
            // Equal to the diagonal is not cheaper.
            ([[1.0, 1.0], [1.0, 0.0]], &diagonal),
        ];
        for (values, expected) in cases {
            let path = backtrack(&cumulative(values), 2, 2);
            assert_eq!(&path.iter().collect::<Vec<_>>(), expected, "{:?}", values);
        }
    }

    #[test]
    fn test_identical_motions_align_on_diagonal() {
        let skeleton = fixtures::humanoid();
        let a = fixtures::walk("a", &skeleton, 20);
        let alignment = aligner().align(&a, &a.clone()).unwrap();

        let expected: Vec<_> = (0..20).map(|k| (k, k)).collect();
        assert_eq!(alignment.path().iter().collect::<Vec<_>>(), expected);
        assert_eq!(alignment.total_cost(), 0.0);
        assert_eq!(alignment.path_cost(), 0.0);
        assert_eq!(alignment.naive_cost(), 0.0);
    }

    #[test]
    fn test_idle_offset_is_absorbed() {
        let skeleton = fixtures::humanoid();
        let a = fixtures::walk("a", &skeleton, 30);
        let b = fixtures::with_idle_start("b", &a, 1);
        let alignment = aligner().align(&a, &b).unwrap();

        assert_valid_path(alignment.path(), 30, 31);
        assert!(alignment.path_cost() < 1e-4);
        assert!(alignment.naive_cost() > 1.0);
    }

    #[test]
    fn test_path_validity_and_determinism() {
        let skeleton = fixtures::humanoid();
        let a = fixtures::walk("a", &skeleton, 25);
        let b = fixtures::still("b", &skeleton, 12, Vec3::new(0.0, 0.9, 0.5));

        let first = aligner().align(&a, &b).unwrap();
        let second = aligner().align(&a, &b).unwrap();
        assert_valid_path(first.path(), 25, 12);
        assert_eq!(first.path(), second.path());
        assert_eq!(first.cost(), second.cost());
        assert!((first.path_cost() - first.total_cost()).abs() < 1e-2);
    }

    #[test]
    fn test_ranking_consistency() {
        let skeleton = fixtures::humanoid();
        let a = fixtures::walk("a", &skeleton, 20);
        let b = fixtures::still("b", &skeleton, 15, Vec3::new(0.0, 0.9, 0.0));
        let alignment = aligner().align(&a, &b).unwrap();

        let ranked = alignment.ranked_segments();
        assert!(ranked.windows(2).all(|w| w[0].total >= w[1].total));
        for rank in ranked {
            assert_eq!(rank.total, alignment.path_segment_totals()[rank.segment]);
            assert!(!skeleton.segment(rank.segment).region.is_excluded());
        }
        let fingers = skeleton.find_segment("RightHandIndex1").unwrap();
        assert!(ranked.iter().all(|r| r.segment != fingers));
        assert_eq!(alignment.path_segment_totals()[fingers], 0.0);

        let segment_sum: f32 = alignment.path_segment_totals().iter().sum();
        assert!((segment_sum - alignment.path_cost()).abs() < 1e-2);
        assert!((alignment.path_region_total(RegionGroup::WholeBody) - segment_sum).abs() < 1e-2);

        let regions = alignment.ranked_regions();
        assert_eq!(regions.len(), RegionGroup::ALL.len());
        assert_eq!(regions[0].group, RegionGroup::WholeBody);

        let first_step = alignment.segment_costs_at(0).unwrap();
        assert_eq!(first_step.len(), skeleton.num_segments());
        assert!(alignment.segment_costs_at(alignment.path().len()).is_none());
    }

    #[test]
    fn test_angular_feature_ignores_root_translation() {
        let skeleton = fixtures::humanoid();
        let a = fixtures::still("a", &skeleton, 5, Vec3::ZERO);
        let b = fixtures::still("b", &skeleton, 5, Vec3::new(3.0, 0.0, 0.0));
        let aligner = TemporalAligner::new(AlignConfig {
            feature: FeatureKind::Angular,
            ..AlignConfig::default()
        });
        let alignment = aligner.align(&a, &b).unwrap();
        assert!(alignment.total_cost().abs() < 1e-5);

        let positional = TemporalAligner::default().align(&a, &b).unwrap();
        assert!(positional.total_cost() > 1.0);
    }

    #[test]
    fn test_each_motion_resolved_with_its_own_skeleton() {
        let chain = |scale: f32| {
            let mut b = mocap_data::SkeletonBuilder::new("Hips");
            let spine = b.attach(0, "spine", "Spine", Vec3::Y * scale).unwrap();
            b.attach(spine, "neck", "Head", Vec3::Y * scale).unwrap();
            std::sync::Arc::new(b.build())
        };
        let short = chain(1.0);
        let tall = chain(2.0);
        assert!(short.same_topology(&tall));

        let a = fixtures::still("a", &short, 2, Vec3::ZERO);
        let b = fixtures::still("b", &tall, 2, Vec3::ZERO);
        let alignment = aligner().align(&a, &b).unwrap();

        // Spine origins differ by 1, head origins by 2.
        assert!((alignment.cost()[(0, 0)] - 3.0).abs() < 1e-5);
        assert!((alignment.path_segment_totals()[2] - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_rejects_empty_and_mismatched() {
        let skeleton = fixtures::humanoid();
        let a = fixtures::walk("a", &skeleton, 5);
        let empty = Motion::new("empty", skeleton.clone(), 0.1, Vec::new()).unwrap();
        assert!(matches!(
            aligner().align(&a, &empty),
            Err(CompareError::EmptyMotion(name)) if name == "empty"
        ));

        let other = std::sync::Arc::new(mocap_data::SkeletonBuilder::new("Hips").build());
        let lone = Motion::new(
            "lone",
            other.clone(),
            0.1,
            vec![mocap_data::Posture::identity(&other)],
        )
        .unwrap();
        assert!(matches!(
            aligner().align(&a, &lone),
            Err(CompareError::TopologyMismatch { .. })
        ));
    }
}
