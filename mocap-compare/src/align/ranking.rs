//! Ranking segments and body regions by their share of the dissimilarity.

use mocap_data::{RegionGroup, Skeleton};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentRank {
    pub segment: usize,
    pub total: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionRank {
    pub group: RegionGroup,
    pub total: f32,
}

/// Sum per-segment totals into every [`RegionGroup`], indexed by
/// [`RegionGroup::index`].
pub fn region_totals(skeleton: &Skeleton, segment_totals: &[f32]) -> Vec<f32> {
    RegionGroup::ALL
        .iter()
        .map(|group| {
            skeleton
                .segments()
                .iter()
                .zip(segment_totals)
                .filter(|(segment, _)| group.contains(segment.region))
                .map(|(_, total)| total)
                .sum()
        })
        .collect()
}

/// Non-excluded segments, highest total first. Ties keep segment order.
pub fn rank_segments(skeleton: &Skeleton, segment_totals: &[f32]) -> Vec<SegmentRank> {
    let mut ranks: Vec<SegmentRank> = skeleton
        .segments()
        .iter()
        .zip(segment_totals)
        .enumerate()
        .filter(|(_, (segment, _))| !segment.region.is_excluded())
        .map(|(segment, (_, &total))| SegmentRank { segment, total })
        .collect();
    ranks.sort_by_key(|r| Reverse(OrderedFloat(r.total)));
    ranks
}

/// Regions and unions, highest total first. Ties keep [`RegionGroup::ALL`] order.
pub fn rank_regions(region_totals: &[f32]) -> Vec<RegionRank> {
    let mut ranks: Vec<RegionRank> = RegionGroup::ALL
        .iter()
        .zip(region_totals)
        .map(|(&group, &total)| RegionRank { group, total })
        .collect();
    ranks.sort_by_key(|r| Reverse(OrderedFloat(r.total)));
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use mocap_data::SkeletonBuilder;

    fn skeleton() -> Skeleton {
        let mut b = SkeletonBuilder::new("Hips");
        b.attach(0, "neck", "Head", Vec3::Y).unwrap();
        b.attach(0, "r_hip", "RightUpLeg", Vec3::X).unwrap();
        b.attach(0, "l_hip", "LeftUpLeg", -Vec3::X).unwrap();
        b.attach(0, "thumb", "LeftHandThumb1", Vec3::Z).unwrap();
        b.build()
    }

    #[test]
    fn test_rank_segments_descending_without_fingers() {
        let skeleton = skeleton();
        let ranks = rank_segments(&skeleton, &[1.0, 0.5, 3.0, 3.0, 9.0]);
        let order: Vec<usize> = ranks.iter().map(|r| r.segment).collect();
        assert_eq!(order, vec![2, 3, 0, 1]);
    }

    #[test]
    fn test_region_totals_cover_unions() {
        let skeleton = skeleton();
        let totals = region_totals(&skeleton, &[1.0, 0.5, 3.0, 2.0, 9.0]);
        assert_eq!(totals[RegionGroup::Chest.index()], 1.0);
        assert_eq!(totals[RegionGroup::Head.index()], 0.5);
        assert_eq!(totals[RegionGroup::Legs.index()], 5.0);
        assert_eq!(totals[RegionGroup::UpperBody.index()], 1.5);
        assert_eq!(totals[RegionGroup::WholeBody.index()], 6.5);
        assert_eq!(totals[RegionGroup::Arms.index()], 0.0);

        let ranks = rank_regions(&totals);
        assert_eq!(ranks[0].group, RegionGroup::WholeBody);
        assert_eq!(ranks[1].group, RegionGroup::Legs);
    }
}
