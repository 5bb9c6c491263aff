//! Body region classification for skeleton segments.
//!
//! Comparisons report results per body part. Each segment belongs to exactly one
//! [`BodyRegion`]; [`RegionGroup`] names the regions and unions that results are
//! ranked over. Finger segments are classified but never part of a group.

use serde::{Deserialize, Serialize};

/// The body part a single segment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyRegion {
    Head,
    Chest,
    RightArm,
    LeftArm,
    RightLeg,
    LeftLeg,
    Finger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Right,
    Left,
}

const FINGER_KEYWORDS: &[&str] = &["finger", "thumb", "index", "middle", "ring", "pinky", "little"];
const HEAD_KEYWORDS: &[&str] = &["head", "neck", "skull"];
const ARM_KEYWORDS: &[&str] = &[
    "shoulder", "clavicle", "collar", "arm", "humerus", "radius", "ulna", "elbow", "wrist", "hand",
];
const LEG_KEYWORDS: &[&str] = &[
    "hip", "leg", "thigh", "femur", "knee", "shin", "tibia", "calf", "ankle", "foot", "toe",
];

fn contains_any(name: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| name.contains(k))
}

/// Detect the body side from common naming schemes: `LeftArm`, `RightUpLeg`,
/// `RThigh`, `l_hand`, `lhumerus`.
fn side_of(name: &str) -> Option<Side> {
    let lower = name.to_ascii_lowercase();
    if lower.contains("right") {
        return Some(Side::Right);
    }
    if lower.contains("left") {
        return Some(Side::Left);
    }

    let mut chars = lower.chars();
    let side = match chars.next()? {
        'r' => Side::Right,
        'l' => Side::Left,
        _ => return None,
    };
    let rest = chars.as_str().trim_start_matches(['_', '.', '-', ' ']);
    let limb = contains_any(rest, ARM_KEYWORDS)
        || contains_any(rest, LEG_KEYWORDS)
        || contains_any(rest, FINGER_KEYWORDS);
    limb.then_some(side)
}

impl BodyRegion {
    /// Classify a segment by its name.
    ///
    /// Unrecognized names fall back to [`BodyRegion::Chest`], which covers the
    /// pelvis, spine and any other trunk segment.
    pub fn classify(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if contains_any(&lower, FINGER_KEYWORDS) {
            return BodyRegion::Finger;
        }
        if contains_any(&lower, HEAD_KEYWORDS) {
            return BodyRegion::Head;
        }

        let is_arm = contains_any(&lower, ARM_KEYWORDS);
        let is_leg = contains_any(&lower, LEG_KEYWORDS);
        match (side_of(name), is_arm, is_leg) {
            (Some(Side::Right), true, _) => BodyRegion::RightArm,
            (Some(Side::Left), true, _) => BodyRegion::LeftArm,
            (Some(Side::Right), false, true) => BodyRegion::RightLeg,
            (Some(Side::Left), false, true) => BodyRegion::LeftLeg,
            _ => BodyRegion::Chest,
        }
    }

    /// Fingers are skipped by every per-frame comparison.
    pub fn is_excluded(self) -> bool {
        self == BodyRegion::Finger
    }
}

/// A region or union of regions that comparison totals are reported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionGroup {
    Head,
    Chest,
    RightArm,
    LeftArm,
    RightLeg,
    LeftLeg,
    Arms,
    Legs,
    UpperBody,
    WholeBody,
}

impl RegionGroup {
    pub const ALL: [RegionGroup; 10] = [
        RegionGroup::Head,
        RegionGroup::Chest,
        RegionGroup::RightArm,
        RegionGroup::LeftArm,
        RegionGroup::RightLeg,
        RegionGroup::LeftLeg,
        RegionGroup::Arms,
        RegionGroup::Legs,
        RegionGroup::UpperBody,
        RegionGroup::WholeBody,
    ];

    /// Position of this group in [`RegionGroup::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn contains(self, region: BodyRegion) -> bool {
        use BodyRegion as R;
        if region == R::Finger {
            return false;
        }
        match self {
            RegionGroup::Head => region == R::Head,
            RegionGroup::Chest => region == R::Chest,
            RegionGroup::RightArm => region == R::RightArm,
            RegionGroup::LeftArm => region == R::LeftArm,
            RegionGroup::RightLeg => region == R::RightLeg,
            RegionGroup::LeftLeg => region == R::LeftLeg,
            RegionGroup::Arms => matches!(region, R::RightArm | R::LeftArm),
            RegionGroup::Legs => matches!(region, R::RightLeg | R::LeftLeg),
            RegionGroup::UpperBody => {
                matches!(region, R::Head | R::Chest | R::RightArm | R::LeftArm)
            }
            RegionGroup::WholeBody => true,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RegionGroup::Head => "head",
            RegionGroup::Chest => "chest",
            RegionGroup::RightArm => "right arm",
            RegionGroup::LeftArm => "left arm",
            RegionGroup::RightLeg => "right leg",
            RegionGroup::LeftLeg => "left leg",
            RegionGroup::Arms => "arms",
            RegionGroup::Legs => "legs",
            RegionGroup::UpperBody => "upper body",
            RegionGroup::WholeBody => "whole body",
        }
    }
}
