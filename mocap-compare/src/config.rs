//! Engine configuration.
//!
//! Every field has a default so a configuration file only needs to name the
//! values it changes.

use crate::align::FeatureKind;
use crate::error::CompareError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Cost assigned to the padding row and column of the DTW cost matrix.
pub const DEFAULT_PADDING_COST: f32 = 100.0;

/// Default voxel grid resolution per axis.
pub const DEFAULT_RESOLUTION: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    pub feature: FeatureKind,
    pub padding_cost: f32,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            feature: FeatureKind::Positional,
            padding_cost: DEFAULT_PADDING_COST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelConfig {
    /// Cells per axis.
    pub resolution: usize,
    /// Bone capsule radius as a multiple of the largest voxel edge.
    pub capsule_radius_scale: f32,
    /// Fraction of each axis extent added around the swept world bounds.
    pub bounds_margin: f32,
}

impl Default for VoxelConfig {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            capsule_radius_scale: 1.0,
            bounds_margin: mocap_data::bounds::DEFAULT_MARGIN,
        }
    }
}

impl VoxelConfig {
    pub fn validate(&self) -> Result<(), CompareError> {
        if self.resolution == 0 {
            return Err(CompareError::InvalidResolution(self.resolution));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    pub align: AlignConfig,
    pub voxel: VoxelConfig,
    /// Directory for accumulated voxel caches; caching is off when unset.
    pub cache_dir: Option<PathBuf>,
}

impl CompareConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CompareError> {
        let file = File::open(path.as_ref())?;
        let config: CompareConfig = serde_json::from_reader(BufReader::new(file))?;
        config.voxel.validate()?;
        debug!("Loaded compare config from {}", path.as_ref().display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: CompareConfig =
            serde_json::from_str(r#"{ "align": { "feature": "angular" }, "voxel": { "resolution": 16 } }"#)
                .unwrap();
        assert_eq!(config.align.feature, FeatureKind::Angular);
        assert_eq!(config.align.padding_cost, DEFAULT_PADDING_COST);
        assert_eq!(config.voxel.resolution, 16);
        assert_eq!(config.voxel.capsule_radius_scale, 1.0);
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn test_zero_resolution_is_invalid() {
        let config = VoxelConfig {
            resolution: 0,
            ..VoxelConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CompareError::InvalidResolution(0))
        ));
    }
}
