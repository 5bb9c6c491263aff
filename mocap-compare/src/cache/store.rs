//! File layout of a cached motion pair.
//!
//! A pair `(a, b)` is stored as `{stem}.{feature}_{source}.vox` for the nine
//! whole-body grids, `{stem}.{feature}_{source}_segments.vox` for the six
//! per-segment collections and `{stem}.meta.json`, with the stem derived from
//! the sanitized motion names. Saving removes the metadata file first and
//! renames the new one into place last, so a pair without metadata is never
//! loaded.

use super::CacheError;
use super::format::{FORMAT_VERSION, decode_grid, decode_segments, encode_grid, encode_segments};
use crate::error::CompareError;
use crate::voxel::{
    Feature, GridLayout, GridSource, MotionVoxels, NormMode, SegmentVoxelData, SpatialAccumulator,
    VoxelGrid, VoxelState,
};
use mocap_data::{Motion, WorldBounds};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Contents of `{stem}.meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub format_version: u32,
    pub motion_a: String,
    pub motion_b: String,
    pub resolution: usize,
    pub segment_count: usize,
    /// Accumulated maxima of the difference grids: occupancy, speed, jerk.
    pub max_diff: [f32; 3],
    /// `[min.x, min.y, min.z, max.x, max.y, max.z]`.
    pub bounds: [f32; 6],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Loaded,
    Computed,
}

#[derive(Debug, Clone)]
pub struct VoxelCache {
    dir: PathBuf,
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

impl VoxelCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File stem shared by every file of the pair.
    pub fn stem(name_a: &str, name_b: &str) -> String {
        format!("{}__{}", sanitize(name_a), sanitize(name_b))
    }

    pub fn metadata_path(&self, name_a: &str, name_b: &str) -> PathBuf {
        self.dir.join(format!("{}.meta.json", Self::stem(name_a, name_b)))
    }

    fn grid_path(&self, stem: &str, feature: Feature, source: GridSource) -> PathBuf {
        self.dir
            .join(format!("{stem}.{}_{}.vox", feature.label(), source.label()))
    }

    fn segments_path(&self, stem: &str, feature: Feature, source: GridSource) -> PathBuf {
        self.dir
            .join(format!("{stem}.{}_{}_segments.vox", feature.label(), source.label()))
    }

    /// Every file belonging to the pair, metadata last.
    pub fn files(&self, name_a: &str, name_b: &str) -> Vec<PathBuf> {
        let stem = Self::stem(name_a, name_b);
        let mut files = Vec::with_capacity(16);
        for feature in Feature::ALL {
            for source in GridSource::ALL {
                files.push(self.grid_path(&stem, feature, source));
            }
        }
        for feature in Feature::ALL {
            for source in [GridSource::A, GridSource::B] {
                files.push(self.segments_path(&stem, feature, source));
            }
        }
        files.push(self.metadata_path(name_a, name_b));
        files
    }

    /// Write the accumulated grids of `accumulator`.
    #[tracing::instrument(skip_all, fields(a = %name_a, b = %name_b))]
    pub fn save(&self, accumulator: &SpatialAccumulator, name_a: &str, name_b: &str) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)?;
        let stem = Self::stem(name_a, name_b);
        let state = accumulator.state(NormMode::Accumulated);

        let metadata_path = self.metadata_path(name_a, name_b);
        match fs::remove_file(&metadata_path) {
            Ok(()) => debug!("Invalidated {}", metadata_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        for feature in Feature::ALL {
            for source in GridSource::ALL {
                let path = self.grid_path(&stem, feature, source);
                fs::write(&path, encode_grid(state.body(feature, source)))?;
                debug!("Wrote {}", path.display());
            }
            for (source, voxels) in [(GridSource::A, &state.a), (GridSource::B, &state.b)] {
                let path = self.segments_path(&stem, feature, source);
                fs::write(&path, encode_segments(voxels.segments[feature.index()].grids()))?;
                debug!("Wrote {}", path.display());
            }
        }

        let metadata = CacheMetadata {
            format_version: FORMAT_VERSION,
            motion_a: name_a.to_string(),
            motion_b: name_b.to_string(),
            resolution: accumulator.resolution(),
            segment_count: accumulator.num_segments(),
            max_diff: state.max_diff,
            bounds: accumulator.bounds().to_array(),
        };
        let staging = metadata_path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_string_pretty(&metadata)?)?;
        fs::rename(&staging, &metadata_path)?;
        info!("Saved voxel cache {} in {}", stem, self.dir.display());
        Ok(())
    }

    pub fn read_metadata(&self, name_a: &str, name_b: &str) -> Result<CacheMetadata, CacheError> {
        let file = File::open(self.metadata_path(name_a, name_b))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Replace the accumulated grids of `accumulator` with the cached ones.
    ///
    /// Every file is read and checked before anything is replaced; on error
    /// the accumulator is left as it was.
    #[tracing::instrument(skip_all, fields(a = %name_a, b = %name_b))]
    pub fn load(&self, accumulator: &mut SpatialAccumulator, name_a: &str, name_b: &str) -> Result<(), CacheError> {
        let metadata = self.read_metadata(name_a, name_b)?;
        check_metadata(&metadata, accumulator, name_a, name_b)?;

        let stem = Self::stem(name_a, name_b);
        let bounds = WorldBounds::from_array(metadata.bounds);
        let layout = GridLayout::new(metadata.resolution, bounds);
        let state = VoxelState {
            a: self.read_motion(&stem, GridSource::A, layout, metadata.segment_count)?,
            b: self.read_motion(&stem, GridSource::B, layout, metadata.segment_count)?,
            diff: [
                self.read_grid(&stem, Feature::Occupancy, GridSource::Diff, layout)?,
                self.read_grid(&stem, Feature::Speed, GridSource::Diff, layout)?,
                self.read_grid(&stem, Feature::Jerk, GridSource::Diff, layout)?,
            ],
            max_diff: metadata.max_diff,
        };

        accumulator.restore(bounds, state);
        info!("Loaded voxel cache {} from {}", stem, self.dir.display());
        Ok(())
    }

    fn read_grid(
        &self,
        stem: &str,
        feature: Feature,
        source: GridSource,
        layout: GridLayout,
    ) -> Result<VoxelGrid, CacheError> {
        let path = self.grid_path(stem, feature, source);
        debug!("Reading {}", path.display());
        decode_grid(&fs::read(&path)?)?.into_grid(layout)
    }

    fn read_segments(
        &self,
        stem: &str,
        feature: Feature,
        source: GridSource,
        layout: GridLayout,
        segment_count: usize,
    ) -> Result<SegmentVoxelData, CacheError> {
        let path = self.segments_path(stem, feature, source);
        debug!("Reading {}", path.display());
        let records = decode_segments(&fs::read(&path)?)?;
        if records.len() != segment_count {
            return Err(CacheError::MetadataMismatch(format!(
                "{} holds {} segment grids, expected {}",
                path.display(),
                records.len(),
                segment_count
            )));
        }
        let grids = records
            .into_iter()
            .map(|record| record.into_grid(layout))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SegmentVoxelData::from_grids(grids))
    }

    fn read_motion(
        &self,
        stem: &str,
        source: GridSource,
        layout: GridLayout,
        segment_count: usize,
    ) -> Result<MotionVoxels, CacheError> {
        Ok(MotionVoxels {
            body: [
                self.read_grid(stem, Feature::Occupancy, source, layout)?,
                self.read_grid(stem, Feature::Speed, source, layout)?,
                self.read_grid(stem, Feature::Jerk, source, layout)?,
            ],
            segments: [
                self.read_segments(stem, Feature::Occupancy, source, layout, segment_count)?,
                self.read_segments(stem, Feature::Speed, source, layout, segment_count)?,
                self.read_segments(stem, Feature::Jerk, source, layout, segment_count)?,
            ],
        })
    }

    /// Load the pair from the cache, or accumulate it and save the result.
    pub fn load_or_accumulate(
        &self,
        accumulator: &mut SpatialAccumulator,
        a: &Motion,
        b: &Motion,
    ) -> Result<CacheOutcome, CompareError> {
        match self.load(accumulator, a.name(), b.name()) {
            Ok(()) => return Ok(CacheOutcome::Loaded),
            Err(err) => warn!(
                "No usable voxel cache for {} / {}: {}",
                a.name(),
                b.name(),
                err
            ),
        }

        accumulator.accumulate(a, b)?;
        if let Err(err) = self.save(accumulator, a.name(), b.name()) {
            warn!("Failed to save voxel cache: {}", err);
        }
        Ok(CacheOutcome::Computed)
    }
}

fn check_metadata(
    metadata: &CacheMetadata,
    accumulator: &SpatialAccumulator,
    name_a: &str,
    name_b: &str,
) -> Result<(), CacheError> {
    if metadata.format_version == 0 || metadata.format_version > FORMAT_VERSION {
        return Err(CacheError::UnsupportedVersion(metadata.format_version));
    }
    if metadata.motion_a != name_a || metadata.motion_b != name_b {
        return Err(CacheError::MetadataMismatch(format!(
            "cached pair is {} / {}",
            metadata.motion_a, metadata.motion_b
        )));
    }
    if metadata.resolution != accumulator.resolution() {
        return Err(CacheError::MetadataMismatch(format!(
            "cached resolution {} != {}",
            metadata.resolution,
            accumulator.resolution()
        )));
    }
    if metadata.segment_count != accumulator.num_segments() {
        return Err(CacheError::MetadataMismatch(format!(
            "cached segment count {} != {}",
            metadata.segment_count,
            accumulator.num_segments()
        )));
    }
    Ok(())
}
