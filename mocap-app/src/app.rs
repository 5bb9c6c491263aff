use crate::error::AppError;
use crate::{Command, FeatureArg, GridArg, MotionPair, SourceArg};
use glam::{Mat3, Vec3};
use mocap_compare::align::FeatureKind;
use mocap_compare::{
    CompareConfig, CompareError, Feature, GridSource, NormMode, Selection, SlicePlane, SpatialAccumulator,
    TemporalAligner, VoxelCache, VoxelView,
};
use mocap_data::{Motion, load_motion};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Logging configuration.
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

pub struct App {
    config: CompareConfig,
    logging: LoggingConfig,
}

impl App {
    pub fn new(config_path: Option<&Path>) -> Result<Self, CompareError> {
        let config = match config_path {
            Some(path) => CompareConfig::from_json_file(path)?,
            None => CompareConfig::default(),
        };
        Ok(Self {
            config,
            logging: LoggingConfig::default(),
        })
    }

    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging = config;
        self
    }

    pub fn init_logging(&self) {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&self.logging.level)),
            )
            .with_target(false)
            .init();
    }

    pub fn run(mut self, command: Command) -> Result<(), AppError> {
        match command {
            Command::Align { motions, feature, top } => {
                if let Some(feature) = feature {
                    self.config.align.feature = match feature {
                        FeatureArg::Positional => FeatureKind::Positional,
                        FeatureArg::Angular => FeatureKind::Angular,
                    };
                }
                self.align(&motions, top)
            }
            Command::Voxels {
                motions,
                resolution,
                cache_dir,
            } => {
                if let Some(resolution) = resolution {
                    self.config.voxel.resolution = resolution;
                }
                self.override_cache_dir(cache_dir);
                self.voxels(&motions)
            }
            Command::Slice {
                motions,
                grid,
                source,
                time,
                segments,
                origin,
                tilt,
                extent,
                samples,
                png,
                cache_dir,
            } => {
                self.override_cache_dir(cache_dir);
                let request = SliceRequest {
                    feature: match grid {
                        GridArg::Occupancy => Feature::Occupancy,
                        GridArg::Speed => Feature::Speed,
                        GridArg::Jerk => Feature::Jerk,
                    },
                    source: match source {
                        SourceArg::A => GridSource::A,
                        SourceArg::B => GridSource::B,
                        SourceArg::Diff => GridSource::Diff,
                    },
                    time,
                    segments,
                    origin: origin.map(|v| parse_point(&v)).transpose()?,
                    tilt,
                    extent,
                    samples,
                    png,
                };
                self.slice(&motions, request)
            }
        }
    }

    fn override_cache_dir(&mut self, cache_dir: Option<PathBuf>) {
        if cache_dir.is_some() {
            self.config.cache_dir = cache_dir;
        }
    }

    fn load_pair(&self, motions: &MotionPair) -> Result<(Motion, Motion), AppError> {
        let a = load_motion(&motions.a)?;
        let b = load_motion(&motions.b)?;
        info!(
            "Comparing {} ({} frames) with {} ({} frames)",
            a.name(),
            a.num_frames(),
            b.name(),
            b.num_frames()
        );
        Ok((a, b))
    }

    fn align(&self, motions: &MotionPair, top: usize) -> Result<(), AppError> {
        let (a, b) = self.load_pair(motions)?;
        let alignment = TemporalAligner::new(self.config.align.clone()).align(&a, &b)?;
        let skeleton = a.skeleton();

        println!("Path length:  {}", alignment.path().len());
        println!("Path cost:    {:.4}", alignment.path_cost());
        println!("Naive cost:   {:.4}", alignment.naive_cost());
        println!();
        println!("Segments:");
        for rank in alignment.ranked_segments().iter().take(top) {
            println!("  {:<24} {:>12.4}", skeleton.segment(rank.segment).name, rank.total);
        }
        println!("Regions:");
        for rank in alignment.ranked_regions() {
            println!("  {:<24} {:>12.4}", rank.group.label(), rank.total);
        }
        Ok(())
    }

    /// Accumulated grids, from the cache when one is configured.
    fn accumulated(&self, a: &Motion, b: &Motion) -> Result<SpatialAccumulator, AppError> {
        let mut accumulator = SpatialAccumulator::for_motions(self.config.voxel.clone(), a, b)?;
        match &self.config.cache_dir {
            Some(dir) => {
                let outcome = VoxelCache::new(dir).load_or_accumulate(&mut accumulator, a, b)?;
                debug!("Voxel cache outcome: {:?}", outcome);
            }
            None => accumulator.accumulate(a, b)?,
        }
        Ok(accumulator)
    }

    fn voxels(&self, motions: &MotionPair) -> Result<(), AppError> {
        let (a, b) = self.load_pair(motions)?;
        let accumulator = self.accumulated(&a, &b)?;
        let state = accumulator.state(NormMode::Accumulated);

        let bounds = accumulator.bounds();
        println!("Resolution:   {}", accumulator.resolution());
        println!("Bounds:       {:?} .. {:?}", bounds.min, bounds.max);
        for feature in Feature::ALL {
            println!(
                "  {:<10} A max {:>10.4}  B max {:>10.4}  diff max {:>10.4}",
                feature.label(),
                state.body(feature, GridSource::A).max(),
                state.body(feature, GridSource::B).max(),
                accumulator.max_diff(NormMode::Accumulated, feature),
            );
        }
        Ok(())
    }

    fn slice(&self, motions: &MotionPair, request: SliceRequest) -> Result<(), AppError> {
        let (a, b) = self.load_pair(motions)?;
        let skeleton = a.skeleton();
        let selection = if request.segments.is_empty() {
            Selection::WholeBody
        } else {
            let indices = request
                .segments
                .iter()
                .map(|name| {
                    skeleton
                        .find_segment(name)
                        .ok_or_else(|| AppError::UnknownSegment(name.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Selection::segments(indices)
        };

        let (mut accumulator, mode) = match request.time {
            Some(time) => {
                let mut accumulator = SpatialAccumulator::for_motions(self.config.voxel.clone(), &a, &b)?;
                accumulator.update(&a, &b, time)?;
                (accumulator, NormMode::Instantaneous)
            }
            None => (self.accumulated(&a, &b)?, NormMode::Accumulated),
        };

        let bounds = *accumulator.bounds();
        let origin = request.origin.unwrap_or_else(|| bounds.center());
        let extent = request
            .extent
            .unwrap_or_else(|| bounds.extent().max_element() * 0.5);
        let plane = SlicePlane::new(origin).with_rotation(Mat3::from_rotation_x(request.tilt.to_radians()));

        let view = VoxelView::new(request.feature, request.source, mode).with_selection(selection);
        let scale = accumulator.normalizer(&view)?;
        let image = plane.sample(accumulator.grid(&view)?, extent, request.samples);

        println!("Slice {}x{} at {:?}, normal {:?}", image.resolution, image.resolution, origin, plane.normal());
        println!("  max      {:.4}", image.max());
        println!("  mean     {:.4}", image.mean());
        println!("  nonzero  {}", image.nonzero());
        println!("  scale    {:.4}", scale);

        if let Some(path) = request.png {
            image.save_heatmap(&path, scale)?;
            info!("Wrote heatmap to {}", path.display());
        }
        Ok(())
    }
}

fn parse_point(values: &[f32]) -> Result<Vec3, AppError> {
    match values {
        &[x, y, z] => Ok(Vec3::new(x, y, z)),
        _ => Err(AppError::InvalidPoint(values.len())),
    }
}

struct SliceRequest {
    feature: Feature,
    source: GridSource,
    time: Option<f32>,
    segments: Vec<String>,
    origin: Option<Vec3>,
    tilt: f32,
    extent: Option<f32>,
    samples: usize,
    png: Option<PathBuf>,
}
