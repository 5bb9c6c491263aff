//! mocomp
//!
//! Command-line runner for comparing two motion captures.
//!
//! Commands:
//! - `align`: time-warp the motions and rank body parts by difference
//! - `voxels`: accumulate (or load cached) voxel grids and report maxima
//! - `slice`: cut a plane through one grid and summarize or export it

mod app;
mod error;

use app::{App, LoggingConfig};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Motion comparison: temporal alignment and voxel-space differences
#[derive(Parser, Debug)]
#[command(name = "mocomp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

/// The two motions to compare.
#[derive(ClapArgs, Debug, Clone)]
pub struct MotionPair {
    /// Motion A (JSON interchange document)
    pub a: PathBuf,

    /// Motion B (JSON interchange document)
    pub b: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Align two motions with dynamic time warping
    Align {
        #[command(flatten)]
        motions: MotionPair,

        /// Per-frame feature compared between poses
        #[arg(short, long, value_enum)]
        feature: Option<FeatureArg>,

        /// Number of ranked segments to print
        #[arg(long, default_value_t = 5)]
        top: usize,
    },

    /// Accumulate voxel grids over both motions
    Voxels {
        #[command(flatten)]
        motions: MotionPair,

        /// Cells per axis
        #[arg(short, long)]
        resolution: Option<usize>,

        /// Cache directory (overrides the configuration)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Sample a slice plane through one grid
    Slice {
        #[command(flatten)]
        motions: MotionPair,

        #[arg(long, value_enum, default_value = "occupancy")]
        grid: GridArg,

        #[arg(long, value_enum, default_value = "diff")]
        source: SourceArg,

        /// Sample the instantaneous grids at this time (seconds) instead of
        /// the accumulated ones
        #[arg(long)]
        time: Option<f32>,

        /// Restrict to these segments (by name)
        #[arg(long, value_delimiter = ',')]
        segments: Vec<String>,

        /// Plane origin as x,y,z; defaults to the center of the bounds
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        origin: Option<Vec<f32>>,

        /// Rotation of the plane about world X, in degrees
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        tilt: f32,

        /// Half-size of the sampled square in world units; defaults to half
        /// the largest bounds extent
        #[arg(long)]
        extent: Option<f32>,

        /// Samples per side
        #[arg(long, default_value_t = 64)]
        samples: usize,

        /// Write a PNG heatmap here
        #[arg(long)]
        png: Option<PathBuf>,

        /// Cache directory (overrides the configuration)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum FeatureArg {
    Positional,
    Angular,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum GridArg {
    Occupancy,
    Speed,
    Jerk,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum SourceArg {
    A,
    B,
    Diff,
}

fn main() {
    let args = Args::parse();

    let app = match App::new(args.config.as_deref()) {
        Ok(app) => app.with_logging(LoggingConfig {
            level: args.log_level,
        }),
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };
    app.init_logging();

    if let Err(e) = app.run(args.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
