/// Command line interface for `tomorecon` executable
#[derive(clap::Parser, Debug, Clone)]
#[clap(name = "tomorecon", about = "Preprocess and reconstruct parallel-beam tomography scans")]
pub (super) struct Cli {

    /// TOML configuration (preprocessing, COR search, reconstruction)
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum number of rayon threads, overriding the configuration
    #[clap(short = 'j', long)]
    pub threads: Option<usize>,

    #[clap(subcommand)]
    pub (super) command: Command,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub (super) enum Command {

    /// Print the acquisition metadata of a scan
    Info {
        file: PathBuf,
    },

    /// List the scan files in a directory
    Ls {
        dir: PathBuf,

        /// Stop after this many files
        #[clap(short, long, default_value = "10000")]
        max: usize,
    },

    /// Estimate the center of rotation from the first and last projections
    Cor {
        file: PathBuf,

        /// Write the 0° - mirrored 180° difference image at the estimated COR
        #[clap(long)]
        png: Option<PathBuf>,
    },

    /// Reconstruct a scan into a raw f32 volume
    Recon {
        file: PathBuf,

        /// Raw little-endian f32 output, `[slice, row, column]`
        #[clap(short, long)]
        out: PathBuf,

        /// COR offset in full-resolution pixels. Estimated automatically if absent
        #[clap(long, allow_hyphen_values = true)]
        cor: Option<f32>,

        /// Detector rows (slices) to reconstruct, e.g. `100..200`
        #[clap(short, long, value_parser = parse_range::<usize>)]
        rows: Option<Range<usize>>,

        /// Projections to use, e.g. `0..;2` for every other one
        #[clap(short, long, value_parser = parse_step_range)]
        projections: Option<StepRange>,

        /// Number of slices reconstructed per step of the progress bar
        #[clap(long, default_value = "16")]
        chunk: usize,

        /// Also write a preview of the middle slice
        #[clap(long)]
        png: Option<PathBuf>,
    },

    /// Reconstruct one detector row at several CORs, one PNG per COR
    Sweep {
        file: PathBuf,

        /// Detector row to reconstruct
        #[clap(short, long)]
        row: usize,

        /// COR offsets in full-resolution pixels, e.g. `-10..10`
        #[clap(long, value_parser = parse_range::<i32>, allow_hyphen_values = true)]
        cors: Range<i32>,

        /// Spacing between tried CORs
        #[clap(long, default_value = "1.0")]
        step: f32,

        /// Directory receiving `cor_<value>.png`
        #[clap(short, long)]
        out: PathBuf,
    },

    /// Precompute projector geometry for iterative reconstructions
    Cache {
        /// `SIZExANGLES`, e.g. `2560x1313`, repeatable
        #[clap(value_parser = parse_shape, required = true)]
        shapes: Vec<(usize, usize)>,
    },
}

fn parse_shape(s: &str) -> Result<(usize, usize), String> {
    let (size, angles) = s.split_once('x')
        .ok_or_else(|| format!("Could not find 'x' when parsing shape `{s}`."))?;
    let size   = size  .parse().map_err(|e| format!("{e}"))?;
    let angles = angles.parse().map_err(|e| format!("{e}"))?;
    Ok((size, angles))
}

// ----- Imports -----------------------------------------------------------------------------------------
use std::{ops::Range, path::PathBuf};
use tomohelp::{
    io::StepRange,
    utils::{parse_range, parse_step_range},
};
