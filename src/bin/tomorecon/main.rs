mod cli;
use cli::{Cli, Command};

fn main() -> Result<(), Box<dyn Error>> {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let Cli { config, threads, command } = Cli::parse();
    let mut config = match config {
        Some(path) => read_config_file(&path)?,
        None       => Config::default(),
    };
    if threads.is_some() { config.threads = threads }
    config.validate()?;

    match command {
        Command::Info { file } => {
            let metadata = Metadata::read(&file)?;
            metadata.report(&file.display().to_string());
            println!("{metadata:#?}");
        },
        Command::Ls { dir, max } => {
            for (index, path) in list_scan_files(&dir, max)?.iter().enumerate() {
                println!("{index:>5}  {}", path.display());
            }
        },
        Command::Cor { file, png } => {
            let cor = config.install(|| find_cor(&file, png.as_deref(), &config))??;
            println!("COR: {cor} pixels");
        },
        Command::Recon { file, out, cor, rows, projections, chunk, png } => {
            let selection = Selection { projections: projections.unwrap_or_else(StepRange::all), rows };
            config.install(|| recon(&file, &out, cor, &selection, chunk, png.as_deref(), &config))??;
        },
        Command::Sweep { file, row, cors, step, out } => {
            config.install(|| sweep(&file, row, cors, step, &out, &config))??;
        },
        Command::Cache { shapes } => {
            config.install(|| cache_projectors(&shapes, &config.recon))??;
        },
    }
    Ok(())
}

/// Automatic COR, optionally with the difference image it implies
fn find_cor(file: &Path, png: Option<&Path>, config: &Config) -> tomohelp::Result<Pixelsf32> {
    let mut progress = Progress::new();
    progress.start("Estimating COR");
    let cor = auto_find_cor(file, config)?;
    progress.done();

    if let Some(png) = png {
        let metadata = Metadata::read(file)?;
        let (tomo, _) = load(file, &Selection::first_and_last(metadata.angles), &config.preprocess)?;
        let k = config.preprocess.downsample;
        let last = tomo.len_of(Axis(0)) - 1;
        let viewer = ProjectionDiffViewer::open(
            tomo.index_axis(Axis(0), 0).to_owned(),
            tomo.index_axis(Axis(0), last).to_owned(),
            k,
            -2.0 * cor / k as f32,
        )?;
        ensure_parent(png)?;
        viewer.save_png(png)?;
        println!("{} written to {}", viewer.title(), png.display());
    }
    Ok(cor)
}

fn recon(
    file: &Path,
    out: &Path,
    cor: Option<Pixelsf32>,
    selection: &Selection,
    chunk: usize,
    png: Option<&Path>,
    config: &Config,
) -> tomohelp::Result<()> {
    Metadata::read(file)?.report(&file.display().to_string());
    let mut progress = Progress::new();

    let cor = match cor {
        Some(cor) => cor,
        None => {
            progress.start("Estimating COR");
            let cor = auto_find_cor(file, config)?;
            progress.done_with_message(&format!("COR = {cor} pixels"));
            cor
        },
    };
    // COR is given in full-resolution pixels
    let k = config.preprocess.downsample;
    let cor = cor / k as f32;

    progress.start("Reading and preprocessing projections");
    let (tomo, angles) = load(file, selection, &config.preprocess)?;
    progress.done();

    let (_, slices, rays) = tomo.dim();
    let bar = ProgressBar::new(slices as u64).with_message("slices");
    bar.set_style(ProgressStyle::default_bar()
                  .template("Reconstructing {msg}\n[{elapsed_precise}] {wide_bar} {pos}/{len} ({eta_precise})")
                  .map_err(|e| TomoError::InvalidConfig(e.to_string()))?);
    let mut volume = Volume::zeros((slices, rays, rays));
    let chunk = chunk.max(1);
    for start in (0..slices).step_by(chunk) {
        let stop = (start + chunk).min(slices);
        let part = tomo.slice(s![.., start..stop, ..]).to_owned();
        let recon = reconstruct(&part, &angles, cor, &config.recon)?;
        volume.slice_mut(s![start..stop, .., ..]).assign(&recon);
        bar.inc((stop - start) as u64);
    }
    bar.finish();

    progress.start(&format!("Writing {} voxels to {}", group_digits(volume.len()), out.display()));
    ensure_parent(out)?;
    raw::write_volume(&volume, out)?;
    progress.done();

    if let Some(png) = png {
        let mut viewer = SliceViewer::open(volume, None)?;
        viewer.set_slice(slices / 2)?;
        ensure_parent(png)?;
        viewer.save_png(png)?;
    }
    Ok(())
}

fn sweep(file: &Path, row: usize, cors: Range<i32>, step: f32, out: &Path, config: &Config) -> tomohelp::Result<()> {
    if !(step > 0.0) {
        return Err(TomoError::InvalidConfig(format!("COR step must be positive, got {step}")))
    }
    let k = config.preprocess.downsample;
    let mut progress = Progress::new();
    progress.start("Reading and preprocessing projections");
    let selection = Selection::rows(row * k..(row + 1) * k);
    let (tomo, angles) = load(file, &selection, &config.preprocess)?;
    progress.done();

    let values = (0..)
        .map(|i| cors.start as f32 + i as f32 * step)
        .take_while(|&c| c < cors.end as f32)
        .collect::<Vec<_>>();
    progress.start(&format!("Reconstructing at {} CORs", values.len()));
    let recons = values.iter()
        .map(|&cor| reconstruct(&tomo, &angles, cor / k as f32, &config.recon))
        .collect::<tomohelp::Result<Vec<_>>>()?;
    progress.done();

    std::fs::create_dir_all(out)?;
    let mut viewer = CorSweepViewer::open(recons, values.clone())?;
    for (i, cor) in values.iter().enumerate() {
        viewer.set_cor(i)?;
        viewer.save_png(&out.join(format!("cor_{cor}.png")))?;
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

// ----- Imports -----------------------------------------------------------------------------------------
use std::{error::Error, ops::Range, path::Path};
use clap::Parser;
use env_logger::{Builder, Env};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{s, Axis};
use tomohelp::{
    Config, Metadata, Pixelsf32, TomoError, Volume, read_config_file,
    cor::auto_find_cor,
    io::{list_scan_files, raw, hdf5::load, Selection, StepRange},
    recon::{cache_projectors, reconstruct},
    utils::{group_digits, timing::Progress},
    view::{CorSweepViewer, ProjectionDiffViewer, SliceViewer, Viewer},
};
