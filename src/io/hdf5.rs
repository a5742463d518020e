/// Read projections, reference frames and acquisition parameters from the
/// beamline's HDF5 scan files

use std::path::Path;

use ndarray::{s, Array1, Array3, Ix1, Ix3};

use crate::{
    Angles, Frames, Projections, Result, TomoError,
    config::PreprocessConfig,
    io::{RawScan, Selection},
    metadata::Metadata,
    preprocess::Pipeline,
    utils::linspace,
};

/// Locations of the projection stacks inside the HDF5 file
pub mod paths {
    pub const DATA  : &str = "/exchange/data";
    pub const FLATS : &str = "/exchange/data_white";
    pub const DARKS : &str = "/exchange/data_dark";
    pub const THETA : &str = "/exchange/theta";
}

fn dataset(file: &hdf5::File, path: &str) -> Result<hdf5::Dataset> {
    if !file.link_exists(path) {
        return Err(TomoError::MissingDataset { path: path.into() })
    }
    Ok(file.dataset(path)?)
}

/// Element `index` of the (numeric) dataset at `path`
pub fn read_scalar(file: &hdf5::File, path: &str, index: usize) -> Result<f64> {
    let values = dataset(file, path)?.read_raw::<f64>()?;
    values.get(index).copied()
        .ok_or_else(|| TomoError::MissingDataset { path: format!("{path}[{index}]") })
}

/// Read the selected rows of every frame of a reference stack, if present
fn read_frames(file: &hdf5::File, path: &str, selection: &Selection) -> Result<Option<Frames>> {
    if !file.link_exists(path) { return Ok(None) }
    let ds = file.dataset(path)?;
    let shape = ds.shape();
    if shape.len() != 3 { return Err(TomoError::InvalidDimensionality(shape.len())) }
    if shape[0] == 0 { return Ok(None) }
    let rows = selection.resolve_rows(shape[1])?;
    Ok(Some(ds.read_slice::<f32, _, Ix3>(s![.., rows, ..])?))
}

/// Read the selected projections and rows, the flat and dark frames
/// restricted to the same rows, and the corresponding angles in radians.
///
/// When the file carries no `/exchange/theta`, the angles are spread evenly
/// over the recorded angular range.
pub fn read_raw_scan(path: &Path, selection: &Selection) -> Result<RawScan> {
    let file = hdf5::File::open(path)?;

    let data = dataset(&file, paths::DATA)?;
    let shape = data.shape();
    if shape.len() != 3 { return Err(TomoError::InvalidDimensionality(shape.len())) }
    let (n_angles, n_rows) = (shape[0], shape[1]);
    let (start, stop, step) = selection.projections.resolve(n_angles)?;
    let rows = selection.resolve_rows(n_rows)?;

    let projections: Projections = data.read_slice::<f32, _, Ix3>(s![start..stop;step, rows, ..])?;
    let flats = read_frames(&file, paths::FLATS, selection)?;
    let darks = read_frames(&file, paths::DARKS, selection)?;

    let all_angles: Array1<f32> = if file.link_exists(paths::THETA) {
        file.dataset(paths::THETA)?
            .read::<f32, Ix1>()?
            .mapv(f32::to_radians)
    } else {
        let m = Metadata::read(path)?;
        log::warn!("{} has no {}; assuming {} evenly spaced angles",
                   path.display(), paths::THETA, m.angles);
        linspace(0.0, units::radian_(m.angular_range), m.angles)
    };
    if all_angles.len() < stop {
        return Err(TomoError::ShapeMismatch {
            what: "projections and theta",
            left: vec![n_angles],
            right: vec![all_angles.len()],
        })
    }
    let angles: Angles = all_angles.slice(s![start..stop;step]).to_owned();

    log::debug!("read {:?} projections from {}", projections.dim(), path.display());
    Ok(RawScan { projections, flats, darks, angles })
}

/// Read a scan and turn it into attenuation ready for reconstruction
pub fn load(path: &Path, selection: &Selection, config: &PreprocessConfig) -> Result<(Projections, Angles)> {
    let scan = read_raw_scan(path, selection)?;
    Pipeline::new(config).run(scan)
}
