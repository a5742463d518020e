//! Acquisition parameters of a scan

use std::path::Path;

use units::{Angle, Energy, Length, cm_, degree_, kev, kev_, mm_, um_};

use crate::{Result, io::hdf5::read_scalar};

/// Above this the source is taken to be white (unmonochromated) light
const WHITE_LIGHT_THRESHOLD_KEV: f32 = 100.0;

/// Energy assumed for phase retrieval when the recorded one is meaningless
const WHITE_LIGHT_NOMINAL_KEV: f32 = 30.0;

/// Immutable record of what the acquisition looked like.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metadata {
    /// Number of detector rows (sinograms)
    pub slices: usize,
    /// Number of detector columns
    pub rays: usize,
    pub pixel_size: Length,
    /// Number of projections
    pub angles: usize,
    pub angular_range: Angle,
    pub propagation_distance: Length,
    pub energy: Energy,
}

/// Locations of the scan metadata inside the HDF5 file
pub mod paths {
    pub const SLICES     : &str = "/measurement/instrument/detector/dimension_y";
    pub const RAYS       : &str = "/measurement/instrument/detector/dimension_x";
    pub const PIXEL_SIZE : &str = "/measurement/instrument/detector/pixel_size";
    pub const ANGLES     : &str = "/process/acquisition/rotation/num_angles";
    pub const DISTANCE   : &str = "/measurement/instrument/camera_motor_stack/setup/camera_distance";
    pub const ENERGY     : &str = "/measurement/instrument/monochromator/energy";
    pub const RANGE      : &str = "/process/acquisition/rotation/range";
}

impl Metadata {

    /// Read the acquisition parameters from the fixed key paths of the
    /// facility's HDF5 schema. Pixel size and camera distance are stored in
    /// mm, energy in eV, the angular range in degrees.
    pub fn read(path: &Path) -> Result<Self> {
        let file = hdf5::File::open(path)?;
        let get = |dataset, index| read_scalar(&file, dataset, index);
        Ok(Self {
            slices:               get(paths::SLICES    , 0)? as usize,
            rays:                 get(paths::RAYS      , 0)? as usize,
            pixel_size:           units::mm    (get(paths::PIXEL_SIZE, 0)? as f32),
            angles:               get(paths::ANGLES    , 0)? as usize,
            propagation_distance: units::mm    (get(paths::DISTANCE  , 1)? as f32),
            energy:               units::ev    (get(paths::ENERGY    , 0)? as f32),
            angular_range:        units::degree(get(paths::RANGE     , 0)? as f32),
        })
    }

    /// Energies this high mean that the beam was not monochromated
    pub fn is_white_light(&self) -> bool {
        kev_(self.energy) > WHITE_LIGHT_THRESHOLD_KEV
    }

    /// The energy which phase retrieval should assume
    pub fn phase_retrieval_energy(&self) -> Energy {
        if self.is_white_light() { kev(WHITE_LIGHT_NOMINAL_KEV) }
        else                     { self.energy }
    }

    /// Log a human-readable summary of the scan.
    pub fn report(&self, name: &str) {
        log::info!("{name}:");
        log::info!("numslices: {}, rays: {}, numangles: {}", self.slices, self.rays, self.angles);
        log::info!("angularrange: {}, pxsize: {} um ({} cm), distance: {} mm, energy: {} keV",
                   degree_(self.angular_range),
                   um_(self.pixel_size), cm_(self.pixel_size),
                   mm_(self.propagation_distance),
                   kev_(self.energy));
        if self.is_white_light() {
            log::warn!("white light mode detected; energy is set to {WHITE_LIGHT_NOMINAL_KEV} keV for phase retrieval");
        }
    }

    /// Deviation of the angular range from a half turn, in degrees
    pub fn half_turn_error(&self) -> f32 {
        (degree_(self.angular_range) - 180.0).abs()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use float_eq::assert_float_eq;

    /// Write a minimal scan file with the metadata layout of the beamline
    pub(crate) fn write_metadata(file: &hdf5::File, m: &[(&str, &[f64])]) -> hdf5::Result<()> {
        for (path, values) in m {
            let (group, name) = path.rsplit_once('/').unwrap();
            let group = ensure_group(file, group)?;
            group.new_dataset_builder().with_data(*values).create(name)?;
        }
        Ok(())
    }

    pub(crate) fn ensure_group(file: &hdf5::File, path: &str) -> hdf5::Result<hdf5::Group> {
        let mut group = file.group("/")?;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            group = match group.group(part) {
                Ok(g)  => g,
                Err(_) => group.create_group(part)?,
            };
        }
        Ok(group)
    }

    pub(crate) fn standard_metadata(energy_ev: f64) -> Vec<(&'static str, &'static [f64])> {
        let energy: &'static [f64] = if energy_ev > 100_000.0 { &[250_000.0] } else { &[25_000.0] };
        let m: [(&'static str, &'static [f64]); 7] = [
            (paths::SLICES    , &[2160.0]),
            (paths::RAYS      , &[2560.0]),
            (paths::PIXEL_SIZE, &[0.00065]),
            (paths::ANGLES    , &[1313.0]),
            (paths::DISTANCE  , &[0.0, 50.0]),
            (paths::ENERGY    , energy),
            (paths::RANGE     , &[180.0]),
        ];
        m.to_vec()
    }

    #[test]
    fn read_metadata_with_unit_conversion() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scan.h5");
        {
            let file = hdf5::File::create(&path)?;
            write_metadata(&file, &standard_metadata(25_000.0))?;
        }
        let m = Metadata::read(&path)?;
        assert_eq!((m.slices, m.rays, m.angles), (2160, 2560, 1313));
        assert_float_eq!(cm_(m.pixel_size), 0.000065, r2nd <= 1e-5);
        assert_float_eq!(mm_(m.propagation_distance), 50.0, r2nd <= 1e-6);
        assert_float_eq!(kev_(m.energy), 25.0, r2nd <= 1e-6);
        assert_float_eq!(m.half_turn_error(), 0.0, abs <= 1e-4);
        assert!(!m.is_white_light());
        assert_float_eq!(kev_(m.phase_retrieval_energy()), 25.0, r2nd <= 1e-6);
        Ok(())
    }

    #[test]
    fn white_light_uses_nominal_energy() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("white.h5");
        {
            let file = hdf5::File::create(&path)?;
            write_metadata(&file, &standard_metadata(250_000.0))?;
        }
        let m = Metadata::read(&path)?;
        assert!(m.is_white_light());
        assert_float_eq!(kev_(m.energy), 250.0, r2nd <= 1e-6);
        assert_float_eq!(kev_(m.phase_retrieval_energy()), 30.0, r2nd <= 1e-6);
        Ok(())
    }

    #[test]
    fn missing_key_is_named() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("incomplete.h5");
        {
            let file = hdf5::File::create(&path)?;
            let mut m = standard_metadata(25_000.0);
            m.retain(|(p, _)| *p != paths::ENERGY);
            write_metadata(&file, &m)?;
        }
        match Metadata::read(&path) {
            Err(crate::TomoError::MissingDataset { path }) => assert_eq!(path, paths::ENERGY),
            other => panic!("expected MissingDataset, got {other:?}"),
        }
        Ok(())
    }
}
