//! Center-of-rotation estimation from opposing projections
//!
//! In a half-turn scan the last projection is the mirror image of the first
//! about the rotation axis. Registering the flipped last projection against
//! the first therefore measures twice the offset of the axis from the
//! detector centre.

use std::path::Path;

use ndarray::{s, ArrayView2, Axis};

use crate::{
    Config, Metadata, Pixelsf32, Projections, Result, TomoError,
    config::PreprocessConfig,
    io::{hdf5::load, Selection},
    registration::phase_cross_correlation,
};

/// Column index of the rotation axis, given projections at 0° and 180°,
/// to within `tolerance` pixels
pub fn find_center_pc(first: ArrayView2<f32>, last: ArrayView2<f32>, tolerance: f32) -> Result<f32> {
    let flipped = last.slice(s![.., ..;-1]);
    let [_, shift] = phase_cross_correlation(first, flipped, 1.0 / tolerance as f64)?;
    let width = first.ncols() as f64;
    Ok(((width + shift - 1.0) / 2.0) as f32)
}

/// Offset of the rotation axis from the detector centre (`rays / 2`), from
/// the first and last projections of an attenuation stack
pub fn cor_from_projections(tomo: &Projections, tolerance: f32) -> Result<Pixelsf32> {
    let n = tomo.len_of(Axis(0));
    if n < 2 {
        return Err(TomoError::EmptySelection(format!("need two projections for COR, got {n}")))
    }
    let first = tomo.index_axis(Axis(0), 0);
    let last  = tomo.index_axis(Axis(0), n - 1);
    let center = find_center_pc(first, last, tolerance)?;
    Ok(center - tomo.len_of(Axis(2)) as f32 / 2.0)
}

/// Estimate the COR of a scan file, reading only its first and last
/// projections.
///
/// The estimate assumes a half-turn scan. Other angular ranges are reported
/// as a warning, or refused if `cor.require_half_turn` is set.
pub fn auto_find_cor(path: &Path, config: &Config) -> Result<Pixelsf32> {
    let metadata = Metadata::read(path)?;
    let deviation = metadata.half_turn_error();
    if deviation > config.cor.half_turn_tolerance {
        let range = units::degree_(metadata.angular_range);
        if config.cor.require_half_turn { return Err(TomoError::NotHalfTurn(range)) }
        log::warn!("angular range is {range}°, not 180°: automatic COR will be unreliable");
    }

    // Normalize and linearize only. The floor keeps dead pixels from
    // turning into NaNs which would poison the correlation.
    let preprocess = PreprocessConfig {
        minimum_transmission: config.preprocess.minimum_transmission,
        averaging: config.preprocess.averaging,
        ..PreprocessConfig::default()
    };
    let (tomo, _) = load(path, &Selection::first_and_last(metadata.angles), &preprocess)?;
    let cor = cor_from_projections(&tomo, config.cor.tolerance)?;
    log::info!("automatic COR: {cor} pixels");
    Ok(cor)
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use float_eq::assert_float_eq;
    use ndarray::Array3;
    use rstest::rstest;

    /// Detector signal at 0° of a few Gaussian features with different
    /// amplitudes, modulated along the rows
    fn profile(x: f32, row: usize) -> f32 {
        let g = |a: f32, centre: f32| a * (-(x - centre).powi(2) / 8.0).exp();
        let modulation = 1.0 + 0.1 * (row as f32 * 0.7).sin();
        (g(1.0, 20.0) + g(0.6, 27.0) + g(0.3, 40.0)) * modulation
    }

    /// First and last projections of a half-turn scan whose rotation axis
    /// sits at column `axis`: the 180° view is the 0° view mirrored about it
    pub(crate) fn opposing_projections(width: usize, rows: usize, axis: f32) -> Projections {
        let mut tomo = Array3::zeros((2, rows, width));
        for r in 0..rows {
            for c in 0..width {
                let x = c as f32;
                tomo[[0, r, c]] = profile(x, r);
                tomo[[1, r, c]] = profile(2.0 * axis - x, r);
            }
        }
        tomo
    }

    #[rstest(/**/ axis , expected,
             case(35.25, 3.25    ),
             case(35.5 , 3.5     ),
             case(32.0 , 0.0     ),
             case(29.0 , -3.0    ),
    )]
    fn injected_offset_is_recovered(axis: f32, expected: f32) {
        let tomo = opposing_projections(64, 16, axis);
        let cor = cor_from_projections(&tomo, 0.25).unwrap();
        assert_float_eq!(cor, expected, abs <= 0.25);
    }

    #[test]
    fn center_index_of_a_symmetric_pair() {
        let tomo = opposing_projections(64, 8, 31.5);
        let centre = find_center_pc(tomo.index_axis(Axis(0), 0), tomo.index_axis(Axis(0), 1), 0.25).unwrap();
        assert_float_eq!(centre, 31.5, abs <= 0.25);
    }

    #[test]
    fn single_projection_is_not_enough() {
        let tomo = Array3::zeros((1, 4, 4));
        assert!(matches!(cor_from_projections(&tomo, 0.25), Err(TomoError::EmptySelection(_))));
    }

    #[test]
    fn auto_cor_from_file() -> Result<()> {
        use crate::io::hdf5::test::write_scan;
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scan.h5");
        // Transmission whose attenuation is the opposing-projection profile;
        // the metadata announces 1313 angles, so fill the middle with ones
        let pair = opposing_projections(64, 4, 35.25);
        let mut raw = Array3::ones((1313, 4, 64));
        raw.index_axis_mut(Axis(0), 0   ).assign(&pair.index_axis(Axis(0), 0).mapv(|a| (-a).exp()));
        raw.index_axis_mut(Axis(0), 1312).assign(&pair.index_axis(Axis(0), 1).mapv(|a| (-a).exp()));
        write_scan(&path, &raw, true)?;
        let cor = auto_find_cor(&path, &Config::default())?;
        assert_float_eq!(cor, 3.25, abs <= 0.25);
        Ok(())
    }

    #[test]
    fn half_turn_can_be_required() -> Result<()> {
        use crate::metadata::{paths, test::{ensure_group, standard_metadata, write_metadata}};
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("full_turn.h5");
        {
            let file = hdf5::File::create(&path)?;
            let mut m = standard_metadata(25_000.0);
            m.retain(|(p, _)| *p != paths::RANGE);
            m.push((paths::RANGE, &[360.0]));
            write_metadata(&file, &m)?;
            ensure_group(&file, "/exchange")?;
        }
        let mut config = Config::default();
        config.cor.require_half_turn = true;
        assert!(matches!(auto_find_cor(&path, &config), Err(TomoError::NotHalfTurn(r)) if r == 360.0));
        Ok(())
    }
}
