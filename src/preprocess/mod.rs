//! Turning raw detector counts into line integrals of attenuation
//!
//! Order of operations in `Pipeline::run`:
//!
//! 1. bright-outlier removal along the angle axis, on raw counts (optional)
//! 2. flat/dark normalization
//! 3. sorting-based stripe removal on transmission (optional)
//! 4. transmission floor
//! 5. negative logarithm
//! 6. wavelet-Fourier stripe removal on attenuation (optional)
//! 7. block-average downsampling
//!
//! On the pre-log path, downsampling moves up to right after normalization;
//! everything else stays in place.
//!
//! The floor must come before the logarithm: with a positive floor nothing
//! downstream ever sees NaN or infinity.

pub mod outlier;
pub mod stripe;

use ndarray::{Array2, Axis, Dimension, RemoveAxis, Zip};
use rayon::prelude::*;

use crate::{
    Angles, Frames, Intensityf32, Projections, Result, TomoError, Transmissionf32,
    config::{Averaging, PreprocessConfig, StripeRemoval},
    downsample,
    io::RawScan,
    types::check_angles,
    utils::{median, timing::Progress},
};

/// Smallest allowed `flat - dark`
const MIN_DENOMINATOR: Intensityf32 = 1e-6;

/// Collapse a stack of reference frames into one frame
fn average(frames: &Frames, averaging: Averaging) -> Array2<f32> {
    match averaging {
        Averaging::Mean   => frames.mean_axis(Axis(0)).unwrap_or_else(|| Array2::zeros(frames.raw_dim().remove_axis(Axis(0)))),
        Averaging::Median => frames.map_axis(Axis(0), |lane| {
            median(&lane.to_vec()).unwrap_or(0.0)
        }),
    }
}

/// Convert raw intensities to transmission, in place:
/// `(raw - dark) / max(flat - dark, 1e-6)`.
///
/// Missing flats count as one, missing darks as zero.
pub fn normalize(tomo: &mut Projections, flats: Option<&Frames>, darks: Option<&Frames>, averaging: Averaging) -> Result<()> {
    let frame_dim = tomo.raw_dim().remove_axis(Axis(0));
    let reference = |frames: Option<&Frames>, fill: f32, what: &'static str| -> Result<Array2<f32>> {
        match frames {
            None => Ok(Array2::from_elem(frame_dim.clone(), fill)),
            Some(frames) => {
                let frame = average(frames, averaging);
                if frame.raw_dim() != frame_dim {
                    return Err(TomoError::ShapeMismatch {
                        what,
                        left: frame_dim.slice().to_vec(),
                        right: frame.shape().to_vec(),
                    })
                }
                Ok(frame)
            },
        }
    };
    let flat = reference(flats, 1.0, "projection frames vs flat frames")?;
    let dark = reference(darks, 0.0, "projection frames vs dark frames")?;
    let denominator = Zip::from(&flat).and(&dark).map_collect(|&f, &d| (f - d).max(MIN_DENOMINATOR));

    tomo.axis_iter_mut(Axis(0))
        .into_par_iter()
        .for_each(|mut projection| {
            Zip::from(&mut projection).and(&dark).and(&denominator)
                .for_each(|p, &d, &den| *p = (*p - d) / den);
        });
    Ok(())
}

/// Raise all values below `floor` to `floor`. NaNs are also replaced.
/// `None` leaves the data untouched.
pub fn clamp_transmission(tomo: &mut Projections, floor: Option<Transmissionf32>) {
    let Some(floor) = floor else { return };
    tomo.par_mapv_inplace(|t| if t >= floor { t } else { floor });
}

/// Attenuation from transmission, in place
pub fn minus_log(tomo: &mut Projections) {
    tomo.par_mapv_inplace(|t| -t.ln());
}

/// The configured preprocessing chain
pub struct Pipeline<'c> {
    config: &'c PreprocessConfig,
}

impl<'c> Pipeline<'c> {

    pub fn new(config: &'c PreprocessConfig) -> Self { Self { config } }

    /// Clean up, normalize and linearize a raw scan into attenuation
    pub fn run(&self, scan: RawScan) -> Result<(Projections, Angles)> {
        let RawScan { projections: mut tomo, flats, darks, angles } = scan;
        check_angles(tomo.len_of(Axis(0)), &angles)?;
        let c = self.config;
        let mut progress = Progress::new();

        if let Some(outliers) = c.outliers {
            outlier::remove_outlier_1d(&mut tomo, &outliers);
            progress.lap("removed outliers");
        }
        normalize(&mut tomo, flats.as_ref(), darks.as_ref(), c.averaging)?;
        drop((flats, darks));
        progress.lap("normalized");

        if c.prelog {
            // Averaging transmission mixes paths before the log, which can
            // leave a bright halo of radius `rays` in the reconstruction
            tomo = downsample::stack(tomo.view(), c.downsample)?;
            progress.lap("downsampled (pre-log)");
        }
        if let StripeRemoval::AllStripe(params) = &c.stripe {
            stripe::remove_all_stripe(&mut tomo, params);
            progress.lap("removed stripes (sorting)");
        }
        clamp_transmission(&mut tomo, c.transmission_floor());
        minus_log(&mut tomo);
        progress.lap("clamped and linearized");

        if let StripeRemoval::Wavelet(params) = &c.stripe {
            stripe::remove_stripe_fw(&mut tomo, params)?;
            progress.lap("removed stripes (wavelet)");
        }
        if !c.prelog {
            tomo = downsample::stack(tomo.view(), c.downsample)?;
            progress.lap("downsampled");
        }
        Ok((tomo, angles))
    }
}
