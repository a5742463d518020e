//! Stripe removal in sinogram space. Stripes in sinograms become rings in
//! reconstructed slices.

mod all;
mod wavelet;

pub use all::remove_all_stripe;
pub use wavelet::remove_stripe_fw;

use ndarray::{Array2, ArrayView1, Axis};
use ordered_float::OrderedFloat;
use rayon::prelude::*;

use crate::{Projections, Result};

/// Run `correct` on a copy of every sinogram (`[angle, column]` at fixed
/// row) in parallel, writing the corrected copy back
fn for_each_sinogram<F>(tomo: &mut Projections, correct: F)
where
    F: Fn(&mut Array2<f32>) + Sync,
{
    tomo.axis_iter_mut(Axis(1))
        .into_par_iter()
        .for_each(|mut sinogram| {
            let mut copy = sinogram.to_owned();
            correct(&mut copy);
            sinogram.assign(&copy);
        })
}

/// Like `for_each_sinogram`, for corrections which can fail
fn try_for_each_sinogram<F>(tomo: &mut Projections, correct: F) -> Result<()>
where
    F: Fn(Array2<f32>) -> Result<Array2<f32>> + Sync,
{
    tomo.axis_iter_mut(Axis(1))
        .into_par_iter()
        .try_for_each(|mut sinogram| {
            let corrected = correct(sinogram.to_owned())?;
            sinogram.assign(&corrected);
            Ok(())
        })
}

/// Flag the entries of `values` which stand out from the bulk by more than
/// `snr` noise levels.
///
/// The values are sorted; a straight line fitted through the central half
/// models the bulk, and its drop over the whole range is the noise level.
/// Extreme values are only flagged on a side whose most extreme member is at
/// least `snr` noise levels away from the line.
fn detect_stripe(values: &[f32], snr: f32) -> Vec<bool> {
    let n = values.len();
    let mut mask = vec![false; n];
    let ndrop = n / 4;
    if n < 2 * ndrop + 3 { return mask }
    let mut sorted: Vec<_> = values.iter().map(|&v| OrderedFloat(v as f64)).collect();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let sorted: Vec<f64> = sorted.into_iter().map(|v| v.0).collect();

    let fit = ndrop..n - ndrop - 1;
    let (slope, intercept) = fit_line(fit.clone().map(|i| (i as f64, sorted[i])));
    let last = intercept + slope * (n - 1) as f64;
    let noise = (last - intercept).abs().max(1e-6);
    let snr = snr as f64;
    let val1 = (sorted[0]     - intercept).abs() / noise;
    let val2 = (sorted[n - 1] - last     ).abs() / noise;
    if val1 >= snr {
        let upper = intercept + noise * snr * 0.5;
        for (m, &v) in mask.iter_mut().zip(values) { if v as f64 >  upper { *m = true } }
    }
    if val2 >= snr {
        let lower = last - noise * snr * 0.5;
        for (m, &v) in mask.iter_mut().zip(values) { if v as f64 <= lower { *m = true } }
    }
    mask
}

/// Least-squares `(slope, intercept)` of a straight line through `points`
fn fit_line(points: impl Iterator<Item = (f64, f64)> + Clone) -> (f64, f64) {
    let n = points.clone().count() as f64;
    let (sx, sy) = points.clone().fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
    let (mx, my) = (sx / n, sy / n);
    let (sxy, sxx) = points.fold((0.0, 0.0), |(sxy, sxx), (x, y)| {
        (sxy + (x - mx) * (y - my), sxx + (x - mx) * (x - mx))
    });
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    (slope, my - slope * mx)
}

/// Indices which sort `column` in ascending order
fn argsort(column: ArrayView1<f32>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..column.len()).collect();
    order.sort_by_key(|&i| OrderedFloat(column[i]));
    order
}
