//! Removal of dead, large and small stripes by sorting, median filtering and
//! interpolation, on transmission sinograms

use ndarray::{s, Array1, Array2, Axis, Zip};

use crate::{
    Projections,
    config::AllStripe,
    ndfilter::{dilate, interpolate_flagged, median_filter_1d, uniform_filter_1d},
};
use super::{argsort, detect_stripe, for_each_sinogram};

/// Width of the smoothing along the angle axis used to find dead columns
const DEAD_SMOOTHING: usize = 10;

/// Fraction of the sorted intensities (half at each end) ignored when
/// estimating large stripes
const DROP_RATIO: f32 = 0.1;

/// Remove all three kinds of stripe from every sinogram
pub fn remove_all_stripe(tomo: &mut Projections, &AllStripe { snr, la_size, sm_size }: &AllStripe) {
    for_each_sinogram(tomo, |sino| {
        remove_dead(sino, snr, la_size);
        remove_small(sino, sm_size);
    });
}

/// Dead columns, then the large stripes they leave behind
fn remove_dead(sino: &mut Array2<f32>, snr: f32, size: usize) {
    interpolate_dead(sino, snr, size);
    remove_large(sino, snr, size);
}

/// Columns whose fluctuation along the angle axis is abnormal (unresponsive
/// or fluctuating pixels) are replaced by interpolation from their
/// neighbours
fn interpolate_dead(sino: &mut Array2<f32>, snr: f32, size: usize) {
    let (nrow, ncol) = sino.dim();
    if ncol < 5 || nrow < 2 { return }
    let mut smooth = Array1::zeros(nrow);
    let fluctuation: Array1<f32> = sino.columns().into_iter().map(|column| {
        uniform_filter_1d(column, DEAD_SMOOTHING, smooth.view_mut());
        Zip::from(&column).and(&smooth).fold(0.0, |acc, &v, &m| acc + (v - m).abs())
    }).collect();
    let mean = fluctuation.mean().unwrap_or(0.0);
    let mut background = Array1::zeros(ncol);
    median_filter_1d(fluctuation.view(), size, background.view_mut());
    background.mapv_inplace(|b| if b == 0.0 { mean } else { b });
    let ratio: Vec<f32> = Zip::from(&fluctuation).and(&background)
        .map_collect(|&f, &b| if b != 0.0 { f / b } else { 1.0 })
        .to_vec();

    let mut flagged = dilate(&detect_stripe(&ratio, snr));
    flagged[..2].fill(false);
    flagged[ncol - 2..].fill(false);
    if flagged.iter().any(|&f| f) {
        for row in sino.rows_mut() {
            interpolate_flagged(row, &flagged);
        }
    }
}

/// Sorted columns, median-smoothed across columns
fn sorted_and_smoothed(sino: &Array2<f32>, size: usize) -> (Vec<Vec<usize>>, Array2<f32>, Array2<f32>) {
    let (nrow, ncol) = sino.dim();
    let orders: Vec<Vec<usize>> = sino.columns().into_iter().map(argsort).collect();
    let sorted = Array2::from_shape_fn((nrow, ncol), |(r, c)| sino[[orders[c][r], c]]);
    let mut smooth = Array2::zeros((nrow, ncol));
    for (row, out) in sorted.rows().into_iter().zip(smooth.rows_mut()) {
        median_filter_1d(row, size, out);
    }
    (orders, sorted, smooth)
}

/// Wide stripes: columns whose overall level differs from their smoothed
/// neighbourhood. The whole sinogram is normalized by the per-column ratio,
/// and flagged columns are replaced by the smoothed sorted intensities,
/// put back in each column's original order.
fn remove_large(sino: &mut Array2<f32>, snr: f32, size: usize) {
    let (nrow, ncol) = sino.dim();
    if ncol < 5 || nrow < 2 { return }
    let ndrop = (0.5 * DROP_RATIO * nrow as f32) as usize;
    let (_, sorted, smooth) = sorted_and_smoothed(sino, size);
    let (Some(level), Some(smoothed_level)) = (sorted.slice(s![ndrop..nrow - ndrop, ..]).mean_axis(Axis(0)),
                                               smooth.slice(s![ndrop..nrow - ndrop, ..]).mean_axis(Axis(0)))
    else { return };
    let ratio: Vec<f32> = Zip::from(&level).and(&smoothed_level)
        .map_collect(|&l, &s| if s != 0.0 { l / s } else { 1.0 })
        .to_vec();
    let flagged = dilate(&detect_stripe(&ratio, snr));

    for (mut column, &r) in sino.columns_mut().into_iter().zip(&ratio) {
        if r != 0.0 { column.mapv_inplace(|v| v / r) }
    }
    for c in (0..ncol).filter(|&c| flagged[c]) {
        let order = argsort(sino.column(c));
        for (k, &r) in order.iter().enumerate() {
            sino[[r, c]] = smooth[[k, c]];
        }
    }
}

/// Narrow stripes: sort each column, median-filter across columns and
/// unsort
fn remove_small(sino: &mut Array2<f32>, size: usize) {
    let (nrow, ncol) = sino.dim();
    if nrow == 0 || ncol == 0 { return }
    let (orders, _, smooth) = sorted_and_smoothed(sino, size);
    for (c, order) in orders.iter().enumerate() {
        for (k, &r) in order.iter().enumerate() {
            sino[[r, c]] = smooth[[k, c]];
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::Array3;

    /// A smooth object seen over 90 angles plus a constant offset on one
    /// detector column
    fn striped(column: usize, factor: f32) -> Array2<f32> {
        Array2::from_shape_fn((90, 64), |(a, c)| {
            let x = c as f32 - 32.0 - 8.0 * (a as f32 * 0.07).sin();
            let t = 0.9 - 0.4 * (-x * x / 200.0).exp();
            if c == column { t * factor } else { t }
        })
    }

    fn column_error(sino: &Array2<f32>, reference: &Array2<f32>, c: usize) -> f32 {
        (&sino.column(c) - &reference.column(c)).mapv(f32::abs).mean().unwrap()
    }

    #[test]
    fn large_stripe_is_suppressed() {
        let clean = striped(usize::MAX, 1.0);
        let mut sino = striped(40, 1.2);
        let before = column_error(&sino, &clean, 40);
        remove_large(&mut sino, 3.0, 11);
        let after = column_error(&sino, &clean, 40);
        assert!(after < 0.2 * before, "before {before}, after {after}");
    }

    #[test]
    fn dead_column_is_interpolated() {
        let clean = striped(usize::MAX, 1.0);
        let mut sino = clean.clone();
        for a in 0..90 { sino[[a, 20]] = if a % 2 == 0 { 0.1 } else { 1.5 } }
        interpolate_dead(&mut sino, 3.0, 11);
        assert!(column_error(&sino, &clean, 20) < 0.05);
    }

    #[test]
    fn dead_pass_also_suppresses_large_stripes() {
        let clean = striped(usize::MAX, 1.0);
        let mut sino = striped(40, 1.2);
        for a in 0..90 { sino[[a, 20]] = if a % 2 == 0 { 0.1 } else { 1.5 } }
        let before = column_error(&sino, &clean, 40);
        remove_dead(&mut sino, 3.0, 11);
        assert!(column_error(&sino, &clean, 20) < 0.1);
        let after = column_error(&sino, &clean, 40);
        assert!(after < 0.3 * before, "before {before}, after {after}");
    }

    #[test]
    fn clean_sinograms_change_little() {
        let clean = striped(usize::MAX, 1.0);
        let mut tomo = Array3::from_shape_fn((90, 2, 64), |(a, _, c)| clean[[a, c]]);
        remove_all_stripe(&mut tomo, &AllStripe { snr: 3.0, la_size: 11, sm_size: 5 });
        assert!(tomo.iter().all(|v| v.is_finite()));
        // Normalizing each column by its level relative to the median-smoothed
        // level rescales columns on a curved profile by a few percent
        let worst = Zip::from(tomo.index_axis(Axis(1), 0)).and(&clean)
            .fold(0.0_f32, |acc, &a, &b| acc.max((a - b).abs()));
        assert!(worst < 0.1, "worst deviation {worst}");
    }

    #[test]
    fn tiny_sinograms_are_left_alone() {
        let mut tomo = Array3::from_elem((2, 1, 3), 0.5);
        remove_all_stripe(&mut tomo, &AllStripe::default());
        assert_eq!(tomo, Array3::from_elem((2, 1, 3), 0.5));
    }
}
