//! Bright outliers (zingers) along the angle axis

use ndarray::{Array1, Axis};
use rayon::prelude::*;

use crate::{Projections, config::OutlierConfig, ndfilter::median_filter_1d};

/// Replace every value exceeding the median of its `size` neighbours along
/// the angle axis by at least `difference` with that median. Dark outliers
/// are left alone.
pub fn remove_outlier_1d(tomo: &mut Projections, &OutlierConfig { difference, size }: &OutlierConfig) {
    let n_angles = tomo.len_of(Axis(0));
    tomo.axis_iter_mut(Axis(1))
        .into_par_iter()
        .for_each_init(
            || Array1::zeros(n_angles),
            |median, mut sinogram| {
                for mut lane in sinogram.columns_mut() {
                    median_filter_1d(lane.view(), size, median.view_mut());
                    for (v, &m) in lane.iter_mut().zip(median.iter()) {
                        if *v - m >= difference { *v = m }
                    }
                }
            });
}
