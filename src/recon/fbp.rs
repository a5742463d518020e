//! Filtered backprojection

use std::f32::consts::PI;

use ndarray::Axis;
use rayon::prelude::*;

use crate::{
    Angles, Pixelsf32, Projections, Volume,
    config::Fbp,
    fourier::{filter_rows, lowpass_rays, ramp_filter, ramp_padding},
    projector::ParallelProjector,
};
use super::axis_position;

/// Ramp-filter every row of `tomo`, after an optional lowpass, and
/// backproject it onto a `rays × rays` slice
pub fn reconstruct(tomo: &Projections, angles: &Angles, cor: Pixelsf32, Fbp { cutoff }: Fbp) -> Volume {
    let (n_angles, slices, rays) = tomo.dim();
    let mut filtered = tomo.clone();
    if let Some(cutoff) = cutoff {
        lowpass_rays(&mut filtered, cutoff);
    }
    filter_rows(&mut filtered, &ramp_filter(ramp_padding(rays)));

    let projector = ParallelProjector::new(rays, angles);
    let center = axis_position(rays, cor);
    let scale = PI / (2.0 * n_angles as f32);
    let mut volume = Volume::zeros((slices, rays, rays));
    volume.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(filtered.axis_iter(Axis(1)))
        .for_each(|(mut slice, sino)| {
            slice.assign(&projector.back(sino, center));
            slice *= scale;
        });
    volume
}
