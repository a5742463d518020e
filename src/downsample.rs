//! Block-average downsampling of detector frames

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;

use crate::{Result, TomoError};

/// Average every `k × k` block of `frame`. Frames whose sides are not
/// multiples of `k` are padded with zeros, so the result has
/// `ceil(rows / k) × ceil(cols / k)` pixels and the edge blocks are darker.
pub fn block_mean(frame: ArrayView2<f32>, k: usize) -> Result<Array2<f32>> {
    if k == 0 { return Err(TomoError::InvalidDownsampleFactor(k)) }
    if k == 1 { return Ok(frame.to_owned()) }
    let (rows, cols) = frame.dim();
    let out_shape = (rows.div_ceil(k), cols.div_ceil(k));
    let mut out = Array2::zeros(out_shape);
    for ((r, c), &v) in frame.indexed_iter() {
        out[[r / k, c / k]] += v;
    }
    let area = (k * k) as f32;
    out.mapv_inplace(|s| s / area);
    Ok(out)
}

/// Downsample each frame of a stack independently
pub fn stack(frames: ArrayView3<f32>, k: usize) -> Result<Array3<f32>> {
    if k == 0 { return Err(TomoError::InvalidDownsampleFactor(k)) }
    if k == 1 { return Ok(frames.to_owned()) }
    let (n, rows, cols) = frames.dim();
    let mut out = Array3::zeros((n, rows.div_ceil(k), cols.div_ceil(k)));
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(frames.axis_iter(Axis(0)))
        .try_for_each(|(mut o, f)| -> Result<()> {
            o.assign(&block_mean(f, k)?);
            Ok(())
        })?;
    Ok(out)
}
