//! Sub-pixel translation of projections

use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD, Axis, Ix2, Ix3};
use rayon::prelude::*;

use crate::{Result, TomoError};

/// Translate one frame: `output(r, c) = input(r + dy, c + dx)`, with
/// bilinear interpolation. Samples falling outside the frame count as zero.
pub fn shift_frame(frame: ArrayView2<f32>, dx: f32, dy: f32) -> Array2<f32> {
    let (rows, cols) = frame.dim();
    let pixel = |r: isize, c: isize| -> f32 {
        if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize { 0.0 }
        else { frame[[r as usize, c as usize]] }
    };
    if dx == 0.0 && dy == 0.0 { return frame.to_owned() }
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let y = r as f32 + dy;
        let x = c as f32 + dx;
        let (y0, x0) = (y.floor(), x.floor());
        let (fy, fx) = (y - y0, x - x0);
        let (y0, x0) = (y0 as isize, x0 as isize);
        (1.0 - fy) * ((1.0 - fx) * pixel(y0    , x0) + fx * pixel(y0    , x0 + 1)) +
               fy  * ((1.0 - fx) * pixel(y0 + 1, x0) + fx * pixel(y0 + 1, x0 + 1))
    })
}

/// Translate a single projection (2-D) or every projection of a stack
/// (3-D) by `(dx, dy)` pixels
pub fn shift_projections(projs: ArrayViewD<f32>, dx: f32, dy: f32) -> Result<ArrayD<f32>> {
    match projs.ndim() {
        2 => {
            let frame = projs.into_dimensionality::<Ix2>().map_err(|_| TomoError::InvalidDimensionality(2))?;
            Ok(shift_frame(frame, dx, dy).into_dyn())
        },
        3 => {
            let stack = projs.into_dimensionality::<Ix3>().map_err(|_| TomoError::InvalidDimensionality(3))?;
            let mut out = stack.to_owned();
            out.axis_iter_mut(Axis(0))
                .into_par_iter()
                .zip(stack.axis_iter(Axis(0)))
                .for_each(|(mut o, frame)| o.assign(&shift_frame(frame, dx, dy)));
            Ok(out.into_dyn())
        },
        n => Err(TomoError::InvalidDimensionality(n)),
    }
}
