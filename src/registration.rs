//! Sub-pixel image registration by upsampled phase cross-correlation
//!
//! Guizar-Sicairos, Thurman & Fienup, "Efficient subpixel image registration
//! algorithms", Opt. Lett. 33, 156 (2008)

use std::f64::consts::PI;

use ndarray::{Array2, ArrayView2, Axis};
use rustfft::{num_complex::Complex, FftDirection, FftPlanner};

use crate::{Result, TomoError};

type C64 = Complex<f64>;

/// In-place 2-D FFT of a row-major complex array
fn fft2(data: &mut Array2<C64>, direction: FftDirection) {
    let (rows, cols) = data.dim();
    let mut planner = FftPlanner::new();
    let along_rows = planner.plan_fft(cols, direction);
    let along_cols = planner.plan_fft(rows, direction);
    for mut row in data.rows_mut() {
        let mut buffer = row.to_vec();
        along_rows.process(&mut buffer);
        row.iter_mut().zip(buffer).for_each(|(o, v)| *o = v);
    }
    let mut buffer = vec![C64::new(0.0, 0.0); rows];
    for mut column in data.columns_mut() {
        buffer.iter_mut().zip(column.iter()).for_each(|(b, &v)| *b = v);
        along_cols.process(&mut buffer);
        column.iter_mut().zip(&buffer).for_each(|(o, &v)| *o = v);
    }
}

/// Signed frequency index of DFT bin `k` of `n`, as in `fftfreq`
fn signed_frequency(k: usize, n: usize) -> f64 {
    if k <= (n - 1) / 2 { k as f64 } else { k as f64 - n as f64 }
}

/// Position of the largest magnitude, first occurrence in row-major order
fn argmax(data: &Array2<C64>) -> (usize, usize) {
    let mut best = (0, 0);
    let mut max = f64::NEG_INFINITY;
    for ((r, c), v) in data.indexed_iter() {
        let m = v.norm();
        if m > max { max = m; best = (r, c) }
    }
    best
}

/// The shift `(rows, columns)` which registers `moving` with `reference`:
/// `moving` shifted by the result matches `reference`. The precision is
/// `1 / upsample_factor` pixels.
pub fn phase_cross_correlation(reference: ArrayView2<f32>, moving: ArrayView2<f32>, upsample_factor: f64) -> Result<[f64; 2]> {
    if reference.dim() != moving.dim() {
        return Err(TomoError::ShapeMismatch {
            what: "images to register",
            left: reference.shape().to_vec(),
            right: moving.shape().to_vec(),
        })
    }
    let (rows, cols) = reference.dim();
    if rows == 0 || cols == 0 { return Err(TomoError::EmptySelection("empty image to register".into())) }

    let mut src = reference.mapv(|v| C64::new(v as f64, 0.0));
    let mut dst = moving   .mapv(|v| C64::new(v as f64, 0.0));
    fft2(&mut src, FftDirection::Forward);
    fft2(&mut dst, FftDirection::Forward);

    // Normalized cross-power spectrum
    let floor = 100.0 * f32::EPSILON as f64;
    let product: Array2<C64> = ndarray::Zip::from(&src).and(&dst).map_collect(|&s, &d| {
        let p = s * d.conj();
        p / p.norm().max(floor)
    });

    let mut correlation = product.clone();
    fft2(&mut correlation, FftDirection::Inverse);
    let (r, c) = argmax(&correlation);
    let wrap = |m: usize, n: usize| if m > n / 2 { m as f64 - n as f64 } else { m as f64 };
    let mut shifts = [wrap(r, rows), wrap(c, cols)];

    if upsample_factor <= 1.0 { return Ok(shifts) }

    let ups = upsample_factor;
    shifts = shifts.map(|s| (s * ups).round() / ups);
    let region = (ups * 1.5).ceil() as usize;
    let dftshift = (region as f64 / 2.0).trunc();

    // Inverse DFT of the cross-power spectrum, evaluated on a fine grid of
    // `region²` points around the coarse peak
    let position = |u: usize, shift: f64| shift + (u as f64 - dftshift) / ups;
    let kernel = |n: usize, shift: f64| -> Array2<C64> {
        Array2::from_shape_fn((n, region), |(k, u)| {
            let phase = 2.0 * PI * signed_frequency(k, n) * position(u, shift) / n as f64;
            C64::from_polar(1.0, phase)
        })
    };
    let col_kernel = kernel(cols, shifts[1]);
    let row_kernel = kernel(rows, shifts[0]);
    let partial = dot(&product, &col_kernel);            // rows × region
    let fine = dot(&row_kernel.t().to_owned(), &partial); // region × region
    let (ur, uc) = argmax(&fine);
    shifts[0] += (ur as f64 - dftshift) / ups;
    shifts[1] += (uc as f64 - dftshift) / ups;
    Ok(shifts)
}

/// Complex matrix product
fn dot(a: &Array2<C64>, b: &Array2<C64>) -> Array2<C64> {
    let (n, m) = a.dim();
    let p = b.len_of(Axis(1));
    debug_assert_eq!(m, b.len_of(Axis(0)));
    Array2::from_shape_fn((n, p), |(i, j)| {
        (0..m).map(|k| a[[i, k]] * b[[k, j]]).sum()
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use float_eq::assert_float_eq;
    use rstest::rstest;

    /// Smooth blob centred at `(r0, c0)`
    fn blob(rows: usize, cols: usize, r0: f32, c0: f32) -> Array2<f32> {
        Array2::from_shape_fn((rows, cols), |(r, c)| {
            let (dr, dc) = (r as f32 - r0, c as f32 - c0);
            (-(dr * dr + dc * dc) / 8.0).exp()
        })
    }

    #[rstest(/**/ dr  ,  dc  ,
             case( 0.0,  0.0 ),
             case( 3.0, -5.0 ),
             case(-2.0,  7.0 ),
    )]
    fn integer_shifts(dr: f32, dc: f32) {
        let reference = blob(32, 32, 16.0, 16.0);
        let moving    = blob(32, 32, 16.0 - dr, 16.0 - dc);
        let shift = phase_cross_correlation(reference.view(), moving.view(), 1.0).unwrap();
        assert_eq!(shift, [dr as f64, dc as f64]);
    }

    #[rstest(/**/ dc  , case(2.25), case(-1.5), case(0.75))]
    fn subpixel_shifts(dc: f32) {
        let reference = blob(16, 64, 8.0, 30.0);
        let moving    = blob(16, 64, 8.0, 30.0 - dc);
        let [sr, sc] = phase_cross_correlation(reference.view(), moving.view(), 4.0).unwrap();
        assert_float_eq!(sr, 0.0, abs <= 0.25);
        assert_float_eq!(sc, dc as f64, abs <= 0.25);
    }

    #[test]
    fn frequencies_are_signed() {
        let f: Vec<_> = (0..5).map(|k| signed_frequency(k, 5)).collect();
        assert_eq!(f, vec![0.0, 1.0, 2.0, -2.0, -1.0]);
        let f: Vec<_> = (0..4).map(|k| signed_frequency(k, 4)).collect();
        assert_eq!(f, vec![0.0, 1.0, -2.0, -1.0]);
    }

    #[test]
    fn mismatched_images_are_rejected() {
        let a = Array2::<f32>::zeros((4, 4));
        let b = Array2::<f32>::zeros((4, 5));
        assert!(matches!(phase_cross_correlation(a.view(), b.view(), 1.0),
                         Err(TomoError::ShapeMismatch { .. })));
    }
}
