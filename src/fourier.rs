//! Frequency-domain filtering of projection rows along the ray axis

use std::f64::consts::PI;

use ndarray::Axis;
use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::Projections;

/// Lowpass FIR filter taps by the window method with a Hamming window.
/// `cutoff` is relative to Nyquist (`0 < cutoff < 1`); the taps are scaled
/// to unit gain at DC.
pub fn firwin(numtaps: usize, cutoff: f64) -> Vec<f64> {
    if numtaps <= 1 { return vec![1.0; numtaps] }
    let alpha = 0.5 * (numtaps - 1) as f64;
    let sinc = |x: f64| if x == 0.0 { 1.0 } else { (PI * x).sin() / (PI * x) };
    let hamming = |n: usize| 0.54 - 0.46 * (2.0 * PI * n as f64 / (numtaps - 1) as f64).cos();
    let h: Vec<f64> = (0..numtaps)
        .map(|n| cutoff * sinc(cutoff * (n as f64 - alpha)) * hamming(n))
        .collect();
    let dc: f64 = h.iter().sum();
    h.into_iter().map(|v| v / dc).collect()
}

/// Magnitude of the frequency response of `taps` at `n` frequencies evenly
/// spaced around the whole unit circle, starting at DC
pub fn freqz_magnitude(taps: &[f64], n: usize) -> Vec<f64> {
    (0..n).map(|k| {
        let w = -2.0 * PI * k as f64 / n as f64;
        taps.iter().enumerate()
            .map(|(j, &t)| Complex::from_polar(t, w * j as f64))
            .sum::<Complex<f64>>()
            .norm()
    }).collect()
}

/// Zero-phase lowpass response for rows of `rays` samples: taps of length
/// `min(100, rays)`, evaluated at the `rays` DFT frequencies
pub fn lowpass_response(rays: usize, cutoff: f32) -> Vec<f32> {
    let taps = firwin(rays.min(100), cutoff as f64);
    freqz_magnitude(&taps, rays).into_iter().map(|v| v as f32).collect()
}

/// Smooth every projection row with a windowed-sinc lowpass filter
pub fn lowpass_rays(tomo: &mut Projections, cutoff: f32) {
    let response = lowpass_response(tomo.len_of(Axis(2)), cutoff);
    filter_rows(tomo, &response);
}

/// Ramp filter for rows zero-padded to `size`, sampled at the DFT
/// frequencies, built from the band-limited spatial kernel
pub fn ramp_filter(size: usize) -> Vec<f32> {
    let mut f = vec![Complex::new(0.0_f64, 0.0); size];
    if size == 0 { return vec![] }
    f[0].re = 0.25;
    for i in (1..size).step_by(2) {
        let n = (if 2 * i <= size { i } else { size - i }) as f64;
        f[i].re = -1.0 / (PI * n).powi(2);
    }
    FftPlanner::<f64>::new().plan_fft_forward(size).process(&mut f);
    f.into_iter().map(|c| (2.0 * c.re) as f32).collect()
}

/// Padded length used for ramp filtering rows of `rays` samples
pub fn ramp_padding(rays: usize) -> usize {
    (2 * rays).next_power_of_two().max(64)
}

/// Replace every row `r` along the ray axis by `real(ifft(fft(r) · response))`.
/// If `response` is longer than the rows, they are zero-padded to its
/// length and cropped back afterwards.
pub fn filter_rows(tomo: &mut Projections, response: &[f32]) {
    let rays = tomo.len_of(Axis(2));
    let size = response.len();
    assert!(size >= rays, "filter response shorter than projection rows");
    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(size);
    let inverse = planner.plan_fft_inverse(size);
    let norm = 1.0 / size as f32;

    tomo.axis_iter_mut(Axis(0))
        .into_par_iter()
        .for_each_init(
            || vec![Complex::new(0.0_f32, 0.0); size],
            |buffer, mut projection| {
                for mut row in projection.rows_mut() {
                    buffer.iter_mut().for_each(|c| *c = Complex::new(0.0, 0.0));
                    for (b, &v) in buffer.iter_mut().zip(row.iter()) { b.re = v }
                    forward.process(buffer);
                    for (b, &h) in buffer.iter_mut().zip(response) { *b *= h }
                    inverse.process(buffer);
                    for (v, b) in row.iter_mut().zip(buffer.iter()) { *v = b.re * norm }
                }
            });
}
