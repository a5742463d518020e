//! Combined wavelet-Fourier filtering of stripes on attenuation sinograms
//! (Münch et al., Opt. Express 17, 8567, 2009)

use ndarray::{s, Array2};
use rustfft::{num_complex::Complex, FftPlanner};

use crate::{
    Projections, Result,
    config::WaveletStripe,
    wavelet::{Subbands, Wavelet},
};
use super::try_for_each_sinogram;

/// Damp stripe information in the vertical detail bands of a multilevel
/// wavelet decomposition of every sinogram
pub fn remove_stripe_fw(tomo: &mut Projections, params: &WaveletStripe) -> Result<()> {
    let wavelet = Wavelet::by_name(&params.wavelet)?;
    try_for_each_sinogram(tomo, |sino| filter_sinogram(sino, &wavelet, params))
}

fn filter_sinogram(sino: Array2<f32>, wavelet: &Wavelet, &WaveletStripe { sigma, level, pad, .. }: &WaveletStripe) -> Result<Array2<f32>> {
    let (dx, dz) = sino.dim();
    let nx = if pad { dx + dx / 8 } else { dx };
    let xshift = (nx - dx) / 2;

    let mut sli = Array2::zeros((nx, dz));
    sli.slice_mut(s![xshift..xshift + dx, ..]).assign(&sino);

    let mut details = Vec::with_capacity(level);
    for _ in 0..level {
        let Subbands { approx, horizontal, mut vertical, diagonal } = wavelet.dwt2(sli.view());
        damp_vertical(&mut vertical, sigma);
        details.push((horizontal, vertical, diagonal));
        sli = approx;
    }

    for (horizontal, vertical, diagonal) in details.into_iter().rev() {
        let (h, w) = horizontal.dim();
        let approx = sli.slice(s![..h.min(sli.nrows()), ..w.min(sli.ncols())]).to_owned();
        sli = wavelet.idwt2(&Subbands { approx, horizontal, vertical, diagonal })?;
    }
    Ok(sli.slice(s![xshift..xshift + dx, ..dz]).to_owned())
}

/// Suppress the low frequencies along axis 0 (angles) of a vertical detail
/// band with the Gaussian notch `1 - exp(-k² / 2σ²)`
fn damp_vertical(band: &mut Array2<f32>, sigma: f32) {
    let (my, _) = band.dim();
    if my == 0 { return }
    // Frequency index `k` sits at `(k + my/2) % my` after an fftshift; the
    // damping is defined on the shifted axis
    let damp: Vec<f32> = (0..my).map(|k| {
        let p = (k + my / 2) % my;
        let y = (2.0 * p as f32 - my as f32 + 1.0) / 2.0;
        -(-(y * y) / (2.0 * sigma * sigma)).exp_m1()
    }).collect();

    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(my);
    let inverse = planner.plan_fft_inverse(my);
    let mut buffer = vec![Complex::new(0.0, 0.0); my];
    let norm = 1.0 / my as f32;
    for mut column in band.columns_mut() {
        for (b, &v) in buffer.iter_mut().zip(column.iter()) { *b = Complex::new(v, 0.0) }
        forward.process(&mut buffer);
        for (b, &d) in buffer.iter_mut().zip(&damp) { *b *= d }
        inverse.process(&mut buffer);
        for (v, b) in column.iter_mut().zip(&buffer) { *v = b.re * norm }
    }
}
