//! Single-level discrete wavelet transforms of the Daubechies family with
//! symmetric (half-sample) boundary extension.
//!
//! Coefficient layout follows the usual convention: a signal of length `n`
//! filtered with `F` taps gives `(n + F - 1) / 2` coefficients per band, and
//! the inverse of `m` coefficients per band has length `2m - F + 2`.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::{Result, TomoError, ndfilter::reflect};

/// Reconstruction lowpass filters; everything else follows by the
/// quadrature mirror relations
const DB1: [f64;  2] = [0.7071067811865476, 0.7071067811865476];
const DB2: [f64;  4] = [0.48296291314469025, 0.8365163037374691, 0.22414386804185735, -0.12940952255092145];
const DB3: [f64;  6] = [0.3326705529509569, 0.8068915093133388, 0.4598775021193313, -0.13501102001039084,
                        -0.08544127388224149, 0.035226291882100656];
const DB4: [f64;  8] = [0.23037781330885523, 0.7148465705525415, 0.6308807679295904, -0.02798376941698385,
                        -0.18703481171888114, 0.030841381835986965, 0.032883011666982945, -0.010597401784997278];
const DB5: [f64; 10] = [0.160102397974125, 0.6038292697974729, 0.7243085284385744, 0.13842814590110342,
                        -0.24229488706619015, -0.03224486958502952, 0.07757149384006515, -0.006241490213011705,
                        -0.012580751999015526, 0.003335725285001549];
const DB6: [f64; 12] = [0.11154074335008017, 0.4946238903983854, 0.7511339080215775, 0.3152503517092432,
                        -0.22626469396516913, -0.12976686756709563, 0.09750160558707936, 0.02752286553001629,
                        -0.031582039318031156, 0.0005538422009938016, 0.004777257511010651, -0.00107730108499558];

#[derive(Debug, Clone, PartialEq)]
pub struct Wavelet {
    pub name: String,
    dec_lo: Vec<f64>,
    dec_hi: Vec<f64>,
    rec_lo: Vec<f64>,
    rec_hi: Vec<f64>,
}

/// The four subbands of a 2-D decomposition. `horizontal` holds details
/// along axis 0, `vertical` details along axis 1.
#[derive(Debug, Clone)]
pub struct Subbands {
    pub approx: Array2<f32>,
    pub horizontal: Array2<f32>,
    pub vertical: Array2<f32>,
    pub diagonal: Array2<f32>,
}

impl Wavelet {

    pub fn by_name(name: &str) -> Result<Self> {
        let rec_lo: &[f64] = match name {
            "haar" | "db1" => &DB1,
            "db2" => &DB2,
            "db3" => &DB3,
            "db4" => &DB4,
            "db5" => &DB5,
            "db6" => &DB6,
            _ => return Err(TomoError::UnknownWavelet(name.into())),
        };
        let rec_lo = rec_lo.to_vec();
        let dec_lo: Vec<_> = rec_lo.iter().rev().copied().collect();
        let rec_hi: Vec<_> = dec_lo.iter().enumerate()
            .map(|(k, &c)| if k % 2 == 0 { c } else { -c })
            .collect();
        let dec_hi = rec_hi.iter().rev().copied().collect();
        Ok(Self { name: name.into(), dec_lo, dec_hi, rec_lo, rec_hi })
    }

    pub fn filter_len(&self) -> usize { self.rec_lo.len() }

    /// Approximation and detail coefficients of `x`
    pub fn dwt(&self, x: ArrayView1<f32>) -> (Vec<f32>, Vec<f32>) {
        let n = x.len();
        let f = self.filter_len();
        let len = (n + f - 1) / 2;
        let mut approx = Vec::with_capacity(len);
        let mut detail = Vec::with_capacity(len);
        for o in 0..len {
            let i = 2 * o as isize + 1;
            let (mut a, mut d) = (0.0, 0.0);
            for j in 0..f {
                let v = x[reflect(i - j as isize, n)] as f64;
                a += self.dec_lo[j] * v;
                d += self.dec_hi[j] * v;
            }
            approx.push(a as f32);
            detail.push(d as f32);
        }
        (approx, detail)
    }

    /// Inverse of `dwt`; the result may be one sample longer than the
    /// original signal if that had odd length
    pub fn idwt(&self, approx: ArrayView1<f32>, detail: ArrayView1<f32>) -> Vec<f32> {
        let m = approx.len();
        let f = self.filter_len();
        let len = (2 * m + 2).saturating_sub(f);
        if m == 0 { return vec![] }
        (0..len).map(|k| {
            // Taps `k + f - 2 - 2n` must fall in `0..f`
            let lo = k / 2;
            let hi = ((k + f - 2) / 2).min(m - 1);
            let mut acc = 0.0;
            for n in lo..=hi {
                let tap = k + f - 2 - 2 * n;
                acc += self.rec_lo[tap] * approx[n] as f64 + self.rec_hi[tap] * detail[n] as f64;
            }
            acc as f32
        }).collect()
    }

    /// One level of the separable 2-D transform
    pub fn dwt2(&self, x: ArrayView2<f32>) -> Subbands {
        let (lo0, hi0) = self.along(x, Axis(0));
        let (approx,     vertical) = self.along(lo0.view(), Axis(1));
        let (horizontal, diagonal) = self.along(hi0.view(), Axis(1));
        Subbands { approx, horizontal, vertical, diagonal }
    }

    /// Inverse of `dwt2`. All four subbands must have the same shape.
    pub fn idwt2(&self, bands: &Subbands) -> Result<Array2<f32>> {
        let Subbands { approx, horizontal, vertical, diagonal } = bands;
        for band in [horizontal, vertical, diagonal] {
            if band.dim() != approx.dim() {
                return Err(TomoError::ShapeMismatch {
                    what: "wavelet subbands",
                    left: approx.shape().to_vec(),
                    right: band.shape().to_vec(),
                })
            }
        }
        let lo0 = self.inverse_along(approx.view(),     vertical.view(), Axis(1));
        let hi0 = self.inverse_along(horizontal.view(), diagonal.view(), Axis(1));
        Ok(self.inverse_along(lo0.view(), hi0.view(), Axis(0)))
    }

    fn along(&self, x: ArrayView2<f32>, axis: Axis) -> (Array2<f32>, Array2<f32>) {
        let n = x.len_of(axis);
        let len = (n + self.filter_len() - 1) / 2;
        let mut shape = [x.nrows(), x.ncols()];
        shape[axis.index()] = len;
        let mut lo = Array2::zeros(shape);
        let mut hi = Array2::zeros(shape);
        for ((lane, mut l), mut h) in x.lanes(axis).into_iter()
            .zip(lo.lanes_mut(axis))
            .zip(hi.lanes_mut(axis))
        {
            let (a, d) = self.dwt(lane);
            l.iter_mut().zip(a).for_each(|(o, v)| *o = v);
            h.iter_mut().zip(d).for_each(|(o, v)| *o = v);
        }
        (lo, hi)
    }

    fn inverse_along(&self, lo: ArrayView2<f32>, hi: ArrayView2<f32>, axis: Axis) -> Array2<f32> {
        let m = lo.len_of(axis);
        let len = (2 * m + 2).saturating_sub(self.filter_len());
        let mut shape = [lo.nrows(), lo.ncols()];
        shape[axis.index()] = len;
        let mut out = Array2::zeros(shape);
        for ((a, d), mut o) in lo.lanes(axis).into_iter()
            .zip(hi.lanes(axis))
            .zip(out.lanes_mut(axis))
        {
            o.iter_mut().zip(self.idwt(a, d)).for_each(|(o, v)| *o = v);
        }
        out
    }
}
