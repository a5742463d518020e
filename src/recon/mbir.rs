//! Model-based iterative reconstruction: MAP estimate under a Gaussian noise
//! model and a q-GGMRF prior,
//!
//! ```text
//!     ‖y - Ax‖² / 2σ_y²  +  Σ_i Σ_{j ∈ N(i)} b_ij ρ(x_i - x_j)
//! ```
//!
//! minimized by FISTA from a filtered backprojection.

use ndarray::{Array2, ArrayView2, Axis, Zip};
use rayon::prelude::*;

use crate::{Angles, Pixelsf32, Projections, Volume, config::{Fbp, Mbir}, projector::ParallelProjector};
use super::{axis_position, fbp};

/// Shape parameters of the q-GGMRF potential
const P: f32 = 1.2;
const Q: f32 = 2.0;
const T: f32 = 1.0;

/// The q-GGMRF potential and its derivative, for a prior of width `sigma`
#[derive(Debug, Clone, Copy)]
struct Potential { sigma: f32 }

impl Potential {

    #[cfg(test)]
    fn rho(&self, delta: f32) -> f32 {
        let a = delta.abs();
        let ur = (a / (T * self.sigma)).powf(Q - P);
        a.powf(P) / (P * self.sigma.powf(P)) * ur / (1.0 + ur)
    }

    fn derivative(&self, delta: f32) -> f32 {
        let a = delta.abs();
        if a == 0.0 { return 0.0 }
        let ur = (a / (T * self.sigma)).powf(Q - P);
        let base = a.powf(P - 1.0) / self.sigma.powf(P) * ur / (1.0 + ur);
        delta.signum() * base * (1.0 + (Q - P) / P / (1.0 + ur))
    }

    /// `ρ''(0)`, the largest curvature of the potential
    fn curvature(&self) -> f32 {
        Q / P / (T.powf(Q - P) * self.sigma.powf(Q))
    }
}

/// Row/column offsets of the 8 neighbours, and their weights: diagonals
/// count `1/√2` of the orthogonal neighbours, all sum to 1
fn neighbourhood() -> [((isize, isize), f32); 8] {
    let d = std::f32::consts::FRAC_1_SQRT_2;
    let total = 4.0 + 4.0 * d;
    let (o, g) = (1.0 / total, d / total);
    [((-1, -1), g), ((-1, 0), o), ((-1, 1), g),
     (( 0, -1), o),               (( 0, 1), o),
     (( 1, -1), g), (( 1, 0), o), (( 1, 1), g)]
}

/// Gradient of the prior term
fn prior_gradient(x: &Array2<f32>, potential: Potential) -> Array2<f32> {
    let (rows, cols) = x.dim();
    let neighbours = neighbourhood();
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let xi = x[[r, c]];
        neighbours.iter().filter_map(|&((dr, dc), b)| {
            let (nr, nc) = (r as isize + dr, c as isize + dc);
            (nr >= 0 && nc >= 0 && (nr as usize) < rows && (nc as usize) < cols)
                .then(|| 2.0 * b * potential.derivative(xi - x[[nr as usize, nc as usize]]))
        }).sum()
    })
}

/// Noise and prior widths of the model, shared by every slice
#[derive(Debug, Clone, Copy)]
struct Model {
    sigma_y: f32,
    potential: Potential,
    /// Lipschitz constant of the objective's gradient
    lipschitz: f32,
}

impl Model {

    /// `norm_squared` is `‖A‖²` of the projector, as found by power iteration
    fn new(tomo: &Projections, norm_squared: f32, params: &Mbir) -> Self {
        let (_, _, rays) = tomo.dim();
        let n = tomo.len().max(1) as f32;
        let rms = (tomo.iter().map(|v| v * v).sum::<f32>() / n).sqrt();
        let mean_abs = tomo.iter().map(|v| v.abs()).sum::<f32>() / n;

        let positive_or_one = |v: f32| if v > 0.0 && v.is_finite() { v } else { 1.0 };
        let sigma_y = positive_or_one(10_f32.powf(-params.snr_db / 20.0) * rms);
        let sigma_x = positive_or_one(0.2 * 2_f32.powf(params.sharpness) * mean_abs / rays as f32);
        let potential = Potential { sigma: sigma_x };

        // Power iteration approaches the norm from below
        let a_norm2 = 1.1 * norm_squared;
        let lipschitz = a_norm2 / (sigma_y * sigma_y) + 4.0 * potential.curvature();
        log::debug!("MBIR model: σ_y = {sigma_y}, σ_x = {sigma_x}, L = {lipschitz}");
        Self { sigma_y, potential, lipschitz }
    }
}

/// `norm_squared` is `‖A‖²` of `projector` on this detector and axis
/// position; `ProjectorCache::norm_squared` provides it.
pub fn reconstruct(tomo: &Projections, angles: &Angles, projector: &ParallelProjector, norm_squared: f32,
                   cor: Pixelsf32, params: Mbir) -> Volume {
    let (_, _, rays) = tomo.dim();
    let center = axis_position(rays, cor);
    let model = Model::new(tomo, norm_squared, &params);
    let mut volume = fbp::reconstruct(tomo, angles, cor, Fbp::default());
    volume.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(tomo.axis_iter(Axis(1)))
        .enumerate()
        .for_each(|(index, (mut slice, sino))| {
            let start = slice.to_owned();
            slice.assign(&solve(projector, sino, center, start, &model, &params, index));
        });
    volume
}

/// FISTA iterations for one slice, starting from `x`
fn solve(projector: &ParallelProjector, sino: ArrayView2<f32>, center: f32, mut x: Array2<f32>,
         model: &Model, params: &Mbir, index: usize) -> Array2<f32> {
    let rays = sino.ncols();
    let positivity = params.positivity;
    if positivity { x.mapv_inplace(|v| v.max(0.0)) }
    let step = 1.0 / model.lipschitz;
    let data_weight = 1.0 / (model.sigma_y * model.sigma_y);

    let mut z = x.clone();
    let mut t = 1.0_f32;
    for iteration in 0..params.max_iterations {
        let residual = projector.forward(z.view(), rays, center) - &sino;
        let data_gradient = projector.back(residual.view(), center);
        let prior = prior_gradient(&z, model.potential);
        let mut next = z.clone();
        Zip::from(&mut next).and(&data_gradient).and(&prior).for_each(|n, &d, &p| {
            let v = *n - step * (data_weight * d + p);
            *n = if positivity { v.max(0.0) } else { v };
        });

        let t_next = (1.0 + (1.0 + 4.0 * t * t).sqrt()) / 2.0;
        let momentum = (t - 1.0) / t_next;
        let change: f32 = next.iter().zip(&x).map(|(a, b)| (a - b).abs()).sum();
        let size: f32 = next.iter().map(|v| v.abs()).sum();
        Zip::from(&mut z).and(&next).and(&x).for_each(|z, &n, &x| *z = n + momentum * (n - x));
        x = next;
        t = t_next;

        let percent = if size > 0.0 { 100.0 * change / size } else { 0.0 };
        if percent < params.stop_threshold {
            log::debug!("slice {index}: converged after {} iterations ({percent:.4}%)", iteration + 1);
            break
        }
    }
    x
}

#[cfg(test)]
mod test {
    use super::*;
    use float_eq::assert_float_eq;
    use rstest::rstest;
    use crate::{projector::NORM_ITERATIONS, recon::test::disc_projections};

    fn norm_squared(projector: &ParallelProjector, rays: usize) -> f32 {
        projector.norm_squared(rays, axis_position(rays, 0.0), NORM_ITERATIONS)
    }

    #[test]
    fn neighbour_weights_sum_to_one() {
        let total: f32 = neighbourhood().iter().map(|(_, b)| b).sum();
        assert_float_eq!(total, 1.0, abs <= 1e-6);
        let [(_, diagonal), (_, orthogonal), ..] = neighbourhood();
        assert_float_eq!(diagonal / orthogonal, std::f32::consts::FRAC_1_SQRT_2, abs <= 1e-6);
    }

    #[rstest(/**/ delta, case(0.01), case(0.3), case(1.0), case(-2.5), case(40.0))]
    fn derivative_matches_the_potential(delta: f32) {
        let potential = Potential { sigma: 0.7 };
        let h = 1e-3 * delta.abs().max(1.0);
        let numeric = (potential.rho(delta + h) as f64 - potential.rho(delta - h) as f64) / (2.0 * h as f64);
        assert_float_eq!(potential.derivative(delta) as f64, numeric, rmax <= 1e-2);
    }

    #[test]
    fn potential_is_quadratic_near_zero() {
        let potential = Potential { sigma: 0.5 };
        let delta = 1e-4;
        assert_float_eq!(potential.derivative(delta) / delta, potential.curvature(), rmax <= 1e-2);
        assert_eq!(potential.derivative(0.0), 0.0);
        assert!(potential.derivative(-delta) < 0.0);
    }

    fn relative_residual(volume: &Volume, tomo: &Projections, projector: &ParallelProjector) -> f32 {
        let rays = tomo.len_of(Axis(2));
        let sino = tomo.index_axis(Axis(1), 0);
        let ax = projector.forward(volume.index_axis(Axis(0), 0), rays, axis_position(rays, 0.0));
        let r = (&ax - &sino).iter().map(|v| v * v).sum::<f32>().sqrt();
        r / sino.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    #[test]
    fn positivity_is_enforced() {
        let size = 20;
        let (mut tomo, angles) = disc_projections(size, 5.0, 24, 1);
        // Ripple which an unconstrained solution would follow below zero
        for ((a, _, r), v) in tomo.indexed_iter_mut() { *v += 0.5 * ((a * 3 + r * 5) as f32).sin() }
        let projector = ParallelProjector::new(size, &angles);
        let params = Mbir { max_iterations: 30, ..Mbir::default() };
        let volume = reconstruct(&tomo, &angles, &projector, norm_squared(&projector, size), 0.0, params);
        assert!(volume.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn reconstruction_fits_the_data() {
        let size = 24;
        let (tomo, angles) = disc_projections(size, 6.0, 36, 1);
        let projector = ParallelProjector::new(size, &angles);
        let params = Mbir { max_iterations: 200, stop_threshold: 0.0, ..Mbir::default() };
        let volume = reconstruct(&tomo, &angles, &projector, norm_squared(&projector, size), 0.0, params);
        let residual = relative_residual(&volume, &tomo, &projector);
        assert!(residual < 0.1, "relative residual {residual}");
        let centre = volume.slice(ndarray::s![0, 10..14, 10..14]).mean().unwrap();
        assert_float_eq!(centre, 1.0, abs <= 0.2);
    }

    #[test]
    fn empty_sinogram_stays_empty() {
        let angles = Angles::linspace(0.0, 3.0, 6);
        let tomo = Projections::zeros((6, 2, 8));
        let projector = ParallelProjector::new(8, &angles);
        let volume = reconstruct(&tomo, &angles, &projector, norm_squared(&projector, 8), 0.0, Mbir::default());
        assert!(volume.iter().all(|&v| v == 0.0));
    }
}
