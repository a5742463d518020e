//! Conjugate gradient least squares on the normal equations `AᵀA x = Aᵀb`

use ndarray::{Array2, ArrayView2, Axis, Zip};
use rayon::prelude::*;

use crate::{Pixelsf32, Projections, Volume, config::Cgls, projector::ParallelProjector};
use super::axis_position;

pub fn reconstruct(tomo: &Projections, projector: &ParallelProjector, cor: Pixelsf32, Cgls { iterations }: Cgls) -> Volume {
    let (_, slices, rays) = tomo.dim();
    let center = axis_position(rays, cor);
    let mut volume = Volume::zeros((slices, rays, rays));
    volume.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(tomo.axis_iter(Axis(1)))
        .for_each(|(mut slice, sino)| slice.assign(&solve(projector, sino, center, iterations)));
    volume
}

fn norm2(a: &Array2<f32>) -> f32 { a.iter().map(|v| v * v).sum() }

/// `iterations` CGLS steps from a zero image
pub(crate) fn solve(projector: &ParallelProjector, sino: ArrayView2<f32>, center: f32, iterations: usize) -> Array2<f32> {
    let rays = sino.ncols();
    let size = projector.size();
    let mut x = Array2::zeros((size, size));
    let mut r = sino.to_owned();
    let mut s = projector.back(r.view(), center);
    let mut p = s.clone();
    let mut gamma = norm2(&s);

    for _ in 0..iterations {
        if gamma == 0.0 { break }
        let q = projector.forward(p.view(), rays, center);
        let qq = norm2(&q);
        if qq == 0.0 { break }
        let alpha = gamma / qq;
        x.scaled_add(alpha, &p);
        r.scaled_add(-alpha, &q);
        s = projector.back(r.view(), center);
        let gamma_next = norm2(&s);
        let beta = gamma_next / gamma;
        Zip::from(&mut p).and(&s).for_each(|p, &s| *p = s + beta * *p);
        gamma = gamma_next;
    }
    x
}

#[cfg(test)]
mod test {
    use super::*;
    use float_eq::assert_float_eq;
    use ndarray::Array3;
    use crate::{Angles, recon::test::{disc, disc_projections}};

    fn residual(projector: &ParallelProjector, x: &Array2<f32>, sino: ArrayView2<f32>, center: f32) -> f32 {
        let ax = projector.forward(x.view(), sino.ncols(), center);
        (&ax - &sino).iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    #[test]
    fn residual_decreases_with_iterations() {
        let size = 24;
        let (tomo, angles) = disc_projections(size, 6.0, 30, 1);
        let projector = ParallelProjector::new(size, &angles);
        let sino = tomo.index_axis(Axis(1), 0);
        let center = axis_position(size, 0.0);
        let residuals: Vec<f32> = [1, 3, 10].iter()
            .map(|&n| residual(&projector, &solve(&projector, sino, center, n), sino, center))
            .collect();
        let initial = sino.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!(residuals[0] < initial);
        assert!(residuals[1] < residuals[0], "{residuals:?}");
        assert!(residuals[2] < residuals[1], "{residuals:?}");
        assert!(residuals[2] < 0.1 * initial, "{residuals:?}");
    }

    #[test]
    fn disc_is_recovered() {
        let size = 24;
        let (tomo, angles) = disc_projections(size, 6.0, 40, 2);
        let volume = reconstruct(&tomo, &ParallelProjector::new(size, &angles), 0.0, Cgls { iterations: 30 });
        let truth = disc(size, 6.0);
        for slice in volume.axis_iter(Axis(0)) {
            let centre = slice.slice(ndarray::s![10..14, 10..14]).mean().unwrap();
            assert_float_eq!(centre, 1.0, abs <= 0.15);
        }
        let error = (&volume.index_axis(Axis(0), 0) - &truth).mapv(f32::abs).mean().unwrap();
        assert!(error < 0.15, "mean absolute error {error}");
    }

    #[test]
    fn empty_sinogram_gives_empty_image() {
        let angles = Angles::linspace(0.0, 3.0, 5);
        let tomo = Array3::zeros((5, 1, 8));
        let volume = reconstruct(&tomo, &ParallelProjector::new(8, &angles), 0.0, Cgls::default());
        assert!(volume.iter().all(|&v| v == 0.0));
    }
}
