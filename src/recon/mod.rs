//! Reconstruction of attenuation projections into a volume, one slice per
//! detector row, by one of three interchangeable backends.

pub mod fbp;
pub mod cgls;
pub mod mbir;

use std::time::Instant;

use ndarray::Axis;

use crate::{
    Angles, Pixelsf32, Projections, Result, TomoError, Volume,
    config::{Backend, ReconConfig},
    projector::{ParallelProjector, ProjectorCache},
    types::check_angles,
    utils::group_digits,
};

/// Reconstruct every detector row of `tomo` (attenuation, `[angle, row,
/// column]`) into a `[row, column, column]` volume. `cor` is the offset of
/// the rotation axis from the detector centre, in detector pixels.
pub fn reconstruct(tomo: &Projections, angles: &Angles, cor: Pixelsf32, config: &ReconConfig) -> Result<Volume> {
    let (n_angles, slices, rays) = tomo.dim();
    check_angles(n_angles, angles)?;
    if n_angles == 0 || slices == 0 || rays == 0 {
        return Err(TomoError::EmptySelection(format!("cannot reconstruct projections of shape {:?}", tomo.shape())))
    }
    let device = config.device.resolve();
    log::info!("reconstructing {slices} slice(s) of {rays}×{rays} from {n_angles} angles, COR {cor}, {:?} on {device:?}",
               config.backend);

    let start = Instant::now();
    let mut volume = match config.backend {
        Backend::Fbp (params) => fbp::reconstruct(tomo, angles, cor, params),
        Backend::Cgls(params) => cgls::reconstruct(tomo, &ParallelProjector::new(rays, angles), cor, params),
        Backend::Mbir(params) => {
            let projector = ParallelProjector::new(rays, angles);
            let norm_squared = ProjectorCache::new(config.cache_dir.as_deref())
                .norm_squared(&projector, rays, axis_position(rays, cor))?;
            mbir::reconstruct(tomo, angles, &projector, norm_squared, cor, params)
        },
    };
    log::info!("reconstruction took {} ms", group_digits(start.elapsed().as_millis()));

    if config.mask {
        mask_outside_circle(&mut volume, config.mask_radius);
    }
    Ok(volume)
}

/// Zero every voxel further than `radius` pixels from the centre of its
/// slice. Without a radius, the circle inscribed in the slice is kept.
pub fn mask_outside_circle(volume: &mut Volume, radius: Option<f32>) {
    let (_, rows, cols) = volume.dim();
    let radius = radius.unwrap_or(rows.max(cols) as f32 / 2.0);
    let (cy, cx) = ((rows as f32 - 1.0) / 2.0, (cols as f32 - 1.0) / 2.0);
    let r2 = radius * radius;
    for mut slice in volume.axis_iter_mut(Axis(0)) {
        for ((r, c), v) in slice.indexed_iter_mut() {
            let (dy, dx) = (r as f32 - cy, c as f32 - cx);
            if dx * dx + dy * dy > r2 { *v = 0.0 }
        }
    }
}

/// Warm the projector cache for each `(image size, angle count)` pair, so
/// that later iterative reconstructions of those shapes start immediately
pub fn cache_projectors(shapes: &[(usize, usize)], config: &ReconConfig) -> Result<()> {
    let cache = ProjectorCache::new(config.cache_dir.as_deref());
    log::info!("caching projectors in {}", cache.dir().display());
    cache.warm(shapes)
}

/// Detector position of the rotation axis for rows of `rays` samples
pub(crate) fn axis_position(rays: usize, cor: Pixelsf32) -> f32 { rays as f32 / 2.0 + cor }

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use ndarray::{Array2, Array3};
    use crate::{config::{Cgls, Fbp, Mbir}, device::Device, utils::linspace};

    /// Uniform disc of unit attenuation and `radius` pixels, centred on a
    /// `size × size` grid
    pub(crate) fn disc(size: usize, radius: f32) -> Array2<f32> {
        let c = size as f32 / 2.0;
        Array2::from_shape_fn((size, size), |(i, j)| {
            let (x, y) = (j as f32 - c, i as f32 - c);
            if x * x + y * y <= radius * radius { 1.0 } else { 0.0 }
        })
    }

    /// Projections of a single disc slice, repeated over `slices` rows
    pub(crate) fn disc_projections(size: usize, radius: f32, n_angles: usize, slices: usize) -> (Projections, Angles) {
        let angles = Angles::from_shape_fn(n_angles, |a| a as f32 * std::f32::consts::PI / n_angles as f32);
        let sino = ParallelProjector::new(size, &angles).forward(disc(size, radius).view(), size, size as f32 / 2.0);
        let tomo = Array3::from_shape_fn((n_angles, slices, size), |(a, _, r)| sino[[a, r]]);
        (tomo, angles)
    }

    #[test]
    fn mask_keeps_the_inscribed_circle() {
        let mut volume = Volume::ones((2, 9, 9));
        mask_outside_circle(&mut volume, None);
        assert_eq!(volume[[1, 4, 4]], 1.0);
        assert_eq!(volume[[1, 4, 0]], 1.0);
        assert_eq!(volume[[1, 0, 0]], 0.0);
        assert_eq!(volume[[0, 8, 8]], 0.0);
    }

    #[test]
    fn mask_with_explicit_radius() {
        let mut volume = Volume::ones((1, 9, 9));
        mask_outside_circle(&mut volume, Some(2.0));
        assert_eq!(volume.sum(), 13.0);
    }

    #[test]
    fn angle_mismatch_is_rejected() {
        let tomo = Projections::zeros((4, 1, 8));
        let angles = Angles::zeros(3);
        assert!(matches!(reconstruct(&tomo, &angles, 0.0, &ReconConfig::default()),
                         Err(TomoError::ShapeMismatch { .. })));
    }

    #[test]
    fn empty_stacks_are_rejected() {
        let tomo = Projections::zeros((0, 1, 8));
        assert!(matches!(reconstruct(&tomo, &Angles::zeros(0), 0.0, &ReconConfig::default()),
                         Err(TomoError::EmptySelection(_))));
    }

    #[test]
    fn backends_share_the_output_shape() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (tomo, angles) = disc_projections(16, 5.0, 12, 3);
        for backend in [Backend::Fbp(Fbp::default()), Backend::Cgls(Cgls { iterations: 3 })] {
            let config = ReconConfig { backend, cache_dir: Some(dir.path().into()), mask: true, ..ReconConfig::default() };
            let volume = reconstruct(&tomo, &angles, 0.0, &config)?;
            assert_eq!(volume.dim(), (3, 16, 16));
            assert!(volume.iter().all(|v| v.is_finite()));
            assert_eq!(volume[[0, 0, 0]], 0.0);
        }
        Ok(())
    }

    #[test]
    fn gpu_requests_still_reconstruct() -> Result<()> {
        let (tomo, angles) = disc_projections(8, 2.0, 6, 1);
        let config = ReconConfig { device: Device::Gpu, ..ReconConfig::default() };
        assert_eq!(reconstruct(&tomo, &angles, 0.0, &config)?.dim(), (1, 8, 8));
        Ok(())
    }

    #[test]
    fn cache_warming_uses_the_configured_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = ReconConfig { cache_dir: Some(dir.path().into()), ..ReconConfig::default() };
        cache_projectors(&[(8, 5)], &config)?;
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn mbir_reuses_warmed_norms() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = ReconConfig {
            backend: Backend::Mbir(Mbir { max_iterations: 3, ..Mbir::default() }),
            cache_dir: Some(dir.path().into()),
            ..ReconConfig::default()
        };
        cache_projectors(&[(8, 6)], &config)?;
        let angles = linspace(0.0, std::f32::consts::PI, 6);
        let tomo = Projections::from_elem((6, 2, 8), 0.5);
        let norms = || -> Result<usize> {
            let entries = std::fs::read_dir(dir.path())?.collect::<std::io::Result<Vec<_>>>()?;
            assert_eq!(entries.len(), 1);
            Ok(std::fs::read_to_string(entries[0].path())?.matches("[[norms]]").count())
        };
        assert_eq!(norms()?, 1);
        // Centred axis: served by the warmed entry
        reconstruct(&tomo, &angles, 0.0, &config)?;
        assert_eq!(norms()?, 1);
        // Shifted axis: computed once, then reused
        reconstruct(&tomo, &angles, 1.5, &config)?;
        reconstruct(&tomo, &angles, 1.5, &config)?;
        assert_eq!(norms()?, 2);
        Ok(())
    }
}
