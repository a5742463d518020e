//! Pixel-driven parallel-beam projector, and an on-disk cache of its
//! operator norms.
//!
//! The image grid is `size × size` pixels, the same pitch as the detector.
//! Pixel `(i, j)` sits at `x = j - size/2`, `y = i - size/2` and, at angle
//! `θ`, lands on detector position `x cos θ + y sin θ + center`. The forward
//! projection splats each pixel linearly onto the two detector bins
//! straddling that position; the backprojection interpolates linearly
//! between the same two bins, so the pair is an exact adjoint.

use std::{env, fs, path::{Path, PathBuf}, time::Instant};

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::{Angles, Result, utils::{group_digits, linspace, timing::Progress}};

/// Environment variable consulted for the cache directory when none is
/// configured
pub const CACHE_DIR_VAR: &str = "TOMOHELP_CACHE_DIR";

/// Power iterations behind a cached operator norm
pub const NORM_ITERATIONS: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct ParallelProjector {
    size: usize,
    /// `[angle, column]`: `x cos θ`
    x_terms: Array2<f32>,
    /// `[angle, row]`: `y sin θ`
    y_terms: Array2<f32>,
    /// Of the angles the tables were built for
    fingerprint: u64,
}

/// The two detector bins straddling position `t`, with their linear
/// interpolation weights. Bins off the detector are `None`.
#[inline]
fn straddle(t: f32, rays: usize) -> [(Option<usize>, f32); 2] {
    let lo = t.floor();
    let f = t - lo;
    let bin = |k: f32| (k >= 0.0 && k < rays as f32).then_some(k as usize);
    [(bin(lo), 1.0 - f), (bin(lo + 1.0), f)]
}

impl ParallelProjector {

    pub fn new(size: usize, angles: &Angles) -> Self {
        let half = size as f32 / 2.0;
        let n = angles.len();
        let x_terms = Array2::from_shape_fn((n, size), |(a, j)| (j as f32 - half) * angles[a].cos());
        let y_terms = Array2::from_shape_fn((n, size), |(a, i)| (i as f32 - half) * angles[a].sin());
        Self { size, x_terms, y_terms, fingerprint: fingerprint(angles) }
    }

    pub fn size    (&self) -> usize { self.size }
    pub fn n_angles(&self) -> usize { self.x_terms.nrows() }

    /// Sinogram `[angle, ray]` of `image` on a detector of `rays` bins whose
    /// rotation axis sits at detector position `center`
    pub fn forward(&self, image: ArrayView2<f32>, rays: usize, center: f32) -> Array2<f32> {
        debug_assert_eq!(image.dim(), (self.size, self.size));
        let mut sino = Array2::zeros((self.n_angles(), rays));
        for ((mut bins, xs), ys) in sino.rows_mut().into_iter().zip(self.x_terms.rows()).zip(self.y_terms.rows()) {
            for (row, &y) in image.rows().into_iter().zip(ys) {
                for (&value, &x) in row.iter().zip(xs) {
                    if value == 0.0 { continue }
                    for (bin, w) in straddle(x + y + center, rays) {
                        if let Some(k) = bin { bins[k] += w * value }
                    }
                }
            }
        }
        sino
    }

    /// Unfiltered backprojection of `sino` (`[angle, ray]`) onto the image
    /// grid
    pub fn back(&self, sino: ArrayView2<f32>, center: f32) -> Array2<f32> {
        debug_assert_eq!(sino.nrows(), self.n_angles());
        let rays = sino.ncols();
        let mut image = Array2::zeros((self.size, self.size));
        for ((bins, xs), ys) in sino.rows().into_iter().zip(self.x_terms.rows()).zip(self.y_terms.rows()) {
            for (mut row, &y) in image.rows_mut().into_iter().zip(ys) {
                for (pixel, &x) in row.iter_mut().zip(xs) {
                    for (bin, w) in straddle(x + y + center, rays) {
                        if let Some(k) = bin { *pixel += w * bins[k] }
                    }
                }
            }
        }
        image
    }

    /// Largest eigenvalue of `AᵀA` by power iteration
    pub fn norm_squared(&self, rays: usize, center: f32, iterations: usize) -> f32 {
        let mut v = Array2::from_elem((self.size, self.size), 1.0_f32);
        let mut lambda = 0.0;
        for _ in 0..iterations {
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm == 0.0 { return 0.0 }
            v.mapv_inplace(|x| x / norm);
            let w = self.back(self.forward(v.view(), rays, center).view(), center);
            lambda = v.iter().zip(&w).map(|(a, b)| a * b).sum();
            v = w;
        }
        lambda
    }
}

/// FNV-1a over the bit patterns of the angles
fn fingerprint(angles: &Angles) -> u64 {
    angles.iter().fold(0xcbf2_9ce4_8422_2325, |hash, a| {
        a.to_bits().to_le_bytes().iter()
            .fold(hash, |h, &b| (h ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3))
    })
}

/// Directory of operator norms, one TOML file per image size and angle set.
///
/// The geometry tables of a `ParallelProjector` are cheap to rebuild; what
/// costs is the power iteration behind `norm_squared`, which every
/// model-based reconstruction needs. Each entry lists the norms found so far
/// for the detector widths and axis positions it was used with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectorCache {
    dir: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
struct Entry {
    size: usize,
    n_angles: usize,
    #[serde(default)]
    norms: Vec<Norm>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
struct Norm {
    rays: usize,
    center: f32,
    norm_squared: f32,
}

impl Entry {
    fn lookup(&self, rays: usize, center: f32) -> Option<f32> {
        self.norms.iter()
            .find(|n| n.rays == rays && n.center == center)
            .map(|n| n.norm_squared)
    }
}

impl ProjectorCache {

    /// Cache in `configured`, else in `$TOMOHELP_CACHE_DIR`, else in a
    /// directory under the system temporary directory
    pub fn new(configured: Option<&Path>) -> Self {
        let dir = configured.map(Path::to_path_buf)
            .or_else(|| env::var_os(CACHE_DIR_VAR).map(PathBuf::from))
            .unwrap_or_else(|| env::temp_dir().join("tomohelp-projector-cache"));
        Self { dir }
    }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn entry_path(&self, projector: &ParallelProjector) -> PathBuf {
        self.dir.join(format!("parallel-{}-{}-{:016x}.toml",
                              projector.size, projector.n_angles(), projector.fingerprint))
    }

    /// `‖A‖²` of `projector` on a detector of `rays` bins with the rotation
    /// axis at `center`: read from the cache if known, otherwise found by
    /// power iteration and stored
    pub fn norm_squared(&self, projector: &ParallelProjector, rays: usize, center: f32) -> Result<f32> {
        let path = self.entry_path(projector);
        let mut entry = self.read(&path, projector);
        if let Some(norm_squared) = entry.lookup(rays, center) {
            log::debug!("operator norm for {rays} rays, axis at {center}, read from {}", path.display());
            return Ok(norm_squared)
        }
        let mut progress = Progress::new();
        let norm_squared = projector.norm_squared(rays, center, NORM_ITERATIONS);
        progress.lap(&format!("operator norm for {rays} rays, axis at {center}"));
        entry.norms.push(Norm { rays, center, norm_squared });
        self.store(&path, &entry)?;
        Ok(norm_squared)
    }

    /// Populate the cache for each `(size, n_angles)`, with angles evenly
    /// spaced over a half turn, a detector as wide as the image and the
    /// axis in its middle
    pub fn warm(&self, shapes: &[(usize, usize)]) -> Result<()> {
        for &(size, n_angles) in shapes {
            let start = Instant::now();
            let projector = ParallelProjector::new(size, &linspace(0.0, std::f32::consts::PI, n_angles));
            self.norm_squared(&projector, size, size as f32 / 2.0)?;
            log::info!("projector for {size}×{size} images at {n_angles} angles cached in {} ms",
                       group_digits(start.elapsed().as_millis()));
        }
        Ok(())
    }

    /// The entry at `path`, or an empty one if it is missing or unusable
    fn read(&self, path: &Path, projector: &ParallelProjector) -> Entry {
        let empty = Entry { size: projector.size, n_angles: projector.n_angles(), norms: vec![] };
        let Ok(text) = fs::read_to_string(path) else { return empty };
        match toml::from_str::<Entry>(&text) {
            Ok(entry) if entry.size == empty.size && entry.n_angles == empty.n_angles => entry,
            Ok(_) => {
                log::warn!("discarding projector cache entry {} written for another shape", path.display());
                empty
            },
            Err(e) => {
                log::warn!("discarding unreadable projector cache entry {}: {e}", path.display());
                empty
            },
        }
    }

    /// Write to a private temporary file, then rename, so that concurrent
    /// readers never see a partial entry
    fn store(&self, path: &Path, entry: &Entry) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension(format!("tmp-{}", std::process::id()));
        fs::write(&tmp, toml::to_string(entry)?)?;
        fs::rename(&tmp, path)?;
        log::debug!("operator norms written to {}", path.display());
        Ok(())
    }
}
