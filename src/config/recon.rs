//! Reconstruction parameters: which backend, on which device, with which
//! projector cache

use std::path::PathBuf;

use serde::Deserialize;

use crate::{Result, device::Device};
use super::invalid;

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ReconConfig {

    #[serde(default)]
    pub backend: Backend,

    #[serde(default)]
    pub device: Device,

    /// Where projector operator norms are cached. Falls back to
    /// `$TOMOHELP_CACHE_DIR`, then to the system temporary directory.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Zero everything outside this radius (pixels) around each slice
    /// centre. `mask = true` without a radius uses the inscribed circle.
    #[serde(default)]
    pub mask: bool,

    #[serde(default)]
    pub mask_radius: Option<f32>,
}

impl ReconConfig {
    pub(super) fn validate(&self) -> Result<()> {
        match self.backend {
            Backend::Fbp(Fbp { cutoff: Some(fc) }) if !(fc > 0.0 && fc < 1.0) =>
                Err(invalid(format!("recon.backend.cutoff must lie in (0, 1), got {fc}"))),
            Backend::Cgls(Cgls { iterations: 0 }) =>
                Err(invalid("recon.backend.iterations must be at least 1")),
            Backend::Mbir(Mbir { max_iterations: 0, .. }) =>
                Err(invalid("recon.backend.max_iterations must be at least 1")),
            Backend::Mbir(Mbir { stop_threshold, .. }) if !(stop_threshold >= 0.0) =>
                Err(invalid("recon.backend.stop_threshold must not be negative")),
            _ => match self.mask_radius {
                Some(r) if !(r > 0.0) => Err(invalid("recon.mask_radius must be positive")),
                _ => Ok(()),
            }
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "algorithm", rename_all = "kebab-case")]
pub enum Backend {
    /// Filtered backprojection
    Fbp(Fbp),
    /// Conjugate gradient least squares
    Cgls(Cgls),
    /// Model-based iterative reconstruction with a q-GGMRF prior
    Mbir(Mbir),
}

impl Default for Backend {
    fn default() -> Self { Self::Fbp(Fbp::default()) }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Fbp {
    /// Low-pass prefilter cutoff, relative to Nyquist
    #[serde(default)]
    pub cutoff: Option<f32>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Cgls {
    #[serde(default = "default_cgls_iterations")]
    pub iterations: usize,
}

impl Default for Cgls {
    fn default() -> Self { Self { iterations: default_cgls_iterations() } }
}

fn default_cgls_iterations() -> usize { 20 }

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Mbir {
    /// Larger values give sharper images (log2 scale on the prior width)
    #[serde(default)]
    pub sharpness: f32,

    /// Assumed signal-to-noise ratio of the sinogram, in dB
    #[serde(default = "default_snr_db")]
    pub snr_db: f32,

    #[serde(default = "default_positivity")]
    pub positivity: bool,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Stop when the relative update (%) falls below this
    #[serde(default = "default_stop_threshold")]
    pub stop_threshold: f32,
}

impl Default for Mbir {
    fn default() -> Self {
        Self {
            sharpness: 0.0,
            snr_db: default_snr_db(),
            positivity: default_positivity(),
            max_iterations: default_max_iterations(),
            stop_threshold: default_stop_threshold(),
        }
    }
}

fn default_snr_db() -> f32 { 30.0 }
fn default_positivity() -> bool { true }
fn default_max_iterations() -> usize { 100 }
fn default_stop_threshold() -> f32 { 0.02 }
