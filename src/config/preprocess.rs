//! Preprocessing parameters: normalization, outliers, stripes, clamping,
//! downsampling

use serde::Deserialize;

use crate::{Intensityf32, Result, Transmissionf32, wavelet::Wavelet};
use super::invalid;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PreprocessConfig {

    /// Transmission floor applied before the logarithm. `0` disables it.
    #[serde(default = "default_minimum_transmission")]
    pub minimum_transmission: Option<Transmissionf32>,

    /// Block-averaging factor applied to every frame. `1` means none.
    #[serde(default = "default_downsample")]
    pub downsample: usize,

    /// Downsample transmission, before the logarithm rather than after it.
    /// Can leave a bright halo of radius `rays` in reconstructions.
    #[serde(default)]
    pub prelog: bool,

    /// How repeated flat and dark frames are combined
    #[serde(default)]
    pub averaging: Averaging,

    /// Median-based removal of bright outliers along the angle axis
    #[serde(default)]
    pub outliers: Option<OutlierConfig>,

    #[serde(default)]
    pub stripe: StripeRemoval,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            minimum_transmission: default_minimum_transmission(),
            downsample: default_downsample(),
            prelog: false,
            averaging: Averaging::default(),
            outliers: None,
            stripe: StripeRemoval::default(),
        }
    }
}

impl PreprocessConfig {

    /// The floor to clamp to, if clamping is enabled at all
    pub fn transmission_floor(&self) -> Option<Transmissionf32> {
        self.minimum_transmission.filter(|&t| t > 0.0)
    }

    pub(super) fn validate(&self) -> Result<()> {
        if self.downsample == 0 {
            return Err(invalid("preprocess.downsample must be at least 1"))
        }
        if let Some(t) = self.minimum_transmission {
            if !(0.0..1.0).contains(&t) {
                return Err(invalid(format!("preprocess.minimum_transmission must lie in [0, 1), got {t}")))
            }
        }
        if let Some(OutlierConfig { difference, size }) = self.outliers {
            if size == 0 || size % 2 == 0 {
                return Err(invalid(format!("preprocess.outliers.size must be odd, got {size}")))
            }
            if !(difference > 0.0) {
                return Err(invalid("preprocess.outliers.difference must be positive"))
            }
        }
        match &self.stripe {
            StripeRemoval::None => {},
            StripeRemoval::AllStripe(AllStripe { snr, la_size, sm_size }) => {
                if !(*snr > 0.0) { return Err(invalid("preprocess.stripe.snr must be positive")) }
                if *la_size == 0 || *sm_size == 0 {
                    return Err(invalid("preprocess.stripe.la_size and sm_size must be at least 1"))
                }
            },
            StripeRemoval::Wavelet(WaveletStripe { sigma, level, wavelet, .. }) => {
                if !(*sigma > 0.0) { return Err(invalid("preprocess.stripe.sigma must be positive")) }
                if *level == 0     { return Err(invalid("preprocess.stripe.level must be at least 1")) }
                Wavelet::by_name(wavelet)?;
            },
        }
        Ok(())
    }
}

fn default_minimum_transmission() -> Option<Transmissionf32> { Some(0.01) }
fn default_downsample() -> usize { 1 }

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Averaging { #[default] Mean, Median }

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OutlierConfig {

    /// How many raw counts above the local median a pixel must be, to count
    /// as an outlier
    #[serde(default = "default_outlier_difference")]
    pub difference: Intensityf32,

    /// Width of the median window along the angle axis
    #[serde(default = "default_outlier_size")]
    pub size: usize,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self { difference: default_outlier_difference(), size: default_outlier_size() }
    }
}

fn default_outlier_difference() -> Intensityf32 { 750.0 }
fn default_outlier_size() -> usize { 3 }

/// Which stripe (ring artifact) filter to apply. Exactly one per run.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum StripeRemoval {
    #[default]
    None,

    /// Dead, large and small stripes, by sorting and median filtering.
    /// Applied to transmission.
    AllStripe(AllStripe),

    /// Fourier damping of wavelet detail bands. Applied to attenuation.
    Wavelet(WaveletStripe),
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AllStripe {
    #[serde(default = "default_snr")]     pub snr: f32,
    #[serde(default = "default_la_size")] pub la_size: usize,
    #[serde(default = "default_sm_size")] pub sm_size: usize,
}

impl Default for AllStripe {
    fn default() -> Self {
        Self { snr: default_snr(), la_size: default_la_size(), sm_size: default_sm_size() }
    }
}

fn default_snr() -> f32 { 3.0 }
fn default_la_size() -> usize { 61 }
fn default_sm_size() -> usize { 21 }

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WaveletStripe {
    #[serde(default = "default_sigma")]   pub sigma: f32,
    #[serde(default = "default_level")]   pub level: usize,
    #[serde(default = "default_wavelet")] pub wavelet: String,
    #[serde(default = "default_pad")]     pub pad: bool,
}

impl Default for WaveletStripe {
    fn default() -> Self {
        Self { sigma: default_sigma(), level: default_level(), wavelet: default_wavelet(), pad: default_pad() }
    }
}

fn default_sigma() -> f32 { 3.0 }
fn default_level() -> usize { 8 }
fn default_wavelet() -> String { "db5".into() }
fn default_pad() -> bool { true }
