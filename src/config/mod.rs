//! Configuration file parser for the reconstruction pipeline
//!
//! Every stage gets its own table with named, defaulted fields. The whole
//! configuration is validated once, right after parsing, so the stages can
//! trust their parameters.

pub mod preprocess;
pub mod recon;

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::{Result, TomoError};

pub use preprocess::{PreprocessConfig, Averaging, OutlierConfig, StripeRemoval, AllStripe, WaveletStripe};
pub use recon::{ReconConfig, Backend, Fbp, Cgls, Mbir};

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {

    #[serde(default)]
    pub preprocess: PreprocessConfig,

    #[serde(default)]
    pub cor: CorConfig,

    #[serde(default)]
    pub recon: ReconConfig,

    /// Maximum number of rayon threads. All available cores if absent.
    #[serde(default)]
    pub threads: Option<usize>,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.preprocess.validate()?;
        self.cor.validate()?;
        self.recon.validate()?;
        if self.threads == Some(0) {
            return Err(invalid("threads must be at least 1"))
        }
        Ok(())
    }

    /// Run `job` on a pool limited to the configured number of threads
    pub fn install<T: Send>(&self, job: impl FnOnce() -> T + Send) -> Result<T> {
        match self.threads {
            None    => Ok(job()),
            Some(n) => Ok(rayon::ThreadPoolBuilder::new().num_threads(n).build()?.install(job)),
        }
    }
}

/// Parameters of the automatic center-of-rotation search
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CorConfig {

    /// Sub-pixel precision of the phase correlation, in pixels
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,

    /// Allowed deviation of the angular range from 180°, in degrees
    #[serde(default = "default_half_turn_tolerance")]
    pub half_turn_tolerance: f32,

    /// Refuse (rather than warn about) scans which are not a half turn
    #[serde(default)]
    pub require_half_turn: bool,
}

impl Default for CorConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            half_turn_tolerance: default_half_turn_tolerance(),
            require_half_turn: false,
        }
    }
}

impl CorConfig {
    fn validate(&self) -> Result<()> {
        if !(self.tolerance > 0.0 && self.tolerance <= 1.0) {
            return Err(invalid(format!("cor.tolerance must lie in (0, 1], got {}", self.tolerance)))
        }
        if !(self.half_turn_tolerance >= 0.0) {
            return Err(invalid("cor.half_turn_tolerance must not be negative"))
        }
        Ok(())
    }
}

fn default_tolerance() -> f32 { 0.25 }
fn default_half_turn_tolerance() -> f32 { 1.0 }

pub(crate) fn invalid(message: impl Into<String>) -> TomoError {
    TomoError::InvalidConfig(message.into())
}

pub fn read_config_file(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path)?;
    parse_config(&text)
}

pub fn parse_config(text: &str) -> Result<Config> {
    let config: Config = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Device;
    use pretty_assertions::assert_eq;

    // ----- Test the example on-disk config file ----------------------------------------
    #[test]
    fn test_config_file() {
        let config = read_config_file("tomohelp.toml".as_ref()).unwrap();
        assert_eq!(config.threads, Some(8));
        assert_eq!(config.preprocess.minimum_transmission, Some(0.01));
        assert_eq!(config.preprocess.downsample, 2);
        assert_eq!(config.preprocess.stripe, StripeRemoval::AllStripe(AllStripe { snr: 3.0, la_size: 61, sm_size: 21 }));
        assert_eq!(config.cor.tolerance, 0.25);
        assert_eq!(config.recon.backend, Backend::Fbp(Fbp { cutoff: Some(0.5) }));
        assert_eq!(config.recon.device, Device::Cpu);
    }

    // ----- Some helpers to make the tests more concise ---------------------------------
    fn parse<'d, D: Deserialize<'d>>(input: &'d str) -> D {
        toml::from_str(input).unwrap()
    }

    macro_rules! check {
        ($type:ident($text:expr).$field:ident = $expected:expr) => {
            let config: $type = parse::<$type>($text);
            println!("DESERIALIZED: {config:?}");
            assert_eq!(config.$field, $expected);
        };
        ($type:ident($text:expr) fields: $($field:ident = $expected:expr);+$(;)?) => {
            let config: $type = parse::<$type>($text);
            println!("DESERIALIZED: {config:?}");
            $(assert_eq!(config.$field, $expected);)*
        }
    }

    // ----- Defaults ---------------------------------------------------------------------
    #[test]
    fn empty_config_is_all_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.preprocess.minimum_transmission, Some(0.01));
        assert_eq!(config.preprocess.stripe, StripeRemoval::None);
        assert_eq!(config.recon.backend, Backend::Fbp(Fbp { cutoff: None }));
    }

    #[test]
    fn cor_fields() {
        check!{CorConfig("tolerance = 0.5") fields:
               tolerance = 0.5;
               half_turn_tolerance = 1.0;
               require_half_turn = false
        }
        check!(CorConfig("require_half_turn = true").require_half_turn = true);
    }

    #[test]
    fn top_level_threads() {
        check!(Config("threads = 3").threads = Some(3));
        check!(Config("").threads = None);
    }

    // ----- Make sure that unknown fields are not accepted -----------------------------
    #[test]
    #[should_panic]
    fn config_reject_unknown_field() {
        parse::<Config>("unknown_field = 666");
    }

    // ----- Validation happens after parsing ------------------------------------------
    #[test]
    fn validation_rejects_nonsense() {
        for text in ["threads = 0",
                     "[cor]\ntolerance = 0.0",
                     "[preprocess]\ndownsample = 0",
                     "[preprocess]\nminimum_transmission = 1.5",
                     "[preprocess.stripe]\nmethod = \"wavelet\"\nwavelet = \"sym7\"",
                     "[recon.backend]\nalgorithm = \"cgls\"\niterations = 0",
        ] {
            let result = parse_config(text);
            assert!(matches!(result, Err(TomoError::InvalidConfig(_)) | Err(TomoError::UnknownWavelet(_))),
                    "`{text}` should be rejected, got {result:?}");
        }
    }

    #[test]
    fn syntax_errors_are_reported_as_toml_errors() {
        assert!(matches!(parse_config("threads = = 3"), Err(TomoError::Toml(_))));
    }
}
