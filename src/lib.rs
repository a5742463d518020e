mod exports;
pub use exports::*;

pub mod error;
pub mod types;
pub mod utils;
pub mod config;
pub mod metadata;
pub mod io;
pub mod downsample;
pub mod ndfilter;
pub mod fourier;
pub mod wavelet;
pub mod preprocess;
pub mod shift;
pub mod registration;
pub mod cor;
pub mod projector;
pub mod recon;
pub mod device;
pub mod view;
