//! Everything that can go wrong between opening a scan file and writing out
//! a reconstruction.

#[derive(Debug, thiserror::Error)]
pub enum TomoError {

    /// Shifting and viewing only make sense for single frames or stacks
    #[error("expected a 2-d or 3-d array, got {0} dimension(s)")]
    InvalidDimensionality(usize),

    #[error("shape mismatch ({what}): {left:?} vs {right:?}")]
    ShapeMismatch { what: &'static str, left: Vec<usize>, right: Vec<usize> },

    #[error("downsample factor must be at least 1, got {0}")]
    InvalidDownsampleFactor(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown wavelet family `{0}` (expected haar or db1 .. db6)")]
    UnknownWavelet(String),

    #[error("angular range is {0}°, automatic COR estimation needs a half turn")]
    NotHalfTurn(f32),

    #[error("nothing selected: {0}")]
    EmptySelection(String),

    #[error("{what} {index} requested, only {len} available")]
    IndexOutOfRange { what: &'static str, index: usize, len: usize },

    #[error("dataset `{path}` not found in scan file")]
    MissingDataset { path: String },

    #[error(transparent)]
    Hdf5(#[from] hdf5::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    TomlWrite(#[from] toml::ser::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, TomoError>;
