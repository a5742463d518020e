pub use crate::error::{TomoError, Result};
pub use crate::types::{Angles, Frame, Frames, Projections, Volume};
pub use crate::metadata::Metadata;
pub use crate::config::{Config, read_config_file};

pub use units::todo::{Intensityf32, Transmissionf32, Attenuationf32, Pixelsf32, Radiansf32};
