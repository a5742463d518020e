/// Quantities which are plain `f32` aliases rather than `uom` `Quantity`s.
///
/// Pixel values pass through FFTs, sorting and interpolation where `uom`
/// gets in the way, so we use plain `f32`s, but still want some clues in the
/// source as to what they represent.

pub type Intensityf32     = f32; // raw detector counts
pub type Transmissionf32  = f32; // (raw - dark) / (flat - dark)
pub type Attenuationf32   = f32; // -ln(transmission)
pub type Pixelsf32        = f32; // offsets measured in detector pixels
pub type Radiansf32       = f32;
