use ndarray::{Array1, Array2, Array3};

use crate::Radiansf32;

/// Projection stack indexed `[angle, row, column]`: raw intensity before
/// normalization, transmission after it, attenuation after `minus_log`.
pub type Projections = Array3<f32>;

/// One rotation angle (radians) per entry along the angle axis of a
/// `Projections` stack.
pub type Angles = Array1<Radiansf32>;

/// Flat or dark reference frames, indexed `[frame, row, column]`.
pub type Frames = Array3<f32>;

/// A single detector frame or reconstructed slice, indexed `[row, column]`.
pub type Frame = Array2<f32>;

/// Reconstructed volume indexed `[slice, row, column]`.
pub type Volume = Array3<f32>;

/// Check the one invariant that ties a projection stack to its angles.
pub fn check_angles(n_projections: usize, angles: &Angles) -> crate::Result<()> {
    if n_projections != angles.len() {
        return Err(crate::TomoError::ShapeMismatch {
            what: "projections along angle axis vs angle vector",
            left: vec![n_projections],
            right: vec![angles.len()],
        })
    }
    Ok(())
}
