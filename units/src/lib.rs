//! Physical units used to describe a tomography scan.
//!
//! Thin layer over `uom`: re-exports of the quantities we need, plus pithily
//! named constructors and extractors, because making values from float
//! literals with `uom` is very long-winded.

pub mod todo;

pub use uom;
pub use uom::si::f32::{Angle, Energy, Length};

mod units {
  pub use uom::si::{length  ::{micrometer, millimeter, centimeter},
                    energy  ::{electronvolt, kiloelectronvolt},
                    angle   ::{degree, radian},
  };
}

/// Generate a function called NAME which returns QUANTITY by interpreting its
/// argument as UNIT
///
/// wrap!(NAME QUANTITY UNIT);
macro_rules! wrap {
  ($name:ident $quantity:ident $unit:ident ) => {
    pub fn $name(x: f32) -> $quantity { $quantity::new::<units::$unit>(x) }
  };
}

wrap!(um     Length       micrometer);
wrap!(mm     Length       millimeter);
wrap!(cm     Length       centimeter);
wrap!(ev     Energy     electronvolt);
wrap!(kev    Energy kiloelectronvolt);
wrap!(degree Angle            degree);
wrap!(radian Angle            radian);

// Reverse direction of the above.
pub fn um_    (x: Length) -> f32 { x.get::<units::micrometer>      () }
pub fn mm_    (x: Length) -> f32 { x.get::<units::millimeter>      () }
pub fn cm_    (x: Length) -> f32 { x.get::<units::centimeter>      () }
pub fn kev_   (x: Energy) -> f32 { x.get::<units::kiloelectronvolt>() }
pub fn degree_(x: Angle ) -> f32 { x.get::<units::degree>          () }
pub fn radian_(x: Angle ) -> f32 { x.get::<units::radian>          () }

#[macro_export]
macro_rules! assert_uom_eq {
  ($unit:ident, $lhs:expr, $rhs:expr, $algo:ident <= $tol:expr) => {
    float_eq::assert_float_eq!($lhs.get::<$unit>(), $rhs.get::<$unit>(), $algo <= $tol)
  };
}
