//! Energy-like quantities used in configuration files.
//!
//! Collider kinematics is done in natural units, so masses, momenta and
//! energies all share the dimension of `Energy`, expressed in GeV. `uom` is
//! only used at the boundary, where humans write values such as `"25 GeV"` or
//! `"80.4 GeV"`; the numerical core works with plain `f64`s (see `todo`).

pub use uom;
pub use uom::si::Quantity;
pub use uom::si::f64::{Energy, Ratio, Angle};

pub mod todo;

mod units {
  pub use uom::si::{energy::{electronvolt, kiloelectronvolt, megaelectronvolt, gigaelectronvolt},
                    ratio ::ratio,
                    angle ::radian,
  };
}

/// Generate a function called NAME which returns QUANTITY by interpreting its
/// argument as UNIT
///
/// wrap!(NAME QUANTITY UNIT);
macro_rules! wrap {
  ($name:ident $quantity:ident $unit:ident ) => {
    pub fn $name(x: f64) -> $quantity { $quantity::new::<units::$unit>(x) }
  };
}

wrap!(ev     Energy      electronvolt);
wrap!(kev    Energy  kiloelectronvolt);
wrap!(mev    Energy  megaelectronvolt);
wrap!(gev    Energy  gigaelectronvolt);
wrap!(ratio  Ratio              ratio);
wrap!(radian Angle             radian);

// Reverse direction of the above.
pub fn gev_   (x: Energy) -> f64 { x.get::<units::gigaelectronvolt>() }
pub fn mev_   (x: Energy) -> f64 { x.get::<units::megaelectronvolt>() }
pub fn ratio_ (x: Ratio ) -> f64 { x.get::<units::ratio>() }
pub fn radian_(x: Angle ) -> f64 { x.get::<units::radian>() }

#[macro_export]
macro_rules! assert_uom_eq {
  ($unit:ident, $lhs:expr, $rhs:expr, $algo:ident <= $tol:expr) => {
    float_eq::assert_float_eq!($lhs.get::<$unit>(), $rhs.get::<$unit>(), $algo <= $tol)
  };
}
