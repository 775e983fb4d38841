/// Units which are simply type aliases for `f64` rather than having an
/// implementation as a `uom` `Quantity`.
///
/// The fit and the combinatorial search work in GeV and radians throughout,
/// with nalgebra matrices of bare `f64`s. Wrapping every element in a `uom`
/// quantity would buy little there, so we use plain `f64`s, but still want
/// some clues in the source as to what they represent.

pub type Energyf64   = f64; // GeV
pub type Massf64     = f64; // GeV
pub type Momentumf64 = f64; // GeV
pub type Anglef64    = f64; // rad
pub type Ratiof64    = f64;
