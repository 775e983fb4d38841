pub use units::todo::{Anglef64, Energyf64, Massf64, Momentumf64, Ratiof64};

/// Best chi-square of a hypothesis for which no combination converged.
pub const SENTINEL_CHI2: f64 = 1e10;

pub const ELECTRON_MASS: Massf64 = 0.000_510_998_95;
pub const MUON_MASS    : Massf64 = 0.105_658_375_5;

/// Particle Data Group Monte Carlo numbering, for positive charge.
pub mod pdg {
    pub const TOP              : i32 =  6;
    pub const ELECTRON         : i32 = 11;
    pub const ELECTRON_NEUTRINO: i32 = 12;
    pub const MUON             : i32 = 13;
    pub const MUON_NEUTRINO    : i32 = 14;
    pub const W                : i32 = 24;
}
