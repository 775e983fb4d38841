pub use kinematics::FourMomentum;

pub use crate::error::{Error, Result};
pub use crate::types::{Anglef64, Energyf64, Massf64, Momentumf64, Ratiof64, SENTINEL_CHI2};

pub type BoxErr<T> = std::result::Result<T, Box<dyn std::error::Error>>;
