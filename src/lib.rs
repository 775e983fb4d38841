mod exports;
pub use exports::*;

pub mod config;
pub mod decision;
pub mod emit;
pub mod error;
pub mod event;
pub mod fit;
pub mod io;
pub mod neutrino;
pub mod reco;
pub mod search;
pub mod selection;
pub mod stats;
pub mod toy;
pub mod types;
pub mod utils;

#[cfg(test)]
mod testing;
