use std::f64::consts::{PI, TAU};

use crate::FourMomentum;
use units::todo::{Anglef64, Massf64, Momentumf64, Ratiof64};

/// Map an azimuth onto `(-pi, pi]`.
pub fn normalize_phi(phi: Anglef64) -> Anglef64 {
    let mut phi = phi % TAU;
    if phi >   PI { phi -= TAU }
    if phi <= -PI { phi += TAU }
    phi
}

/// Signed azimuthal separation `a - b`, in `(-pi, pi]`.
pub fn delta_phi(a: Anglef64, b: Anglef64) -> Anglef64 { normalize_phi(a - b) }

pub fn eta_to_theta(eta: Ratiof64) -> Anglef64 { 2.0 * (-eta).exp().atan() }

pub fn theta_to_eta(theta: Anglef64) -> Ratiof64 { -(0.5 * theta).tan().ln() }

/// Transverse mass of a leptonically decaying W, built from the charged lepton
/// and the missing transverse momentum `(met_x, met_y)`, neglecting masses.
pub fn w_transverse_mass(lepton: &FourMomentum, met_x: Momentumf64, met_y: Momentumf64) -> Massf64 {
    let met = met_x.hypot(met_y);
    let pt  = lepton.pt();
    let mt2 = 2.0 * (pt * met - lepton.px * met_x - lepton.py * met_y);
    mt2.max(0.0).sqrt()
}
